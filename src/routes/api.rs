// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Event, User};
use crate::services::calendar::{CreateEventRequest, SyncReport, SyncWindow};
use crate::services::grouping::{group_events, EventGroup, EventWindow};
use crate::time_utils::{format_utc_rfc3339, parse_iso8601};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/events", get(get_events).post(create_event))
        .route("/api/events/refresh", post(refresh_events))
}

async fn load_user(state: &AppState, auth: &AuthUser) -> Result<User> {
    state
        .db
        .get_user(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", auth.user_id)))
}

/// Parse an optional JSON body; an empty body yields the default value.
fn parse_optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response. Credentials are never returned.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let user = load_user(&state, &auth).await?;

    Ok(Json(UserResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        created_at: format_utc_rfc3339(user.created_at),
    }))
}

// ─── Event Listing ───────────────────────────────────────────

#[derive(Deserialize)]
struct EventsQuery {
    /// Window length in days (1..=365, default 7)
    days: Option<String>,
    /// First day of the window (ISO 8601 date or datetime)
    #[serde(rename = "startDate")]
    start_date: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
    pub days: u32,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse {
    pub events: Vec<EventGroup>,
    pub date_range: DateRange,
}

fn parse_days(raw: Option<&str>) -> Result<Option<u32>> {
    raw.map(|d| {
        d.trim().parse::<u32>().map_err(|_| {
            AppError::BadRequest("days must be an integer between 1 and 365".to_string())
        })
    })
    .transpose()
}

/// A bare date names a calendar day in the configured timezone; anything
/// else must be a full ISO 8601 timestamp.
fn parse_start_date(raw: Option<&str>, tz: Tz) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| {
        let invalid =
            || AppError::BadRequest("startDate must be an ISO 8601 date or datetime".to_string());

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN));
            return tz
                .from_local_datetime(&noon)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(invalid);
        }

        parse_iso8601(s).ok_or_else(invalid)
    })
    .transpose()
}

/// List the user's stored events in a window, grouped per day or week.
async fn get_events(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<EventsResponse>> {
    let tz = state.config.calendar_timezone;
    let days = parse_days(params.days.as_deref())?;
    let start_date = parse_start_date(params.start_date.as_deref(), tz)?;

    let window = EventWindow::compute(days, start_date, Utc::now(), tz)?;

    tracing::debug!(
        user_id = %auth.user_id,
        days = window.days,
        start = %window.start,
        end = %window.end,
        "Fetching events"
    );

    let events = state
        .db
        .get_events_in_range(&auth.user_id, window.start, window.end)
        .await?;

    Ok(Json(EventsResponse {
        events: group_events(events, window.grouping(), tz),
        date_range: DateRange {
            start_date: format_utc_rfc3339(window.start),
            end_date: format_utc_rfc3339(window.end),
            days: window.days,
        },
    }))
}

// ─── Event Creation ──────────────────────────────────────────

/// Create an event on Google Calendar and store it locally.
async fn create_event(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    body: Bytes,
) -> Result<(StatusCode, Json<Event>)> {
    let request: CreateEventRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?;

    // Reject bad input before loading the user or contacting Google.
    request.clone().into_draft()?;

    let mut user = load_user(&state, &auth).await?;
    let event = state
        .calendar
        .create_event(&mut user, request, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(event)))
}

// ─── Refresh From Google ─────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RefreshEventsRequest {
    #[serde(default)]
    time_min: Option<String>,
    #[serde(default)]
    time_max: Option<String>,
}

impl RefreshEventsRequest {
    /// Explicit bounds override the default window one side at a time.
    fn window(&self, now: DateTime<Utc>) -> Result<SyncWindow> {
        let default = SyncWindow::around(now);
        let parse = |raw: &Option<String>, name: &str| -> Result<Option<DateTime<Utc>>> {
            raw.as_deref()
                .map(|s| {
                    parse_iso8601(s).ok_or_else(|| {
                        AppError::BadRequest(format!("{} must be an ISO 8601 datetime", name))
                    })
                })
                .transpose()
        };

        let window = SyncWindow {
            time_min: parse(&self.time_min, "timeMin")?.unwrap_or(default.time_min),
            time_max: parse(&self.time_max, "timeMax")?.unwrap_or(default.time_max),
        };

        if window.time_max <= window.time_min {
            return Err(AppError::BadRequest(
                "timeMax must be after timeMin".to_string(),
            ));
        }
        Ok(window)
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RefreshEventsResponse {
    pub message: String,
    /// Number of items Google returned
    pub count: usize,
    #[serde(flatten)]
    pub report: SyncReport,
}

/// Pull events from Google Calendar into the local store.
async fn refresh_events(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    body: Bytes,
) -> Result<Json<RefreshEventsResponse>> {
    let now = Utc::now();
    let request: RefreshEventsRequest = parse_optional_body(&body)?;
    let window = request.window(now)?;

    let mut user = load_user(&state, &auth).await?;
    let report = state
        .calendar
        .sync_events(&mut user, Some(window), now)
        .await?;

    Ok(Json(RefreshEventsResponse {
        message: "Events refreshed successfully".to_string(),
        count: report.fetched,
        report,
    }))
}
