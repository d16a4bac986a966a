// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Calendar service: login, event ingestion and event creation.
//!
//! Every operation that talks to Google first passes the user's
//! credentials through the refresh gate and persists refreshed tokens
//! before the Google call is made.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Event, EventDraft, LoginTokens, UpsertAction, User, UserProfile};
use crate::services::google::GoogleClient;
use crate::services::token_gate;
use crate::time_utils::parse_iso8601;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const MAX_CONCURRENT_DB_OPS: usize = 10;
/// Default ingestion reach on either side of now.
pub const SYNC_WINDOW_DAYS: i64 = 90;

/// Explicit time window for an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
}

impl SyncWindow {
    /// 90 days back to 90 days forward.
    pub fn around(now: DateTime<Utc>) -> Self {
        Self {
            time_min: now - Duration::days(SYNC_WINDOW_DAYS),
            time_max: now + Duration::days(SYNC_WINDOW_DAYS),
        }
    }
}

/// Outcome counts of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncReport {
    /// Items returned by Google
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Items missing an ID, title, start or end
    pub skipped: usize,
    /// Items whose store write failed
    pub failed: usize,
}

/// Event creation request body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
}

impl CreateEventRequest {
    /// Validate the request and turn it into a draft.
    ///
    /// Runs before any Google call: a rejected request never reaches Google.
    pub fn into_draft(self) -> Result<EventDraft, AppError> {
        self.validate()
            .map_err(|e| AppError::BadRequest(validation_message(&e)))?;

        if self.title.trim().is_empty() {
            return Err(AppError::BadRequest("Title is required".to_string()));
        }

        // Stored and sent to Google at millisecond precision
        let start_time = parse_iso8601(&self.start_time)
            .map(|t| t.trunc_subsecs(3))
            .ok_or_else(|| AppError::BadRequest("Valid start time is required".to_string()))?;
        let end_time = parse_iso8601(&self.end_time)
            .map(|t| t.trunc_subsecs(3))
            .ok_or_else(|| AppError::BadRequest("Valid end time is required".to_string()))?;

        if end_time <= start_time {
            return Err(AppError::BadRequest(
                "End time must be after start time".to_string(),
            ));
        }

        Ok(EventDraft {
            google_event_id: None,
            title: self.title,
            start_time,
            end_time,
        })
    }
}

/// First validation message, or a generic one.
fn validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid request".to_string())
}

/// Why a Google login could not be completed.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("Google returned no access token")]
    NoToken,
    #[error("Google returned no user info")]
    NoUserInfo,
    #[error(transparent)]
    App(#[from] AppError),
}

impl LoginError {
    /// Error code passed back to the frontend in the redirect URL.
    pub fn redirect_code(&self) -> &'static str {
        match self {
            LoginError::NoToken => "no_token",
            LoginError::NoUserInfo => "no_user_info",
            LoginError::App(_) => "auth_failed",
        }
    }
}

/// High-level calendar operations on behalf of a user.
#[derive(Clone)]
pub struct CalendarService {
    google: GoogleClient,
    db: FirestoreDb,
}

impl CalendarService {
    pub fn new(google: GoogleClient, db: FirestoreDb) -> Self {
        Self { google, db }
    }

    pub fn google(&self) -> &GoogleClient {
        &self.google
    }

    // ─── Credentials ─────────────────────────────────────────────────────────

    /// Return an access token that is valid at `now`, refreshing and
    /// persisting the user first if the stored one has expired.
    pub async fn valid_access_token(
        &self,
        user: &mut User,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let refreshed = token_gate::refresh_if_expired(&self.google, user, now)
            .await
            .inspect_err(|e| {
                if e.is_google_auth_error() {
                    tracing::warn!(user_id = %user.id, "Google rejected stored credentials, sign-in required");
                }
            })?;

        if refreshed {
            self.db.upsert_user(user).await?;
        }

        user.access_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::GoogleAuth("No access token stored".to_string()))
    }

    // ─── Login ───────────────────────────────────────────────────────────────

    /// Handle the OAuth callback: exchange the code, fetch the profile and
    /// store the user.
    pub async fn handle_oauth_callback(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<User, LoginError> {
        let grant = self.google.exchange_code(code).await?;
        let expires_at = grant.expires_at(now);
        let access_token = grant
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(LoginError::NoToken)?;

        let info = self.google.user_info(&access_token).await?;
        let google_id = info
            .id
            .filter(|id| !id.is_empty())
            .ok_or(LoginError::NoUserInfo)?;

        let existing = self.db.get_user(&google_id).await?;
        let is_new = existing.is_none();

        let user = User::from_login(
            existing,
            UserProfile {
                google_id,
                email: info.email,
                name: info.name,
            },
            LoginTokens {
                access_token,
                refresh_token: grant.refresh_token,
                expires_at,
            },
            now,
        );

        self.db.upsert_user(&user).await?;

        tracing::info!(user_id = %user.id, is_new, "Google login handled, user stored");
        Ok(user)
    }

    /// Refresh Google credentials for the user holding `refresh_token`.
    ///
    /// Used by the session refresh endpoint; always contacts Google,
    /// regardless of the stored expiry.
    pub async fn refresh_session(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<User, AppError> {
        let mut user = self
            .db
            .find_user_by_refresh_token(refresh_token)
            .await?
            .ok_or(AppError::InvalidToken)?;

        token_gate::apply_refresh(&self.google, &mut user, now).await?;
        self.db.upsert_user(&user).await?;

        Ok(user)
    }

    // ─── Ingestion ───────────────────────────────────────────────────────────

    /// Pull events from Google for `window` (default ±90 days around `now`)
    /// and upsert them into the store.
    ///
    /// Incomplete items are skipped. A failed store write is logged and
    /// does not stop the remaining items.
    pub async fn sync_events(
        &self,
        user: &mut User,
        window: Option<SyncWindow>,
        now: DateTime<Utc>,
    ) -> Result<SyncReport, AppError> {
        let window = window.unwrap_or_else(|| SyncWindow::around(now));
        let access_token = self.valid_access_token(user, now).await?;

        let items = self
            .google
            .list_events(&access_token, window.time_min, window.time_max)
            .await?;

        let mut report = SyncReport {
            fetched: items.len(),
            ..SyncReport::default()
        };

        let drafts: Vec<EventDraft> = items
            .iter()
            .filter_map(|item| {
                let draft = item.to_draft();
                if draft.is_none() {
                    tracing::debug!(google_event_id = ?item.id, "Skipping incomplete Google event");
                }
                draft
            })
            .collect();
        report.skipped = report.fetched - drafts.len();

        let user_id = user.id.as_str();
        let db = &self.db;

        let outcomes: Vec<(Option<String>, Result<UpsertAction, AppError>)> =
            stream::iter(drafts)
                .map(|draft| async move {
                    let google_event_id = draft.google_event_id.clone();
                    (google_event_id, db.upsert_event(user_id, draft, now).await)
                })
                .buffer_unordered(MAX_CONCURRENT_DB_OPS)
                .collect()
                .await;

        for (google_event_id, outcome) in outcomes {
            match outcome {
                Ok(UpsertAction::Insert) => report.inserted += 1,
                Ok(UpsertAction::Update) => report.updated += 1,
                Ok(UpsertAction::Unchanged) => report.unchanged += 1,
                Err(e) => {
                    tracing::warn!(
                        user_id = %user.id,
                        google_event_id = ?google_event_id,
                        error = %e,
                        "Failed to store event, continuing"
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            user_id = %user.id,
            fetched = report.fetched,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped,
            failed = report.failed,
            "Event sync complete"
        );

        Ok(report)
    }

    // ─── Creation ────────────────────────────────────────────────────────────

    /// Create an event on Google, then store the local copy.
    ///
    /// If Google rejects the event nothing is stored. If the local write
    /// fails after Google accepted the event, the Google event is left in
    /// place and the error is returned.
    pub async fn create_event(
        &self,
        user: &mut User,
        request: CreateEventRequest,
        now: DateTime<Utc>,
    ) -> Result<Event, AppError> {
        let mut draft = request.into_draft()?;

        let access_token = self.valid_access_token(user, now).await?;
        let created = self.google.insert_event(&access_token, &draft).await?;

        draft.google_event_id = created.id.filter(|id| !id.is_empty());
        let event = Event::new(&user.id, draft, now);

        if let Err(e) = self.db.insert_event(&event).await {
            tracing::error!(
                user_id = %user.id,
                google_event_id = ?event.google_event_id,
                error = %e,
                "Event created on Google but local copy was not stored"
            );
            return Err(e);
        }

        tracing::info!(
            user_id = %user.id,
            event_id = %event.id,
            "Event created"
        );
        Ok(event)
    }
}
