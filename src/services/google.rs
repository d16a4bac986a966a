// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth and Calendar API client.
//!
//! Handles:
//! - Building the consent URL and exchanging authorization codes
//! - Fetching the signed-in user's profile
//! - Refreshing access tokens
//! - Listing and inserting events on the primary calendar
//!
//! The client holds only application credentials. User tokens are passed
//! to every call, so one client is safely shared by all requests.

use crate::error::AppError;
use crate::models::EventDraft;
use crate::time_utils::{format_utc_rfc3339, parse_date_only, parse_iso8601};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const DEFAULT_HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
const PRIMARY_CALENDAR: &str = "primary";
const MAX_RESULTS_PER_PAGE: u32 = 2500;
/// Upper bound on pages read by one listing.
pub const MAX_EVENT_PAGES: usize = 100;

/// OAuth scopes requested at consent time.
pub const OAUTH_SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/userinfo.email",
];

/// Google endpoint URLs. Overridable so tests can point at a mock server.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub calendar_base_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            calendar_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
        }
    }
}

impl GoogleEndpoints {
    /// All endpoints rooted at one base URL (e.g. a wiremock server).
    pub fn with_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            auth_url: format!("{}/o/oauth2/v2/auth", base),
            token_url: format!("{}/token", base),
            userinfo_url: format!("{}/oauth2/v2/userinfo", base),
            calendar_base_url: format!("{}/calendar/v3", base),
        }
    }
}

/// Google API client.
#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    endpoints: GoogleEndpoints,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleClient {
    /// Create a new Google client with OAuth credentials.
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> anyhow::Result<Self> {
        Self::with_endpoints(
            client_id,
            client_secret,
            redirect_uri,
            GoogleEndpoints::default(),
        )
    }

    /// Create a client talking to custom endpoints.
    pub fn with_endpoints(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        endpoints: GoogleEndpoints,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building Google HTTP client")?;

        Ok(Self {
            http,
            endpoints,
            client_id,
            client_secret,
            redirect_uri,
        })
    }

    /// Consent screen URL requesting offline access.
    pub fn auth_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            self.endpoints.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&OAUTH_SCOPES.join(" ")),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AppError> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Token exchange failed: {}", e)))?;

        let grant: TokenGrant = self.check_response_json(response).await?;

        let presence = |present: bool| if present { "present" } else { "missing" };
        tracing::info!(
            access_token = presence(grant.access_token.is_some()),
            refresh_token = presence(grant.refresh_token.is_some()),
            expires_in = ?grant.expires_in,
            "Tokens received from Google"
        );

        Ok(grant)
    }

    /// Fetch the profile of the account owning `access_token`.
    pub async fn user_info(&self, access_token: &str) -> Result<GoogleUserInfo, AppError> {
        let response = self
            .http
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant, AppError> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(format!("Token refresh request failed: {}", e)))?;

        let grant: TokenGrant = self.check_response_json(response).await?;
        if grant.access_token.is_none() {
            return Err(AppError::GoogleAuth(
                "Token refresh returned no access token".to_string(),
            ));
        }
        Ok(grant)
    }

    /// List events on the primary calendar starting in `[time_min, time_max]`.
    ///
    /// Recurring events are expanded into single instances. Follows
    /// `nextPageToken` until all pages are read, stopping early on a repeated
    /// token or after [`MAX_EVENT_PAGES`] pages.
    pub async fn list_events(
        &self,
        access_token: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<GoogleEvent>, AppError> {
        let url = format!(
            "{}/calendars/{}/events",
            self.endpoints.calendar_base_url, PRIMARY_CALENDAR
        );

        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        for page_number in 1..=MAX_EVENT_PAGES {
            let mut query = vec![
                ("timeMin", format_utc_rfc3339(time_min)),
                ("timeMax", format_utc_rfc3339(time_max)),
                ("maxResults", MAX_RESULTS_PER_PAGE.to_string()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let response = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .query(&query)
                .send()
                .await
                .map_err(|e| AppError::GoogleApi(e.to_string()))?;

            let page: EventListPage = self.check_response_json(response).await?;
            items.extend(page.items);

            let Some(token) = page.next_page_token else {
                break;
            };
            if !seen_tokens.insert(token.clone()) {
                tracing::warn!(page = page_number, "Repeated page token from Google, stopping");
                break;
            }
            if page_number == MAX_EVENT_PAGES {
                tracing::warn!(pages = MAX_EVENT_PAGES, "Event listing page limit reached");
                break;
            }
            page_token = Some(token);
        }

        tracing::debug!(count = items.len(), "Fetched events from Google Calendar");
        Ok(items)
    }

    /// Create an event on the primary calendar.
    pub async fn insert_event(
        &self,
        access_token: &str,
        event: &EventDraft,
    ) -> Result<GoogleEvent, AppError> {
        let url = format!(
            "{}/calendars/{}/events",
            self.endpoints.calendar_base_url, PRIMARY_CALENDAR
        );

        let body = GoogleEventInsert {
            summary: &event.title,
            start: GoogleEventTimeInsert {
                date_time: format_utc_rfc3339(event.start_time),
                time_zone: "UTC",
            },
            end: GoogleEventTimeInsert {
                date_time: format_utc_rfc3339(event.end_time),
                time_zone: "UTC",
            },
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::GoogleApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::GoogleApi(format!("JSON parse error: {}", e)))
    }
}

/// Map a failed Google response to the error taxonomy.
fn classify_error(status: reqwest::StatusCode, body: &str) -> AppError {
    match status.as_u16() {
        401 => AppError::GoogleAuth(format!("HTTP {}", status)),
        403 => AppError::GoogleForbidden(format!("HTTP {}", status)),
        // The token endpoint reports revoked or unknown refresh tokens as 400
        400 if body.contains("invalid_grant") => {
            AppError::GoogleAuth("invalid_grant".to_string())
        }
        _ => AppError::GoogleApi(format!("HTTP {}: {}", status, body)),
    }
}

/// Token endpoint response (code exchange or refresh).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: Option<String>,
    /// Only present on first consent or when Google rotates it.
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: Option<i64>,
}

impl TokenGrant {
    /// Absolute expiry computed from `expires_in`. An out-of-range value
    /// counts as no expiry returned.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
    }
}

/// Profile returned by the userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    pub id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListPage {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    next_page_token: Option<String>,
}

/// Event item as returned by the Calendar API.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleEvent {
    pub id: Option<String>,
    pub summary: Option<String>,
    pub start: Option<GoogleEventTime>,
    pub end: Option<GoogleEventTime>,
}

/// Start or end of a Calendar API event: timed events carry `dateTime`,
/// all-day events carry `date`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEventTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
}

impl GoogleEventTime {
    /// Resolve to a timestamp. Date-only values become midnight UTC.
    pub fn resolve(&self) -> Option<DateTime<Utc>> {
        match (&self.date_time, &self.date) {
            (Some(dt), _) => parse_iso8601(dt),
            (None, Some(d)) => parse_date_only(d),
            (None, None) => None,
        }
    }
}

impl GoogleEvent {
    /// Convert to a storable draft, or `None` when a required field is
    /// missing or unparseable.
    pub fn to_draft(&self) -> Option<EventDraft> {
        let id = self.id.as_ref().filter(|s| !s.is_empty())?;
        let title = self.summary.as_ref().filter(|s| !s.is_empty())?;
        let start_time = self.start.as_ref()?.resolve()?;
        let end_time = self.end.as_ref()?.resolve()?;

        Some(EventDraft {
            google_event_id: Some(id.clone()),
            title: title.clone(),
            start_time,
            end_time,
        })
    }
}

#[derive(Serialize)]
struct GoogleEventInsert<'a> {
    summary: &'a str,
    start: GoogleEventTimeInsert,
    end: GoogleEventTimeInsert,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventTimeInsert {
    date_time: String,
    time_zone: &'static str,
}
