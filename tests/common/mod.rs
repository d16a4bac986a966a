// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use calendar_sync::config::Config;
use calendar_sync::db::FirestoreDb;
use calendar_sync::middleware::auth::create_jwt;
use calendar_sync::models::{Event, EventDraft, User};
use calendar_sync::routes::create_router;
use calendar_sync::services::{CalendarService, GoogleClient, GoogleEndpoints};
use calendar_sync::AppState;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Google client pointed at `base_url` (usually a wiremock server).
#[allow(dead_code)]
pub fn test_google_client(base_url: &str) -> GoogleClient {
    let config = Config::test_default();
    GoogleClient::with_endpoints(
        config.google_client_id,
        config.google_client_secret,
        config.google_redirect_uri,
        GoogleEndpoints::with_base_url(base_url),
    )
    .expect("Failed to build Google client")
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let google = GoogleClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google_redirect_uri.clone(),
    )
    .expect("Failed to build Google client");

    build_app(config, google)
}

/// Create a test app whose Google client talks to `base_url`.
#[allow(dead_code)]
pub fn create_test_app_with_google(base_url: &str) -> (axum::Router, Arc<AppState>) {
    build_app(Config::test_default(), test_google_client(base_url))
}

fn build_app(config: Config, google: GoogleClient) -> (axum::Router, Arc<AppState>) {
    let db = test_db_offline();
    let calendar = CalendarService::new(google, db.clone());

    let state = Arc::new(AppState {
        config,
        db,
        calendar,
    });

    (create_router(state.clone()), state)
}

/// Create a session token for `user_id`.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, signing_key: &[u8]) -> String {
    create_jwt(user_id, signing_key, Utc::now()).expect("Failed to create JWT")
}

/// Parse an RFC3339 timestamp (test inputs are always valid).
#[allow(dead_code)]
pub fn parse_time(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("valid RFC3339 timestamp")
        .with_timezone(&Utc)
}

/// Unique ID for test isolation.
#[allow(dead_code)]
pub fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

/// A user with stored Google credentials.
#[allow(dead_code)]
pub fn test_user(id: &str) -> User {
    let now = parse_time("2024-06-10T09:00:00Z");
    User {
        id: id.to_string(),
        google_id: id.to_string(),
        email: "test@example.com".to_string(),
        name: "Test User".to_string(),
        access_token: Some("access-token".to_string()),
        refresh_token: Some("refresh-token".to_string()),
        token_expiry: None,
        created_at: now,
        updated_at: now,
    }
}

/// A stored event starting at `start` and lasting one hour.
#[allow(dead_code)]
pub fn test_event(user_id: &str, google_id: Option<&str>, title: &str, start: &str) -> Event {
    let start_time = parse_time(start);
    Event::new(
        user_id,
        EventDraft {
            google_event_id: google_id.map(str::to_string),
            title: title.to_string(),
            start_time,
            end_time: start_time + chrono::Duration::hours(1),
        },
        start_time,
    )
}
