// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Calendar Sync API Server
//!
//! Signs users in with Google, keeps a local copy of their calendar events
//! and serves them grouped per day or week.

use calendar_sync::{
    config::Config,
    db::FirestoreDb,
    error::set_expose_internal_errors,
    services::{CalendarService, GoogleClient},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        environment = ?config.environment,
        timezone = %config.calendar_timezone,
        "Starting Calendar Sync API"
    );

    set_expose_internal_errors(config.environment.is_development());

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    let google = GoogleClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google_redirect_uri.clone(),
    )?;
    tracing::info!(redirect_uri = %config.google_redirect_uri, "Google client initialized");

    let calendar = CalendarService::new(google, db.clone());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        calendar,
    });

    // Build router
    let app = calendar_sync::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["calendar_sync=debug", "info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::registry().with(filter).with(format).init();
}
