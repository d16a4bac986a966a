// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Calendar Sync: a Google Calendar backed calendar API
//!
//! This crate provides the backend API that signs users in with Google,
//! mirrors their primary calendar into Firestore and serves their events
//! grouped per day or week.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::CalendarService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub calendar: CalendarService,
}
