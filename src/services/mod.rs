// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod calendar;
pub mod google;
pub mod grouping;
pub mod token_gate;

pub use calendar::{CalendarService, CreateEventRequest, LoginError, SyncReport, SyncWindow};
pub use google::{GoogleClient, GoogleEndpoints};
pub use grouping::{group_events, EventGroup, EventWindow, Grouping};
