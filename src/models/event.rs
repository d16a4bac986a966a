// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Calendar event model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Stored event record in Firestore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Event {
    /// Document ID (see [`Event::document_id`])
    pub id: String,
    /// Owning user ID
    pub user_id: String,
    /// Google Calendar event ID, when the event is mirrored on Google
    pub google_event_id: Option<String>,
    pub title: String,
    #[serde(with = "crate::time_utils::rfc3339_millis")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_time: DateTime<Utc>,
    #[serde(with = "crate::time_utils::rfc3339_millis")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub end_time: DateTime<Utc>,
    #[serde(with = "crate::time_utils::rfc3339_millis")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::time_utils::rfc3339_millis")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub updated_at: DateTime<Utc>,
}

/// Event attributes as they arrive from Google or a create request,
/// before they are bound to a stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub google_event_id: Option<String>,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// What an upsert keyed by (user, Google event ID) has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Insert,
    Update,
    /// Every field already matches; no write happens.
    Unchanged,
}

impl Event {
    /// Document ID for an event.
    ///
    /// Events mirrored from Google are keyed by owner and Google ID, so the
    /// same Google event can only exist once per user. Local-only events get
    /// a random ID.
    pub fn document_id(user_id: &str, google_event_id: Option<&str>) -> String {
        match google_event_id {
            Some(gid) => format!("{}_{}", user_id, urlencoding::encode(gid)),
            None => uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Create a new record from a draft.
    pub fn new(user_id: &str, draft: EventDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: Self::document_id(user_id, draft.google_event_id.as_deref()),
            user_id: user_id.to_string(),
            google_event_id: draft.google_event_id,
            title: draft.title,
            start_time: draft.start_time,
            end_time: draft.end_time,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the stored fields already equal the draft.
    pub fn matches(&self, draft: &EventDraft) -> bool {
        self.google_event_id == draft.google_event_id
            && self.title == draft.title
            && self.start_time == draft.start_time
            && self.end_time == draft.end_time
    }

    /// Apply a draft to an existing record, keeping its identity and
    /// creation time.
    pub fn apply(&mut self, draft: EventDraft, now: DateTime<Utc>) {
        self.google_event_id = draft.google_event_id;
        self.title = draft.title;
        self.start_time = draft.start_time;
        self.end_time = draft.end_time;
        self.updated_at = now;
    }
}

/// Decide what an upsert has to write.
pub fn plan_upsert(existing: Option<&Event>, draft: &EventDraft) -> UpsertAction {
    match existing {
        None => UpsertAction::Insert,
        Some(event) if event.matches(draft) => UpsertAction::Unchanged,
        Some(_) => UpsertAction::Update,
    }
}
