// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile and Google credentials)
//! - Events (local copy of calendar events, one document per
//!   user/Google event pair)

use crate::db::collections;
use crate::error::AppError;
use crate::models::{plan_upsert, Event, EventDraft, UpsertAction, User};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use firestore::errors::FirestoreError;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by local ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Find the user holding a given Google refresh token.
    pub async fn find_user_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<User>, AppError> {
        let refresh_token = refresh_token.to_string();

        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("refresh_token").eq(refresh_token.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users.into_iter().next())
    }

    // ─── Event Operations ────────────────────────────────────────

    /// Get an event by document ID.
    pub async fn get_event(&self, event_id: &str) -> Result<Option<Event>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::EVENTS)
            .obj()
            .one(event_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a new event. Fails with `Conflict` if the document exists.
    pub async fn insert_event(&self, event: &Event) -> Result<(), AppError> {
        let _: Event = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::EVENTS)
            .document_id(&event.id)
            .object(event)
            .execute()
            .await
            .map_err(|e| match e {
                FirestoreError::DataConflictError(_) => {
                    AppError::Conflict(format!("Event {} already exists", event.id))
                }
                other => AppError::Database(other.to_string()),
            })?;
        Ok(())
    }

    /// Write an event, replacing any existing document.
    pub async fn set_event(&self, event: &Event) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::EVENTS)
            .document_id(&event.id)
            .object(event)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Insert or update an event keyed by (user, Google event ID).
    ///
    /// The write is skipped entirely when no field changed, so `updated_at`
    /// only moves on real changes.
    pub async fn upsert_event(
        &self,
        user_id: &str,
        draft: EventDraft,
        now: DateTime<Utc>,
    ) -> Result<UpsertAction, AppError> {
        let doc_id = Event::document_id(user_id, draft.google_event_id.as_deref());
        let existing = self.get_event(&doc_id).await?;

        let action = plan_upsert(existing.as_ref(), &draft);
        match action {
            UpsertAction::Unchanged => {}
            UpsertAction::Insert => {
                let mut event = Event::new(user_id, draft, now);
                event.id = doc_id;
                self.set_event(&event).await?;
            }
            UpsertAction::Update => {
                if let Some(mut event) = existing {
                    event.apply(draft, now);
                    self.set_event(&event).await?;
                }
            }
        }

        Ok(action)
    }

    /// Events owned by a user whose start lies in `[start, end]`, ascending
    /// by start time.
    pub async fn get_events_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>, AppError> {
        let user_id = user_id.to_string();
        let start = format_utc_rfc3339(start);
        let end = format_utc_rfc3339(end);

        self.get_client()?
            .fluent()
            .select()
            .from(collections::EVENTS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("start_time").greater_than_or_equal(start.clone()),
                    q.field("start_time").less_than_or_equal(end.clone()),
                ])
            })
            .order_by([("start_time", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
