// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (FIRESTORE_EMULATOR_HOST set). Each test uses fresh IDs so runs do not
//! interfere with each other.

use calendar_sync::error::AppError;
use calendar_sync::models::{Event, EventDraft, UpsertAction};
use chrono::Duration;

mod common;
use common::{parse_time, test_db, test_event, test_user, unique_id};

fn draft(google_id: &str, title: &str, start: &str) -> EventDraft {
    let start_time = parse_time(start);
    EventDraft {
        google_event_id: Some(google_id.to_string()),
        title: title.to_string(),
        start_time,
        end_time: start_time + Duration::minutes(30),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_upsert_and_get() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");

    assert!(db.get_user(&user_id).await.unwrap().is_none());

    let mut user = test_user(&user_id);
    db.upsert_user(&user).await.unwrap();

    let stored = db.get_user(&user_id).await.unwrap().unwrap();
    assert_eq!(stored.email, "test@example.com");
    assert_eq!(stored.token_expiry, None);

    let expiry = parse_time("2024-06-10T10:00:00Z");
    user.access_token = Some("rotated".to_string());
    user.token_expiry = Some(expiry);
    db.upsert_user(&user).await.unwrap();

    let stored = db.get_user(&user_id).await.unwrap().unwrap();
    assert_eq!(stored.access_token.as_deref(), Some("rotated"));
    assert_eq!(stored.token_expiry, Some(expiry));
}

#[tokio::test]
async fn test_find_user_by_refresh_token() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    let refresh_token = unique_id("rt");

    let mut user = test_user(&user_id);
    user.refresh_token = Some(refresh_token.clone());
    db.upsert_user(&user).await.unwrap();

    let found = db
        .find_user_by_refresh_token(&refresh_token)
        .await
        .unwrap()
        .expect("user should be found by refresh token");
    assert_eq!(found.id, user_id);

    let missing = db
        .find_user_by_refresh_token(&unique_id("rt"))
        .await
        .unwrap();
    assert!(missing.is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// EVENT TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_upsert_is_idempotent() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    let first = parse_time("2024-06-01T12:00:00Z");
    let later = parse_time("2024-06-02T12:00:00Z");

    let action = db
        .upsert_event(&user_id, draft("g-1", "Standup", "2024-06-10T09:00:00Z"), first)
        .await
        .unwrap();
    assert_eq!(action, UpsertAction::Insert);

    // Same content again: no write, timestamps untouched
    let action = db
        .upsert_event(&user_id, draft("g-1", "Standup", "2024-06-10T09:00:00Z"), later)
        .await
        .unwrap();
    assert_eq!(action, UpsertAction::Unchanged);

    let stored = db
        .get_event(&Event::document_id(&user_id, Some("g-1")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.updated_at, first);
    assert_eq!(stored.created_at, first);
}

#[tokio::test]
async fn test_upsert_updates_changed_event_in_place() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    let first = parse_time("2024-06-01T12:00:00Z");
    let later = parse_time("2024-06-02T12:00:00Z");

    db.upsert_event(&user_id, draft("g-1", "Standup", "2024-06-10T09:00:00Z"), first)
        .await
        .unwrap();
    let action = db
        .upsert_event(&user_id, draft("g-1", "Retro", "2024-06-10T15:00:00Z"), later)
        .await
        .unwrap();
    assert_eq!(action, UpsertAction::Update);

    // Uniqueness: still a single row for (user, g-1)
    let events = db
        .get_events_in_range(
            &user_id,
            parse_time("2024-06-10T00:00:00Z"),
            parse_time("2024-06-10T23:59:59.999Z"),
        )
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "Retro");
    assert_eq!(events[0].created_at, first);
    assert_eq!(events[0].updated_at, later);
}

#[tokio::test]
async fn test_insert_duplicate_is_conflict() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    let event = test_event(&user_id, Some("g-dup"), "Lunch", "2024-06-10T12:00:00Z");

    db.insert_event(&event).await.unwrap();
    let err = db.insert_event(&event).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_range_query_is_inclusive_sorted_and_per_user() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    let other_user = unique_id("user");

    for event in [
        test_event(&user_id, Some("late"), "At end", "2024-06-10T23:59:59.999Z"),
        test_event(&user_id, Some("early"), "At start", "2024-06-10T00:00:00Z"),
        test_event(&user_id, Some("mid"), "Middle", "2024-06-10T12:00:00Z"),
        test_event(&user_id, Some("before"), "Before", "2024-06-09T23:59:59.999Z"),
        test_event(&user_id, Some("after"), "After", "2024-06-11T00:00:00Z"),
        test_event(&other_user, Some("mid"), "Someone else", "2024-06-10T12:00:00Z"),
    ] {
        db.insert_event(&event).await.unwrap();
    }

    let events = db
        .get_events_in_range(
            &user_id,
            parse_time("2024-06-10T00:00:00Z"),
            parse_time("2024-06-10T23:59:59.999Z"),
        )
        .await
        .unwrap();

    let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["At start", "Middle", "At end"]);
}
