// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API input validation tests.
//!
//! Invalid input must be rejected with 400 before the store or Google is
//! touched; the test app's store is offline, so reaching it would be a 500.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
};
use tower::ServiceExt;

mod common;

async fn send(method: &str, uri: &str, body: &str) -> Response {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn error_details(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["error"], "bad_request");
    json["details"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_days_out_of_range() {
    for days in ["0", "366", "-1", "abc", "7.5"] {
        let response = send("GET", &format!("/api/events?days={}", days), "").await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "days={} should be rejected",
            days
        );
    }
}

#[tokio::test]
async fn test_days_bounds_accepted() {
    for days in ["1", "365"] {
        let response = send("GET", &format!("/api/events?days={}", days), "").await;
        // Valid input reaches the (offline) store
        assert_eq!(
            response.status(),
            StatusCode::INTERNAL_SERVER_ERROR,
            "days={} should pass validation",
            days
        );
    }
}

#[tokio::test]
async fn test_invalid_start_date() {
    for start in ["yesterday", "2024-02-30", "10/06/2024"] {
        let response = send("GET", &format!("/api/events?startDate={}", start), "").await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "startDate={} should be rejected",
            start
        );
    }
}

#[tokio::test]
async fn test_create_event_requires_title() {
    let response = send(
        "POST",
        "/api/events",
        r#"{"title":"","start_time":"2024-06-10T09:00:00Z","end_time":"2024-06-10T10:00:00Z"}"#,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_details(response).await, "Title is required");
}

#[tokio::test]
async fn test_create_event_missing_fields() {
    let response = send("POST", "/api/events", r#"{"title":"Lunch"}"#).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_details(response).await, "Valid start time is required");
}

#[tokio::test]
async fn test_create_event_end_not_after_start() {
    for end in ["2024-06-10T09:00:00Z", "2024-06-10T08:00:00Z"] {
        let body = format!(
            r#"{{"title":"Standup","start_time":"2024-06-10T09:00:00Z","end_time":"{}"}}"#,
            end
        );
        let response = send("POST", "/api/events", &body).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error_details(response).await,
            "End time must be after start time"
        );
    }
}

#[tokio::test]
async fn test_create_event_malformed_json() {
    let response = send("POST", "/api/events", "{not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_rejects_bad_window() {
    let response = send(
        "POST",
        "/api/events/refresh",
        r#"{"timeMin":"not a time"}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        "POST",
        "/api/events/refresh",
        r#"{"timeMin":"2024-07-01T00:00:00Z","timeMax":"2024-06-01T00:00:00Z"}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
