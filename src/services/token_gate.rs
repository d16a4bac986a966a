// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access token refresh gate.
//!
//! Every Google call goes through [`refresh_if_expired`] first. The current
//! time is passed in so expiry decisions are deterministic under test.

use crate::error::AppError;
use crate::models::User;
use crate::services::google::GoogleClient;
use chrono::{DateTime, Utc};

/// True when the stored access token must be refreshed before use.
///
/// A missing expiry means the token is used as-is.
pub fn needs_refresh(token_expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match token_expiry {
        None => false,
        Some(expiry) => now >= expiry,
    }
}

/// Refresh the user's access token if it has expired.
///
/// Returns `true` when the user record changed and must be persisted.
pub async fn refresh_if_expired(
    google: &GoogleClient,
    user: &mut User,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    if !needs_refresh(user.token_expiry, now) {
        return Ok(false);
    }

    tracing::info!(user_id = %user.id, "Access token expired, refreshing");
    apply_refresh(google, user, now).await?;
    Ok(true)
}

/// Exchange the stored refresh token and write the new credentials into
/// `user`.
///
/// The access token is always replaced. Expiry and refresh token are only
/// replaced when Google returns new values.
pub async fn apply_refresh(
    google: &GoogleClient,
    user: &mut User,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let refresh_token = user
        .refresh_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::GoogleAuth("No refresh token stored".to_string()))?;

    let grant = google.refresh_access_token(refresh_token).await?;

    if let Some(access_token) = grant.access_token.clone() {
        user.access_token = Some(access_token);
    }
    if let Some(expiry) = grant.expires_at(now) {
        user.token_expiry = Some(expiry);
    }
    if let Some(rotated) = grant.refresh_token {
        user.refresh_token = Some(rotated);
    }
    user.updated_at = now;

    tracing::info!(user_id = %user.id, "Access token refreshed");
    Ok(())
}
