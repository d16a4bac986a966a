// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth authentication routes.

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE, SESSION_TTL_DAYS};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/google", get(auth_start))
        .route("/auth/google/callback", get(auth_callback))
        .route("/auth/refresh", post(refresh_session))
        .route("/auth/logout", get(logout))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    /// If not provided, uses FRONTEND_URL env var.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start OAuth flow - redirect to Google consent screen.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
) -> Result<Redirect> {
    let frontend_url = match params.redirect_uri {
        Some(url) if state.config.is_allowed_frontend(&url) => url,
        Some(url) => {
            tracing::warn!(redirect_uri = %url, "Ignoring unrecognized redirect_uri");
            state.config.frontend_url.clone()
        }
        None => state.config.frontend_url.clone(),
    };

    let timestamp = u128::try_from(Utc::now().timestamp_millis())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?;
    let oauth_state = sign_state(&frontend_url, timestamp, &state.config.oauth_state_key)?;

    let auth_url = state.calendar.google().auth_url(&oauth_state);

    tracing::info!(
        frontend_url = %frontend_url,
        "Starting OAuth flow, redirecting to Google"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, store user, create session.
///
/// Every outcome is a redirect to the frontend, carrying either `token` or
/// `error` in the query string.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    let frontend_url = params
        .state
        .as_deref()
        .and_then(|s| verify_and_decode_state(s, &state.config.oauth_state_key))
        .unwrap_or_else(|| {
            tracing::warn!(
                "Missing or invalid state parameter, falling back to default frontend URL"
            );
            state.config.frontend_url.clone()
        });

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        return (jar, redirect_with(&frontend_url, "error", &error));
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return (jar, redirect_with(&frontend_url, "error", "no_code"));
    };

    let now = Utc::now();

    let mut user = match state.calendar.handle_oauth_callback(&code, now).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!(error = %e, "OAuth callback failed");
            return (jar, redirect_with(&frontend_url, "error", e.redirect_code()));
        }
    };

    // Initial import; login proceeds even if it fails.
    if let Err(e) = state.calendar.sync_events(&mut user, None, now).await {
        tracing::warn!(user_id = %user.id, error = %e, "Initial event sync failed");
    }

    let jwt = match create_jwt(&user.id, &state.config.jwt_signing_key, now) {
        Ok(jwt) => jwt,
        Err(e) => {
            tracing::error!(error = %e, "JWT creation failed");
            return (jar, redirect_with(&frontend_url, "error", "auth_failed"));
        }
    };

    let secure = !state.config.environment.is_development();
    let jar = jar.add(session_cookie(jwt.clone(), secure));

    (jar, redirect_with(&frontend_url, "token", &jwt))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RefreshResponse {
    pub token: String,
}

/// Exchange a stored Google refresh token for a new session token.
///
/// Any failure after the request is accepted (unknown token, Google
/// rejection, store errors) is reported as 401.
async fn refresh_session(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<RefreshResponse>> {
    let request: RefreshRequest = if body.is_empty() {
        RefreshRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|_| AppError::BadRequest("Invalid JSON body".to_string()))?
    };

    let refresh_token = request
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("Refresh token required".to_string()))?;

    let now = Utc::now();

    let user = state
        .calendar
        .refresh_session(&refresh_token, now)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Session refresh failed");
            AppError::InvalidToken
        })?;

    let token = create_jwt(&user.id, &state.config.jwt_signing_key, now)?;

    tracing::info!(user_id = %user.id, "Session refreshed");
    Ok(Json(RefreshResponse { token }))
}

/// Logout - clear the session cookie and go back to the frontend.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::temporary(&state.config.frontend_url))
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::days(SESSION_TTL_DAYS))
        .build()
}

fn redirect_with(frontend_url: &str, key: &str, value: &str) -> Redirect {
    let sep = if frontend_url.contains('?') { '&' } else { '?' };
    let url = format!(
        "{}{}{}={}",
        frontend_url,
        sep,
        key,
        urlencoding::encode(value)
    );
    Redirect::temporary(&url)
}

/// Build the signed OAuth state: base64("frontend_url|timestamp_hex|signature_hex").
fn sign_state(frontend_url: &str, timestamp_ms: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", frontend_url, timestamp_ms);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify HMAC signature and decode the frontend URL from the OAuth state parameter.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // The URL itself may contain '|', so split from the right.
    let mut parts = state_str.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let frontend_url = parts.next()?;

    let signature = hex::decode(signature_hex).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(format!("{}|{}", frontend_url, timestamp_hex).as_bytes());

    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch, possible tampering");
        return None;
    }

    Some(frontend_url.to_string())
}
