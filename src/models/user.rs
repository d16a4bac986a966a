//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User profile and Google credentials stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Local user ID (the Google subject ID, also used as document ID)
    pub id: String,
    /// Google account subject ID
    pub google_id: String,
    pub email: String,
    /// Display name
    pub name: String,
    /// Google OAuth access token
    pub access_token: Option<String>,
    /// Google OAuth refresh token
    pub refresh_token: Option<String>,
    /// When the access token expires
    #[serde(default, with = "crate::time_utils::rfc3339_millis_option")]
    pub token_expiry: Option<DateTime<Utc>>,
    #[serde(with = "crate::time_utils::rfc3339_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::time_utils::rfc3339_millis")]
    pub updated_at: DateTime<Utc>,
}

/// Profile details reported by Google for a signed-in account.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub google_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Tokens obtained from Google during login.
#[derive(Debug, Clone)]
pub struct LoginTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl User {
    /// Build the user record to store after a successful Google login.
    ///
    /// An existing record keeps its refresh token, email and name when Google
    /// does not report new values; Google only returns a refresh token on
    /// the first consent.
    pub fn from_login(
        existing: Option<User>,
        profile: UserProfile,
        tokens: LoginTokens,
        now: DateTime<Utc>,
    ) -> User {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        match existing {
            Some(mut user) => {
                user.access_token = Some(tokens.access_token);
                if let Some(refresh) = tokens.refresh_token {
                    user.refresh_token = Some(refresh);
                }
                user.token_expiry = tokens.expires_at;
                if let Some(email) = non_empty(profile.email) {
                    user.email = email;
                }
                if let Some(name) = non_empty(profile.name) {
                    user.name = name;
                }
                user.updated_at = now;
                user
            }
            None => User {
                id: profile.google_id.clone(),
                google_id: profile.google_id,
                email: non_empty(profile.email).unwrap_or_default(),
                name: non_empty(profile.name).unwrap_or_default(),
                access_token: Some(tokens.access_token),
                refresh_token: tokens.refresh_token,
                token_expiry: tokens.expires_at,
                created_at: now,
                updated_at: now,
            },
        }
    }
}
