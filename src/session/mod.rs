//! Session state and the callback pipeline that drives it.
//!
//! A session is a [`SessionToken`] signed into a cookie. It is created at
//! sign-in from an [`AuthorizedUser`], rotated on reads once the backend
//! access token expires, and destroyed at sign-out.

mod callbacks;
mod manager;
mod providers;
mod refresh;

pub use callbacks::{
    SessionUser, SessionView, initial_token, landing_path, redirect_target, session_view,
    sign_in_allowed,
};
pub use manager::{SessionManager, SignInError};
pub use providers::{
    SOCIAL_FALLBACK_TOKEN, SocialFallback, authorize_credentials, fallback_user,
    initials_avatar_url, resolve_social_profile,
};
pub use refresh::{RefreshPolicy, RefreshedTokens, TokenRefresher, TokenUpdate, rotate_token};

use serde::{Deserialize, Serialize};

use crate::role::{self, Role};

/// Lifetime of a backend access token, matching the backend's own expiry.
pub const ACCESS_TOKEN_LIFETIME_SECS: u64 = 60 * 60;

/// How the user signed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Credentials,
    OAuth,
}

/// Error flag carried on a token whose refresh failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionError {
    RefreshAccessTokenError,
}

/// Normalized user returned by a sign-in provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub image: Option<String>,
    pub role: Option<Role>,
    pub is_email_verified: bool,
    pub is_active: bool,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// False when the user was fabricated locally because the backend could
    /// not be reached.
    pub backend_synced: bool,
}

/// Session state carried in the signed session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    /// Subject (backend user id)
    pub sub: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, deserialize_with = "role::deserialize_lenient")]
    pub role: Option<Role>,
    pub is_email_verified: bool,
    pub is_active: bool,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix seconds after which the access token must be refreshed
    pub access_token_expires: u64,
    pub account: AccountKind,
    pub provider: String,
    #[serde(default = "default_true")]
    pub backend_synced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionError>,
}

fn default_true() -> bool {
    true
}

impl SessionToken {
    /// Whether the access token may be used at `now`.
    pub fn is_usable(&self, now: u64) -> bool {
        self.error.is_none() && now < self.access_token_expires
    }

    /// Whether the user has finished onboarding.
    pub fn is_onboarded(&self) -> bool {
        self.is_active && self.is_email_verified
    }
}
