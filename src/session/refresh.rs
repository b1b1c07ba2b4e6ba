//! Access token rotation.
//!
//! Valid tokens pass through untouched. Expired tokens are refreshed against
//! the backend (or extended locally under [`RefreshPolicy::DevExtend`]). A
//! failed refresh stamps the token with
//! [`SessionError::RefreshAccessTokenError`]; such tokens are never retried.

use std::future::Future;

use tracing::{debug, warn};

use super::{ACCESS_TOKEN_LIFETIME_SECS, SessionError, SessionToken};
use crate::backend::BackendError;

/// What to do once the backend access token expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Call the backend refresh endpoint.
    Remote,
    /// Extend expiry locally without calling the backend. Development only.
    DevExtend,
}

/// Tokens returned by a successful refresh call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds, when the backend reports one
    pub expires_in: Option<u64>,
}

/// Source of fresh access tokens.
pub trait TokenRefresher {
    fn refresh_tokens(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<RefreshedTokens, BackendError>> + Send;
}

/// Result of rotating a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenUpdate {
    /// Token is returned as it was; no need to re-sign the cookie.
    Unchanged(SessionToken),
    /// Token changed and must be re-signed.
    Updated(SessionToken),
}

impl TokenUpdate {
    pub fn token(&self) -> &SessionToken {
        match self {
            TokenUpdate::Unchanged(token) | TokenUpdate::Updated(token) => token,
        }
    }

    pub fn into_token(self) -> SessionToken {
        match self {
            TokenUpdate::Unchanged(token) | TokenUpdate::Updated(token) => token,
        }
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, TokenUpdate::Updated(_))
    }
}

/// Rotate `token` for a read at `now`.
///
/// Reads: `access_token_expires`, `refresh_token`, `error`.
/// Writes (only when expired): `access_token`, `refresh_token`,
/// `access_token_expires`, `error`.
pub async fn rotate_token<R: TokenRefresher>(
    mut token: SessionToken,
    now: u64,
    policy: RefreshPolicy,
    refresher: &R,
) -> TokenUpdate {
    if token.error.is_some() || now < token.access_token_expires {
        return TokenUpdate::Unchanged(token);
    }

    match policy {
        RefreshPolicy::DevExtend => {
            debug!(sub = %token.sub, "Extending expired access token (development)");
            token.access_token_expires = now + ACCESS_TOKEN_LIFETIME_SECS;
        }
        RefreshPolicy::Remote => {
            let Some(refresh_token) = token.refresh_token.clone() else {
                debug!(sub = %token.sub, "Expired session has no refresh token");
                token.error = Some(SessionError::RefreshAccessTokenError);
                return TokenUpdate::Updated(token);
            };

            match refresher.refresh_tokens(&refresh_token).await {
                Ok(fresh) => {
                    token.access_token = fresh.access_token;
                    if let Some(rotated) = fresh.refresh_token {
                        token.refresh_token = Some(rotated);
                    }
                    token.access_token_expires =
                        now + fresh.expires_in.unwrap_or(ACCESS_TOKEN_LIFETIME_SECS);
                }
                Err(e) => {
                    warn!(sub = %token.sub, error = %e, "Failed to refresh access token");
                    token.error = Some(SessionError::RefreshAccessTokenError);
                }
            }
        }
    }

    TokenUpdate::Updated(token)
}
