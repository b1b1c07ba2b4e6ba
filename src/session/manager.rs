//! Session lifecycle: sign-in, per-request resolution, sign-out.

use axum::http::HeaderMap;
use tracing::{debug, info, warn};

use super::callbacks::{initial_token, sign_in_allowed};
use super::providers::{SocialFallback, authorize_credentials, resolve_social_profile};
use super::refresh::{RefreshPolicy, rotate_token};
use super::{AccountKind, SessionToken};
use crate::auth::{SESSION_COOKIE_NAME, clear_cookie, get_cookie, session_cookie, stash_session_cookie};
use crate::backend::BackendClient;
use crate::jwt::{JwtError, SessionCodec};
use crate::oauth::SocialProfile;

/// Why a sign-in did not produce a session.
#[derive(Debug, thiserror::Error)]
pub enum SignInError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("sign-in denied")]
    AccessDenied,
    #[error("social login backend unavailable")]
    BackendUnavailable,
    #[error(transparent)]
    Encoding(#[from] JwtError),
}

impl SignInError {
    /// Error code reported to the sign-in page.
    pub fn code(&self) -> &'static str {
        match self {
            SignInError::InvalidCredentials => "CredentialsSignin",
            SignInError::AccessDenied => "AccessDenied",
            SignInError::BackendUnavailable => "OAuthSignin",
            SignInError::Encoding(_) => "Callback",
        }
    }
}

/// Owns the session codec, the backend client and the session policies.
pub struct SessionManager {
    codec: SessionCodec,
    backend: BackendClient,
    refresh_policy: RefreshPolicy,
    social_fallback: SocialFallback,
    secure_cookies: bool,
}

impl SessionManager {
    pub fn new(
        codec: SessionCodec,
        backend: BackendClient,
        refresh_policy: RefreshPolicy,
        social_fallback: SocialFallback,
        secure_cookies: bool,
    ) -> Self {
        Self {
            codec,
            backend,
            refresh_policy,
            social_fallback,
            secure_cookies,
        }
    }

    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }

    /// Sign in with email and password.
    pub async fn sign_in_with_credentials(
        &self,
        email: &str,
        password: &str,
        now: u64,
    ) -> Result<SessionToken, SignInError> {
        let user = authorize_credentials(&self.backend, email, password)
            .await
            .ok_or(SignInError::InvalidCredentials)?;

        if !sign_in_allowed(&user, AccountKind::Credentials) {
            info!(
                sub = %user.id,
                verified = user.is_email_verified,
                active = user.is_active,
                "Credentials sign-in denied for unverified or inactive account"
            );
            return Err(SignInError::AccessDenied);
        }

        Ok(initial_token(user, AccountKind::Credentials, "credentials", now))
    }

    /// Sign in with a profile returned by an OAuth provider.
    pub async fn sign_in_with_profile(
        &self,
        profile: &SocialProfile,
        now: u64,
    ) -> Result<SessionToken, SignInError> {
        let user = resolve_social_profile(&self.backend, profile, self.social_fallback)
            .await
            .ok_or(SignInError::BackendUnavailable)?;

        if !sign_in_allowed(&user, AccountKind::OAuth) {
            return Err(SignInError::AccessDenied);
        }

        Ok(initial_token(
            user,
            AccountKind::OAuth,
            profile.provider.as_str(),
            now,
        ))
    }

    /// `Set-Cookie` value carrying `token`, signed at `now`.
    pub fn session_cookie(&self, token: &SessionToken, now: u64) -> Result<String, JwtError> {
        let encoded = self.codec.encode(token, now)?;
        Ok(session_cookie(
            &encoded.token,
            encoded.max_age,
            self.secure_cookies,
        ))
    }

    /// `Set-Cookie` value removing the session.
    pub fn clear_session_cookie(&self) -> String {
        clear_cookie(SESSION_COOKIE_NAME, self.secure_cookies)
    }

    /// Decode the request's session cookie and rotate it for `now`.
    ///
    /// When the token changes (refresh, development extension, or refresh
    /// failure) the re-signed cookie is stashed for the response. The
    /// returned token may carry an error flag; callers decide what that means.
    pub async fn resolve(&self, headers: &HeaderMap, now: u64) -> Option<SessionToken> {
        let raw = get_cookie(headers, SESSION_COOKIE_NAME)?;
        let token = match self.codec.decode(raw) {
            Ok(token) => token,
            Err(e) => {
                debug!(error = %e, "Ignoring invalid session cookie");
                return None;
            }
        };

        if !token.backend_synced {
            warn!(sub = %token.sub, provider = %token.provider, "Using unsynced fallback session");
        }

        let update = rotate_token(token, now, self.refresh_policy, &self.backend).await;
        if update.is_updated() {
            match self.session_cookie(update.token(), now) {
                Ok(cookie) => stash_session_cookie(cookie),
                Err(e) => warn!(error = %e, "Failed to re-sign rotated session"),
            }
        }

        Some(update.into_token())
    }

    /// Best-effort backend invalidation of the request's session.
    /// Never fails; the caller clears the cookie regardless.
    pub async fn sign_out(&self, headers: &HeaderMap) {
        let Some(raw) = get_cookie(headers, SESSION_COOKIE_NAME) else {
            return;
        };
        let Ok(token) = self.codec.decode(raw) else {
            return;
        };

        if !token.backend_synced {
            debug!(sub = %token.sub, "Skipping backend logout for unsynced session");
            return;
        }

        if let Err(e) = self.backend.logout(&token.access_token).await {
            warn!(sub = %token.sub, error = %e, "Backend logout failed");
        }
    }
}
