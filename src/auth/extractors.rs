//! Axum extractors and middleware for the session cookie.

use std::cell::RefCell;

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderValue, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::Response,
};

use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasSessionManager;
use crate::jwt::unix_now;
use crate::session::SessionToken;

tokio::task_local! {
    /// Task-local storage for a re-signed session cookie.
    /// Used to pass the cookie from session resolution to the response middleware.
    pub static NEW_SESSION_COOKIE: RefCell<Option<String>>;
}

/// Stash a re-signed session cookie for the current response.
/// Outside an [`add_session_cookie`] scope this is a no-op.
pub fn stash_session_cookie(cookie: String) {
    let _ = NEW_SESSION_COOKIE.try_with(|cell| {
        cell.borrow_mut().replace(cookie);
    });
}

fn discard_stashed_cookie() {
    let _ = NEW_SESSION_COOKIE.try_with(|cell| cell.borrow_mut().take());
}

/// Middleware that appends any stashed session cookie to the response.
/// Must wrap every route that resolves sessions.
pub async fn add_session_cookie(request: Request, next: Next) -> Response {
    NEW_SESSION_COOKIE
        .scope(RefCell::new(None), async move {
            let mut response = next.run(request).await;
            let cookie = NEW_SESSION_COOKIE.with(|cell| cell.borrow_mut().take());
            if let Some(cookie) = cookie {
                if let Ok(value) = HeaderValue::from_str(&cookie) {
                    response.headers_mut().append(SET_COOKIE, value);
                }
            }
            response
        })
        .await
}

/// Extractor for endpoints that require a usable session.
/// Returns JSON errors instead of redirects.
pub struct Auth(pub SessionToken);

impl<S> FromRequestParts<S> for Auth
where
    S: HasSessionManager + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = state.sessions();
        let now = unix_now();

        let token = sessions
            .resolve(&parts.headers, now)
            .await
            .ok_or_else(|| {
                ApiAuthError::new(AuthErrorKind::NotAuthenticated, sessions.secure_cookies())
            })?;

        if !token.is_usable(now) {
            // The clearing cookie must win over a re-signed one
            discard_stashed_cookie();
            return Err(ApiAuthError::new(
                AuthErrorKind::SessionExpired,
                sessions.secure_cookies(),
            ));
        }

        Ok(Auth(token))
    }
}

/// Optional session extractor - never fails.
/// The token may carry a refresh error; callers must check.
pub struct OptionalAuth(pub Option<SessionToken>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: HasSessionManager + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(
            state.sessions().resolve(&parts.headers, unix_now()).await,
        ))
    }
}

/// Session already resolved by the route guard for this request.
/// Never resolves again, so a token is refreshed at most once per request.
pub struct GuardedSession(pub Option<SessionToken>);

impl<S> FromRequestParts<S> for GuardedSession
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(GuardedSession(parts.extensions.get::<SessionToken>().cloned()))
    }
}
