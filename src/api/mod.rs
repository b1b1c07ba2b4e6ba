mod auth;
mod error;

use axum::Router;
use std::sync::Arc;
use url::Url;

use crate::oauth::OAuthClient;
use crate::rate_limit::RateLimitConfig;
use crate::session::SessionManager;

pub use auth::AuthState;
pub use error::ApiError;

/// Create the API router, mounted at `/api`.
pub fn create_api_router(
    sessions: Arc<SessionManager>,
    oauth: Arc<OAuthClient>,
    public_url: Url,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = auth::AuthState {
        sessions,
        oauth,
        public_url: Arc::new(public_url),
        rate_limit_config,
    };

    Router::new().nest("/auth", auth::router(auth_state))
}
