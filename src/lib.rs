pub mod api;
pub mod auth;
pub mod backend;
pub mod cli;
pub mod guard;
pub mod jwt;
pub mod oauth;
pub mod pages;
pub mod rate_limit;
pub mod role;
pub mod session;

use api::create_api_router;
use auth::{ClientIpHeader, add_session_cookie};
use axum::{Router, middleware};
use backend::{BackendClient, BackendError, http_client};
use guard::route_guard;
use jwt::SessionCodec;
use oauth::{OAuthClient, OAuthProvider};
use rate_limit::RateLimitConfig;
use session::{RefreshPolicy, SessionManager, SocialFallback};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

pub struct ServerConfig {
    /// Base URL of the backend API (e.g., "http://localhost:8000/api/v1")
    pub backend_url: Url,
    /// Public URL of this application, used for OAuth redirects and callback checks
    pub public_url: Url,
    /// Secret for signing session cookies
    pub session_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// What to do when a backend access token expires
    pub refresh_policy: RefreshPolicy,
    /// Whether OAuth sign-in may proceed when the backend is unreachable
    pub social_fallback: SocialFallback,
    /// Configured OAuth providers
    pub oauth_providers: Vec<OAuthProvider>,
    /// Header to read the client IP from (requires running behind a proxy)
    pub ip_header: Option<ClientIpHeader>,
    /// Timeout for backend and provider requests
    pub backend_timeout: Duration,
}

/// Create the application router with the given configuration.
/// Must be called from within a Tokio runtime: it spawns the rate limiter cleanup task.
pub fn create_app(config: &ServerConfig) -> Result<Router, BackendError> {
    let http = http_client(config.backend_timeout)?;

    let sessions = Arc::new(SessionManager::new(
        SessionCodec::new(&config.session_secret),
        BackendClient::new(http.clone(), &config.backend_url),
        config.refresh_policy,
        config.social_fallback,
        config.secure_cookies,
    ));

    let oauth = Arc::new(OAuthClient::new(
        http,
        config.public_url.clone(),
        config.oauth_providers.clone(),
    ));

    let rate_limit_config = Arc::new(RateLimitConfig::new(config.ip_header));
    rate_limit::spawn_cleanup_scheduler(rate_limit_config.clone());

    let api_router = create_api_router(
        sessions.clone(),
        oauth,
        config.public_url.clone(),
        rate_limit_config,
    );

    // The cookie layer must wrap the guard so cookies re-signed while
    // guarding reach the response.
    Ok(Router::new()
        .nest("/api", api_router)
        .merge(pages::router())
        .layer(middleware::from_fn_with_state(sessions, route_guard))
        .layer(middleware::from_fn(add_session_cookie)))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config).map_err(std::io::Error::other)?;
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
