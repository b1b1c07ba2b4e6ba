//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::ClientIpHeader;
use crate::oauth::{OAuthProvider, Provider};
use crate::session::{RefreshPolicy, SocialFallback};
use clap::Parser;
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const SESSION_SECRET_ENV: &str = "NEXTAUTH_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Deployment environment.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RuntimeMode {
    Development,
    #[default]
    Production,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "prepwithai",
    about = "Authentication gateway for the PrepWithAI Himachal exam-prep platform"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Base URL of the backend API
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:8000/api/v1")]
    pub backend_url: String,

    /// Public URL of this application (OAuth redirects, callback URL checks)
    #[arg(long, env = "NEXTAUTH_URL", default_value = "http://localhost:3000")]
    pub public_url: String,

    /// Deployment environment
    #[arg(long, env = "APP_ENV", default_value = "production")]
    pub environment: RuntimeMode,

    /// Extend expired access tokens locally instead of refreshing them (development only)
    #[arg(long, env = "DEV_EXTEND_TOKENS")]
    pub dev_extend_tokens: bool,

    /// Whether OAuth sign-in may proceed with a local session when the backend is unreachable
    #[arg(long, env = "SOCIAL_FALLBACK", default_value = "allow")]
    pub social_fallback: SocialFallback,

    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub google_client_secret: Option<String>,

    #[arg(long, env = "GITHUB_CLIENT_ID")]
    pub github_client_id: Option<String>,

    #[arg(long, env = "GITHUB_CLIENT_SECRET", hide_env_values = true)]
    pub github_client_secret: Option<String>,

    /// Timeout in seconds for backend and provider requests
    #[arg(long, env = "BACKEND_TIMEOUT_SECS", default_value = "10")]
    pub backend_timeout_secs: u64,

    /// Read the client IP from this header (requires running behind a proxy)
    #[arg(long, env = "IP_HEADER")]
    pub ip_header: Option<ClientIpHeader>,

    /// Path to file containing the session secret. Prefer using NEXTAUTH_SECRET env var instead
    #[arg(long)]
    pub session_secret_file: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the session secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_session_secret(session_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(SESSION_SECRET_ENV) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(SESSION_SECRET_ENV) };
        secret
    } else if let Some(path) = session_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read session secret file");
                return None;
            }
        }
    } else {
        error!(
            "Session secret is required. Set NEXTAUTH_SECRET environment variable (recommended) or use --session-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_SESSION_SECRET_LENGTH {
        error!(
            "Session secret is shorter than {} characters. Use a longer secret",
            MIN_SESSION_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Parse and validate a URL argument.
/// Returns None and logs an error if validation fails.
pub fn validate_url(name: &str, value: &str) -> Option<Url> {
    let url = match Url::parse(value) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %value, error = %e, "Invalid {}", name);
            return None;
        }
    };

    if !matches!(url.scheme(), "http" | "https") {
        error!(url = %value, "{} must use http or https", name);
        return None;
    }

    Some(url)
}

/// Refresh policy for the given environment. Local extension is refused
/// outside development.
pub fn refresh_policy(environment: RuntimeMode, dev_extend_tokens: bool) -> Option<RefreshPolicy> {
    match (environment, dev_extend_tokens) {
        (_, false) => Some(RefreshPolicy::Remote),
        (RuntimeMode::Development, true) => {
            warn!("Access tokens are extended locally; the backend is never asked to refresh");
            Some(RefreshPolicy::DevExtend)
        }
        (RuntimeMode::Production, true) => {
            error!("--dev-extend-tokens is only allowed with --environment development");
            None
        }
    }
}

/// Providers with both a client id and a client secret.
pub fn oauth_providers(args: &Args) -> Vec<OAuthProvider> {
    let candidates = [
        (
            Provider::Google,
            &args.google_client_id,
            &args.google_client_secret,
        ),
        (
            Provider::Github,
            &args.github_client_id,
            &args.github_client_secret,
        ),
    ];

    candidates
        .into_iter()
        .filter_map(|(provider, id, secret)| match (id, secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                match OAuthProvider::new(provider, id.clone(), secret.clone()) {
                    Ok(configured) => {
                        info!(provider = provider.as_str(), "OAuth provider enabled");
                        Some(configured)
                    }
                    Err(e) => {
                        error!(
                            provider = provider.as_str(),
                            error = %e,
                            "Invalid OAuth provider endpoints; disabled"
                        );
                        None
                    }
                }
            }
            (None, None) => None,
            _ => {
                warn!(
                    provider = provider.as_str(),
                    "OAuth provider needs both a client id and a client secret; disabled"
                );
                None
            }
        })
        .collect()
}

/// Build ServerConfig from validated arguments.
/// Returns None and logs an error if the arguments are inconsistent.
pub fn build_config(args: &Args, session_secret: String) -> Option<ServerConfig> {
    let backend_url = validate_url("backend-url", &args.backend_url)?;
    let public_url = validate_url("public-url", &args.public_url)?;
    let refresh_policy = refresh_policy(args.environment, args.dev_extend_tokens)?;
    let secure_cookies = public_url.scheme() == "https";

    Some(ServerConfig {
        backend_url,
        public_url,
        session_secret: session_secret.into_bytes(),
        secure_cookies,
        refresh_policy,
        social_fallback: args.social_fallback,
        oauth_providers: oauth_providers(args),
        ip_header: args.ip_header,
        backend_timeout: Duration::from_secs(args.backend_timeout_secs),
    })
}
