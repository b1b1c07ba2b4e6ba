//! HTTP client for the external backend's auth endpoints.
//!
//! Every call is a single request with no retries. Callers decide what a
//! failure means; this layer only reports it.

mod types;

pub use types::{
    BackendUser, LoginResponse, RefreshRequest, RefreshResponse, SocialLoginRequest, coerce_bool,
};

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::session::{RefreshedTokens, TokenRefresher};

/// User agent sent on every outbound request.
pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const LOGIN_PATH: &str = "auth/login";
const SOCIAL_LOGIN_PATH: &str = "auth/social-login";
const REFRESH_PATH: &str = "auth/refresh";
const LOGOUT_PATH: &str = "auth/logout";

/// Errors from a single backend call.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },
    #[error("invalid response from {endpoint}: {source}")]
    Decode {
        endpoint: &'static str,
        source: reqwest::Error,
    },
}

/// Build the shared outbound HTTP client.
pub fn http_client(timeout: Duration) -> Result<Client, BackendError> {
    Client::builder()
        .user_agent(APP_USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(BackendError::Client)
}

#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(http: Client, base_url: &Url) -> Self {
        Self {
            http,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Exchange email and password for a user record and tokens.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, BackendError> {
        let request = self
            .http
            .post(self.endpoint(LOGIN_PATH))
            .form(&[("username", email), ("password", password)]);
        send_json(request, LOGIN_PATH).await
    }

    /// Get or create the backend user for a social sign-in.
    pub async fn social_login(
        &self,
        body: &SocialLoginRequest<'_>,
    ) -> Result<LoginResponse, BackendError> {
        let request = self.http.post(self.endpoint(SOCIAL_LOGIN_PATH)).json(body);
        send_json(request, SOCIAL_LOGIN_PATH).await
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, BackendError> {
        let request = self
            .http
            .post(self.endpoint(REFRESH_PATH))
            .json(&RefreshRequest { refresh_token });
        send_json(request, REFRESH_PATH).await
    }

    /// Invalidate an access token on the backend.
    pub async fn logout(&self, access_token: &str) -> Result<(), BackendError> {
        let response = self
            .http
            .post(self.endpoint(LOGOUT_PATH))
            .bearer_auth(access_token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|source| BackendError::Transport {
                endpoint: LOGOUT_PATH,
                source,
            })?;

        check_status(response.status(), LOGOUT_PATH)
    }
}

impl TokenRefresher for BackendClient {
    async fn refresh_tokens(&self, refresh_token: &str) -> Result<RefreshedTokens, BackendError> {
        let response = self.refresh(refresh_token).await?;
        Ok(RefreshedTokens {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
        })
    }
}

async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    endpoint: &'static str,
) -> Result<T, BackendError> {
    let response = request
        .send()
        .await
        .map_err(|source| BackendError::Transport { endpoint, source })?;

    check_status(response.status(), endpoint)?;

    response
        .json::<T>()
        .await
        .map_err(|source| BackendError::Decode { endpoint, source })
}

fn check_status(status: StatusCode, endpoint: &'static str) -> Result<(), BackendError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(BackendError::Status { endpoint, status })
    }
}
