//! Sign-in API endpoints.
//!
//! - POST `/callback/credentials` - Email and password sign-in
//! - GET `/signin/{provider}` - Start an OAuth sign-in
//! - GET `/callback/{provider}` - Finish an OAuth sign-in
//! - GET `/session` - Current session, `{}` when signed out
//! - GET `/providers` - Configured sign-in providers
//! - GET `/verify` - 200 if the session is usable, 401 if not
//! - POST `/signout` - Invalidate the backend session and clear the cookie

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use super::error::ApiError;
use crate::auth::{
    Auth, OAUTH_CALLBACK_COOKIE_NAME, OAUTH_STATE_COOKIE_NAME, OptionalAuth, clear_cookie,
    get_cookie, oauth_cookie,
};
use crate::guard::LOGIN_PATH;
use crate::impl_has_session_manager;
use crate::jwt::unix_now;
use crate::oauth::{OAuthClient, Provider, generate_state};
use crate::rate_limit::{RateLimitConfig, rate_limit_sign_in};
use crate::session::{SessionManager, landing_path, redirect_target, session_view};

#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<SessionManager>,
    pub oauth: Arc<OAuthClient>,
    pub public_url: Arc<Url>,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_session_manager!(AuthState);

pub fn router(state: AuthState) -> Router {
    let credentials_router = Router::new()
        .route("/callback/credentials", post(credentials_callback))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_sign_in,
        ));

    let router = Router::new()
        .route("/signin/{provider}", get(oauth_sign_in))
        .route("/callback/{provider}", get(oauth_callback))
        .route("/session", get(get_session))
        .route("/providers", get(list_providers))
        .route("/verify", get(verify_session))
        .route("/signout", post(sign_out))
        .with_state(state);

    Router::new().merge(credentials_router).merge(router)
}

#[derive(Serialize)]
struct UrlResponse {
    url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsForm {
    email: String,
    password: String,
    #[serde(default)]
    callback_url: Option<String>,
}

/// Sign in with email and password. On success the session cookie is set and
/// the response names where the browser should go next.
async fn credentials_callback(
    State(state): State<AuthState>,
    Form(form): Form<CredentialsForm>,
) -> Result<impl IntoResponse, ApiError> {
    let now = unix_now();
    let token = state
        .sessions
        .sign_in_with_credentials(form.email.trim(), &form.password, now)
        .await?;

    let cookie = state
        .sessions
        .session_cookie(&token, now)
        .map_err(|e| ApiError::internal("Failed to sign session", e))?;

    let target = form
        .callback_url
        .as_deref()
        .unwrap_or_else(|| landing_path(&token));
    let url = redirect_target(target, &state.public_url);

    info!(sub = %token.sub, "Credentials sign-in");
    Ok(([(SET_COOKIE, cookie)], Json(UrlResponse { url })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInQuery {
    #[serde(default)]
    callback_url: Option<String>,
}

/// Redirect to the provider's consent page. The CSRF state and the callback
/// URL ride along in short-lived cookies scoped to `/api/auth`.
async fn oauth_sign_in(
    State(state): State<AuthState>,
    Path(provider): Path<String>,
    Query(query): Query<SignInQuery>,
) -> Result<Response, ApiError> {
    let provider = Provider::from_path(&provider)
        .ok_or_else(|| ApiError::not_found("Unknown provider"))?;

    let csrf_state = generate_state();
    let url = match state.oauth.authorization_url(provider, &csrf_state) {
        Ok(url) => url,
        Err(e) => {
            warn!(provider = provider.as_str(), error = %e, "OAuth sign-in unavailable");
            return Ok(Redirect::temporary(&login_error_url("OAuthSignin")).into_response());
        }
    };

    let secure = state.sessions.secure_cookies();
    let callback_cookie = match query.callback_url {
        Some(callback) => oauth_cookie(
            OAUTH_CALLBACK_COOKIE_NAME,
            &URL_SAFE_NO_PAD.encode(callback),
            secure,
        ),
        None => clear_cookie(OAUTH_CALLBACK_COOKIE_NAME, secure),
    };

    Ok((
        AppendHeaders([
            (SET_COOKIE, oauth_cookie(OAUTH_STATE_COOKIE_NAME, &csrf_state, secure)),
            (SET_COOKIE, callback_cookie),
        ]),
        Redirect::temporary(url.as_str()),
    )
        .into_response())
}

#[derive(Deserialize)]
struct CallbackQuery {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Provider redirect target. Always clears the OAuth cookies; failures send
/// the browser back to the sign-in page with an error code.
async fn oauth_callback(
    State(state): State<AuthState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> Response {
    let secure = state.sessions.secure_cookies();
    let clear_oauth_cookies = AppendHeaders([
        (SET_COOKIE, clear_cookie(OAUTH_STATE_COOKIE_NAME, secure)),
        (SET_COOKIE, clear_cookie(OAUTH_CALLBACK_COOKIE_NAME, secure)),
    ]);

    match complete_oauth(&state, &provider, &query, &headers).await {
        Ok((session_cookie, location)) => (
            clear_oauth_cookies,
            AppendHeaders([(SET_COOKIE, session_cookie)]),
            Redirect::temporary(&location),
        )
            .into_response(),
        Err(code) => (
            clear_oauth_cookies,
            Redirect::temporary(&login_error_url(code)),
        )
            .into_response(),
    }
}

/// Returns the session cookie and redirect location, or an error code.
async fn complete_oauth(
    state: &AuthState,
    provider: &str,
    query: &CallbackQuery,
    headers: &HeaderMap,
) -> Result<(String, String), &'static str> {
    let provider = Provider::from_path(provider).ok_or("OAuthSignin")?;

    if let Some(error) = &query.error {
        info!(provider = provider.as_str(), error = %error, "Provider refused sign-in");
        return Err("OAuthCallback");
    }

    let expected = get_cookie(headers, OAUTH_STATE_COOKIE_NAME);
    let state_matches = matches!(
        (expected, query.state.as_deref()),
        (Some(expected), Some(received)) if expected == received
    );
    if !state_matches {
        warn!(provider = provider.as_str(), "OAuth state mismatch");
        return Err("OAuthCallback");
    }

    let code = query.code.as_deref().ok_or("OAuthCallback")?;

    let access_token = state
        .oauth
        .exchange_code(provider, code)
        .await
        .map_err(|e| {
            warn!(provider = provider.as_str(), error = %e, "OAuth code exchange failed");
            "OAuthCallback"
        })?;

    let profile = state
        .oauth
        .fetch_profile(provider, &access_token)
        .await
        .map_err(|e| {
            warn!(provider = provider.as_str(), error = %e, "OAuth profile fetch failed");
            "OAuthCallback"
        })?;

    let now = unix_now();
    let token = state
        .sessions
        .sign_in_with_profile(&profile, now)
        .await
        .map_err(|e| {
            warn!(provider = provider.as_str(), error = %e, "OAuth sign-in rejected");
            e.code()
        })?;

    let cookie = state.sessions.session_cookie(&token, now).map_err(|e| {
        warn!(error = %e, "Failed to sign session");
        "Callback"
    })?;

    let callback = get_cookie(headers, OAUTH_CALLBACK_COOKIE_NAME)
        .and_then(|raw| URL_SAFE_NO_PAD.decode(raw).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok());
    let target = callback.as_deref().unwrap_or_else(|| landing_path(&token));

    info!(sub = %token.sub, provider = provider.as_str(), synced = token.backend_synced, "OAuth sign-in");
    Ok((cookie, redirect_target(target, &state.public_url)))
}

fn login_error_url(code: &str) -> String {
    format!("{}?error={}", LOGIN_PATH, code)
}

/// Current session. Sessions whose refresh failed are still returned with
/// their `error` set so the client can sign out.
async fn get_session(OptionalAuth(token): OptionalAuth) -> Response {
    match token {
        Some(token) => Json(session_view(&token)).into_response(),
        None => Json(serde_json::json!({})).into_response(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderInfo {
    id: &'static str,
    name: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    signin_url: String,
    callback_url: String,
}

async fn list_providers(State(state): State<AuthState>) -> impl IntoResponse {
    let base = state.public_url.as_str().trim_end_matches('/');
    let mut providers = BTreeMap::new();

    providers.insert(
        "credentials",
        ProviderInfo {
            id: "credentials",
            name: "Credentials",
            kind: "credentials",
            signin_url: format!("{}/api/auth/callback/credentials", base),
            callback_url: format!("{}/api/auth/callback/credentials", base),
        },
    );

    for provider in state.oauth.providers() {
        providers.insert(
            provider.as_str(),
            ProviderInfo {
                id: provider.as_str(),
                name: provider.display_name(),
                kind: "oauth",
                signin_url: format!("{}/api/auth/signin/{}", base, provider.as_str()),
                callback_url: state.oauth.redirect_uri(provider),
            },
        );
    }

    Json(providers)
}

/// Lightweight check that the session is still usable.
async fn verify_session(Auth(_token): Auth) -> impl IntoResponse {
    StatusCode::OK
}

/// Sign out. The cookie is cleared even when the backend logout fails.
async fn sign_out(State(state): State<AuthState>, headers: HeaderMap) -> impl IntoResponse {
    state.sessions.sign_out(&headers).await;

    (
        [(SET_COOKIE, state.sessions.clear_session_cookie())],
        Json(UrlResponse {
            url: LOGIN_PATH.to_string(),
        }),
    )
}
