#![allow(dead_code)]

use axum::{
    Form, Json, Router,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, Response, StatusCode},
    response::IntoResponse,
    routing,
};
use prepwithai::{
    ServerConfig, create_app,
    jwt::{SessionCodec, unix_now},
    oauth::{OAuthProvider, Provider, ProviderEndpoints},
    role::Role,
    session::{AccountKind, RefreshPolicy, SessionToken, SocialFallback},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

pub const SESSION_SECRET: &[u8] = b"test-session-secret-0123456789abcdef";
pub const PUBLIC_URL: &str = "http://localhost:3000";
pub const PASSWORD: &str = "correct-password";
pub const CLIENT_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 40000);

/// How the fake backend answers.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    pub social_login_fails: bool,
    pub refresh_fails: bool,
    pub logout_fails: bool,
}

/// Calls the fake backend received, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Login { username: String },
    SocialLogin { email: String, provider: String },
    Refresh { refresh_token: String },
    Logout { bearer: Option<String> },
    ProviderToken { code: String },
    ProviderUserinfo,
    GithubUser,
    GithubEmails,
}

#[derive(Clone, Default)]
struct BackendState {
    calls: Arc<Mutex<Vec<Call>>>,
    behavior: Arc<Mutex<Behavior>>,
}

impl BackendState {
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn behavior(&self) -> Behavior {
        self.behavior.lock().unwrap().clone()
    }
}

/// Fake backend API and OAuth provider on a random local port.
pub struct FakeBackend {
    pub addr: SocketAddr,
    state: BackendState,
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start(behavior: Behavior) -> Self {
        let state = BackendState::default();
        *state.behavior.lock().unwrap() = behavior;

        let app = Router::new()
            .route("/api/v1/auth/login", routing::post(login))
            .route("/api/v1/auth/social-login", routing::post(social_login))
            .route("/api/v1/auth/refresh", routing::post(refresh))
            .route("/api/v1/auth/logout", routing::post(logout))
            .route("/oauth/token", routing::post(provider_token))
            .route("/oauth/userinfo", routing::get(provider_userinfo))
            .route("/oauth/github/user", routing::get(github_user))
            .route("/oauth/github/emails", routing::get(github_emails))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            state,
            _handle: handle,
        }
    }

    pub fn api_url(&self) -> Url {
        Url::parse(&format!("http://{}/api/v1", self.addr)).unwrap()
    }

    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.addr, path)).unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn refresh_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Refresh { .. }))
            .count()
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.state.behavior.lock().unwrap() = behavior;
    }
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

fn backend_user(id: u64, email: &str, role: &str, verified: bool, active: bool) -> Value {
    json!({
        "id": id,
        "email": email,
        "full_name": "Test User",
        "role": role,
        "is_email_verified": verified,
        "is_active": active,
    })
}

async fn login(State(state): State<BackendState>, Form(form): Form<LoginForm>) -> impl IntoResponse {
    state.record(Call::Login {
        username: form.username.clone(),
    });

    if form.password != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Incorrect email or password"})),
        );
    }

    let user = match form.username.as_str() {
        "student@example.com" => backend_user(1, "student@example.com", "student", true, true),
        "teacher@example.com" => backend_user(2, "teacher@example.com", "teacher", true, true),
        "admin@example.com" => backend_user(3, "admin@example.com", "admin", true, true),
        "unverified@example.com" => {
            backend_user(4, "unverified@example.com", "student", false, true)
        }
        "inactive@example.com" => backend_user(5, "inactive@example.com", "student", true, false),
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"detail": "Incorrect email or password"})),
            );
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "access_token": format!("access-{}", user["id"]),
            "refresh_token": format!("refresh-{}", user["id"]),
            "token_type": "bearer",
            "user": user,
        })),
    )
}

#[derive(Deserialize)]
struct SocialLoginBody {
    email: String,
    provider: String,
}

async fn social_login(
    State(state): State<BackendState>,
    Json(body): Json<SocialLoginBody>,
) -> impl IntoResponse {
    state.record(Call::SocialLogin {
        email: body.email.clone(),
        provider: body.provider,
    });

    if state.behavior().social_login_fails {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "boom"})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "access_token": "social-access",
            "refresh_token": "social-refresh",
            "user": backend_user(9, &body.email, "student", false, true),
        })),
    )
}

#[derive(Deserialize)]
struct RefreshBody {
    refresh_token: String,
}

async fn refresh(
    State(state): State<BackendState>,
    Json(body): Json<RefreshBody>,
) -> impl IntoResponse {
    state.record(Call::Refresh {
        refresh_token: body.refresh_token,
    });

    if state.behavior().refresh_fails {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Invalid refresh token"})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "access_token": "refreshed-access",
            "refresh_token": "refreshed-refresh",
            "expires_in": 1800,
        })),
    )
}

async fn logout(State(state): State<BackendState>, headers: HeaderMap) -> impl IntoResponse {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    state.record(Call::Logout { bearer });

    if state.behavior().logout_fails {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

#[derive(Deserialize)]
struct TokenForm {
    code: String,
}

async fn provider_token(
    State(state): State<BackendState>,
    Form(form): Form<TokenForm>,
) -> impl IntoResponse {
    state.record(Call::ProviderToken { code: form.code });
    Json(json!({"access_token": "provider-access", "token_type": "Bearer"}))
}

async fn provider_userinfo(State(state): State<BackendState>) -> impl IntoResponse {
    state.record(Call::ProviderUserinfo);
    Json(json!({
        "sub": "google-123",
        "email": "asha@gmail.com",
        "name": "Asha Verma",
        "picture": "https://lh3.example.com/asha.png",
    }))
}

/// A GitHub account that keeps its email private.
async fn github_user(State(state): State<BackendState>) -> impl IntoResponse {
    state.record(Call::GithubUser);
    Json(json!({
        "id": 4242,
        "login": "asha-dev",
        "name": null,
        "email": null,
        "avatar_url": "https://avatars.example.com/u/4242",
    }))
}

async fn github_emails(State(state): State<BackendState>) -> impl IntoResponse {
    state.record(Call::GithubEmails);
    Json(json!([
        {"email": "asha@users.noreply.github.com", "primary": false, "verified": true},
        {"email": "old-asha@example.com", "primary": false, "verified": false},
        {"email": "asha@example.com", "primary": true, "verified": true},
    ]))
}

/// Options for building the app under test.
pub struct TestApp {
    pub app: Router,
    pub backend: FakeBackend,
    pub codec: SessionCodec,
}

pub struct TestSetup {
    behavior: Behavior,
    refresh_policy: RefreshPolicy,
    social_fallback: SocialFallback,
    backend_down: bool,
    github: bool,
}

impl TestSetup {
    pub fn new() -> Self {
        Self {
            behavior: Behavior::default(),
            refresh_policy: RefreshPolicy::Remote,
            social_fallback: SocialFallback::Allow,
            backend_down: false,
            github: false,
        }
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    pub fn with_social_fallback(mut self, fallback: SocialFallback) -> Self {
        self.social_fallback = fallback;
        self
    }

    /// Point the app at a port nothing listens on.
    pub fn with_backend_down(mut self) -> Self {
        self.backend_down = true;
        self
    }

    /// Also configure GitHub against the fake provider.
    pub fn with_github(mut self) -> Self {
        self.github = true;
        self
    }

    pub async fn build(self) -> TestApp {
        let backend = FakeBackend::start(self.behavior).await;

        let backend_url = if self.backend_down {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);
            Url::parse(&format!("http://{}/api/v1", addr)).unwrap()
        } else {
            backend.api_url()
        };

        let google = OAuthProvider::new(
            Provider::Google,
            "google-client".to_string(),
            "google-secret".to_string(),
        )
        .unwrap()
        .with_endpoints(ProviderEndpoints {
            authorize_url: backend.url("/oauth/authorize"),
            token_url: backend.url("/oauth/token"),
            userinfo_url: backend.url("/oauth/userinfo"),
            emails_url: None,
            scope: "openid email profile",
        });

        let mut oauth_providers = vec![google];
        if self.github {
            let github = OAuthProvider::new(
                Provider::Github,
                "github-client".to_string(),
                "github-secret".to_string(),
            )
            .unwrap()
            .with_endpoints(ProviderEndpoints {
                authorize_url: backend.url("/oauth/github/authorize"),
                token_url: backend.url("/oauth/token"),
                userinfo_url: backend.url("/oauth/github/user"),
                emails_url: Some(backend.url("/oauth/github/emails")),
                scope: "read:user user:email",
            });
            oauth_providers.push(github);
        }

        let config = ServerConfig {
            backend_url,
            public_url: Url::parse(PUBLIC_URL).unwrap(),
            session_secret: SESSION_SECRET.to_vec(),
            secure_cookies: false,
            refresh_policy: self.refresh_policy,
            social_fallback: self.social_fallback,
            oauth_providers,
            ip_header: None,
            backend_timeout: Duration::from_secs(5),
        };

        TestApp {
            app: create_app(&config).unwrap(),
            backend,
            codec: SessionCodec::new(SESSION_SECRET),
        }
    }
}

pub async fn create_test_app() -> TestApp {
    TestSetup::new().build().await
}

impl TestApp {
    /// Signed `Cookie` header for `token`.
    pub fn cookie_for(&self, token: &SessionToken) -> String {
        let encoded = self.codec.encode(token, unix_now()).unwrap();
        format!("session_token={}", encoded.token)
    }

    /// Decode the session cookie set on `response`, if any.
    pub fn session_from(&self, response: &Response<Body>) -> Option<SessionToken> {
        let value = cookie_value(&extract_set_cookies(response), "session_token")?;
        self.codec.decode(&value).ok()
    }
}

/// A signed-in credentials session for `role` whose access token expires at `expires`.
pub fn session_token(role: Option<Role>, expires: u64) -> SessionToken {
    SessionToken {
        sub: "1".to_string(),
        email: "student@example.com".to_string(),
        name: "Test User".to_string(),
        picture: None,
        role,
        is_email_verified: true,
        is_active: true,
        access_token: "access-1".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        access_token_expires: expires,
        account: AccountKind::Credentials,
        provider: "credentials".to_string(),
        backend_synced: true,
        error: None,
    }
}

/// Session whose access token is still valid for an hour.
pub fn fresh_session(role: Option<Role>) -> SessionToken {
    session_token(role, unix_now() + 3600)
}

/// Session whose access token expired a minute ago.
pub fn expired_session(role: Option<Role>) -> SessionToken {
    session_token(role, unix_now() - 60)
}

/// Request builder with a socket address attached, as `into_make_service_with_connect_info` would.
pub fn request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(SocketAddr::from(CLIENT_ADDR)))
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let builder = request("GET", uri);
    let builder = match cookie {
        Some(cookie) => builder.header("cookie", cookie),
        None => builder,
    };
    builder.body(Body::empty()).unwrap()
}

pub fn form_post(uri: &str, body: &str) -> Request<Body> {
    request("POST", uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Extract Set-Cookie headers from response
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Value of the last non-clearing cookie named `name`.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    cookies
        .iter()
        .rev()
        .filter(|c| c.starts_with(&prefix) && !c.contains("Max-Age=0"))
        .find_map(|c| {
            c.split(';')
                .next()
                .and_then(|pair| pair.strip_prefix(&prefix))
                .map(str::to_string)
        })
}

/// Check if cookies contain `name` being cleared (Max-Age=0)
pub fn has_cleared_cookie(cookies: &[String], name: &str) -> bool {
    let prefix = format!("{}=", name);
    cookies
        .iter()
        .any(|c| c.starts_with(&prefix) && c.contains("Max-Age=0"))
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
