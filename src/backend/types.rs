//! Wire types for the backend auth endpoints and their normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::role::Role;
use crate::session::AuthorizedUser;

/// User record as returned by the backend. Field names vary between backend
/// versions, so the flags are kept as raw JSON and coerced on normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendUser {
    pub id: Value,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub is_email_verified: Option<Value>,
    #[serde(default)]
    pub email_verified: Option<Value>,
    #[serde(default)]
    pub is_verified: Option<Value>,
    #[serde(default)]
    pub is_active: Option<Value>,
}

/// Response of the login and social-login endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: BackendUser,
}

/// Body of the social-login endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SocialLoginRequest<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub avatar: Option<&'a str>,
    pub provider: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Response of the refresh endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl LoginResponse {
    /// Normalize into the user shape the session pipeline consumes.
    pub fn into_authorized_user(self) -> AuthorizedUser {
        let user = self.user;

        let name = user
            .full_name
            .filter(|n| !n.trim().is_empty())
            .or(user.name.filter(|n| !n.trim().is_empty()))
            .unwrap_or_else(|| email_local_part(&user.email).to_string());

        // Missing role means the backend predates roles; those users are students.
        let role = match user.role.as_deref() {
            None => Some(Role::Student),
            Some(raw) => Role::parse(raw),
        };

        let is_email_verified = user
            .is_email_verified
            .as_ref()
            .or(user.email_verified.as_ref())
            .or(user.is_verified.as_ref())
            .is_some_and(coerce_bool);

        AuthorizedUser {
            id: id_string(&user.id),
            email: user.email,
            name,
            image: user.avatar.or(user.avatar_url).or(user.image),
            role,
            is_email_verified,
            is_active: user.is_active.as_ref().is_some_and(coerce_bool),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            backend_synced: true,
        }
    }
}

/// Coerce a loosely typed JSON flag into a boolean.
pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        ),
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

fn id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}
