//! Route guard: path-prefix authorization that runs before any page renders.
//!
//! Only paths under a protected prefix are checked. Everything else passes
//! through untouched; page-level checks ([`layout`]) handle the rest.

pub mod layout;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::jwt::unix_now;
use crate::role::Role;
use crate::session::{SessionManager, SessionToken};

pub const LOGIN_PATH: &str = "/auth/login";
pub const UNAUTHORIZED_PATH: &str = "/auth/unauthorized";

/// Path prefixes the guard intercepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectedPrefix {
    Dashboard,
    Profile,
    Settings,
    TestsTake,
    Admin,
    Teacher,
}

impl ProtectedPrefix {
    pub const ALL: [ProtectedPrefix; 6] = [
        ProtectedPrefix::Dashboard,
        ProtectedPrefix::Profile,
        ProtectedPrefix::Settings,
        ProtectedPrefix::TestsTake,
        ProtectedPrefix::Admin,
        ProtectedPrefix::Teacher,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            ProtectedPrefix::Dashboard => "/dashboard",
            ProtectedPrefix::Profile => "/profile",
            ProtectedPrefix::Settings => "/settings",
            ProtectedPrefix::TestsTake => "/tests/take",
            ProtectedPrefix::Admin => "/admin",
            ProtectedPrefix::Teacher => "/teacher",
        }
    }

    pub fn requirement(&self) -> RoleRequirement {
        match self {
            ProtectedPrefix::Admin => RoleRequirement::Admin,
            ProtectedPrefix::Teacher => RoleRequirement::Teacher,
            ProtectedPrefix::Dashboard
            | ProtectedPrefix::Profile
            | ProtectedPrefix::Settings
            | ProtectedPrefix::TestsTake => RoleRequirement::AnySession,
        }
    }

    /// Find the prefix `path` falls under. A prefix matches the path itself
    /// or anything below it; `/dashboardx` does not match `/dashboard`.
    pub fn match_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|prefix| {
            let p = prefix.path();
            path.strip_prefix(p)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}

/// Role a protected prefix demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRequirement {
    AnySession,
    Teacher,
    Admin,
}

impl RoleRequirement {
    /// Sessions without a recognized role only satisfy `AnySession`.
    pub fn permits(&self, role: Option<Role>) -> bool {
        match (self, role) {
            (RoleRequirement::AnySession, _) => true,
            (RoleRequirement::Teacher, Some(role)) => role.can_teach(),
            (RoleRequirement::Admin, Some(role)) => role.is_admin(),
            (RoleRequirement::Teacher | RoleRequirement::Admin, None) => false,
        }
    }
}

/// Outcome of the route guard for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Path is not protected.
    Pass,
    /// Path is protected and the session satisfies it.
    Allow,
    /// No valid session; go sign in and come back to `callback`.
    RedirectLogin { callback: String },
    /// Valid session with the wrong role.
    RedirectUnauthorized,
}

impl GuardDecision {
    pub fn location(&self) -> Option<String> {
        match self {
            GuardDecision::Pass | GuardDecision::Allow => None,
            GuardDecision::RedirectLogin { callback } => Some(login_url(callback)),
            GuardDecision::RedirectUnauthorized => Some(UNAUTHORIZED_PATH.to_string()),
        }
    }
}

/// Sign-in URL that returns to `callback` afterwards.
pub fn login_url(callback: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("callbackUrl", callback)
        .finish();
    format!("{}?{}", LOGIN_PATH, query)
}

/// Decide what to do with a request for `target` (a path with an optional
/// query) given its resolved session. Only the path is matched; the login
/// callback keeps the query.
pub fn decide(target: &str, session: Option<&SessionToken>, now: u64) -> GuardDecision {
    let path = target.split_once('?').map_or(target, |(path, _)| path);
    let Some(prefix) = ProtectedPrefix::match_path(path) else {
        return GuardDecision::Pass;
    };

    let Some(token) = session.filter(|t| t.is_usable(now)) else {
        return GuardDecision::RedirectLogin {
            callback: target.to_string(),
        };
    };

    if prefix.requirement().permits(token.role) {
        GuardDecision::Allow
    } else {
        GuardDecision::RedirectUnauthorized
    }
}

/// Middleware applying [`decide`] to every request.
///
/// For protected paths the session is resolved (and rotated) once here and
/// stored in the request extensions for the page handler.
pub async fn route_guard(
    State(sessions): State<Arc<SessionManager>>,
    mut request: Request,
    next: Next,
) -> Response {
    if ProtectedPrefix::match_path(request.uri().path()).is_none() {
        return next.run(request).await;
    }

    let target = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_string(), |pq| pq.as_str().to_string());

    let now = unix_now();
    let session = sessions.resolve(request.headers(), now).await;
    let decision = decide(&target, session.as_ref(), now);

    match decision.location() {
        Some(location) => {
            debug!(target = %target, ?decision, "Route guard redirect");
            Redirect::temporary(&location).into_response()
        }
        None => {
            if let Some(token) = session {
                request.extensions_mut().insert(token);
            }
            next.run(request).await
        }
    }
}
