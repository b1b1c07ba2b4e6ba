//! Protected views.
//!
//! Rendering itself lives in the frontend; these handlers only run the layout
//! guard against the session the route guard resolved and describe the view.

use axum::{
    Json, Router,
    extract::OriginalUri,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Serialize;

use crate::auth::GuardedSession;
use crate::guard::layout::{LayoutGuard, LayoutOutcome, SessionStatus};
use crate::session::{SessionView, session_view};

#[derive(Serialize)]
struct PageResponse {
    view: String,
    session: SessionView,
}

pub fn router() -> Router {
    Router::new()
        .route("/dashboard", get(member_view))
        .route("/dashboard/{*path}", get(member_view))
        .route("/profile", get(member_view))
        .route("/settings", get(member_view))
        .route("/tests/take", get(member_view))
        .route("/tests/take/{*path}", get(member_view))
        .route("/teacher", get(member_view))
        .route("/teacher/{*path}", get(member_view))
        .route("/admin", get(admin_view))
        .route("/admin/{*path}", get(admin_view))
}

async fn member_view(uri: OriginalUri, GuardedSession(token): GuardedSession) -> Response {
    render(LayoutGuard::authenticated(), uri, token.as_ref().map(session_view))
}

async fn admin_view(uri: OriginalUri, GuardedSession(token): GuardedSession) -> Response {
    render(LayoutGuard::admin(), uri, token.as_ref().map(session_view))
}

fn render(guard: LayoutGuard, uri: OriginalUri, view: Option<SessionView>) -> Response {
    let status = SessionStatus::from_view(view);
    match (guard.evaluate(&status), status) {
        (LayoutOutcome::Redirect(path), _) => Redirect::temporary(path).into_response(),
        (LayoutOutcome::Render, SessionStatus::Authenticated(session)) => Json(PageResponse {
            view: uri.0.path().to_string(),
            session,
        })
        .into_response(),
        // Server-side status is never Loading, and both guards above require
        // a session before rendering.
        (LayoutOutcome::ShowLoading | LayoutOutcome::Render, _) => {
            Redirect::temporary(crate::guard::LOGIN_PATH).into_response()
        }
    }
}
