//! Layout guard for dashboard-style views.
//!
//! Second enforcement point after the route guard. It adds the onboarding
//! check, which fires regardless of role.

use crate::session::SessionView;

pub const DEFAULT_DASHBOARD_PATH: &str = "/dashboard";
pub const ONBOARDING_PATH: &str = "/onboarding";

/// Session as seen by a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Loading,
    Unauthenticated,
    Authenticated(SessionView),
}

impl SessionStatus {
    /// Status for a resolved session view. Views carrying a refresh error
    /// count as signed out.
    pub fn from_view(view: Option<SessionView>) -> Self {
        match view {
            Some(view) if view.error.is_none() => SessionStatus::Authenticated(view),
            _ => SessionStatus::Unauthenticated,
        }
    }
}

/// What the view should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutOutcome {
    ShowLoading,
    Redirect(&'static str),
    Render,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutGuard {
    pub require_auth: bool,
    pub require_admin: bool,
}

impl LayoutGuard {
    pub const fn authenticated() -> Self {
        Self {
            require_auth: true,
            require_admin: false,
        }
    }

    pub const fn admin() -> Self {
        Self {
            require_auth: true,
            require_admin: true,
        }
    }

    pub fn evaluate(&self, status: &SessionStatus) -> LayoutOutcome {
        let view = match status {
            SessionStatus::Loading => return LayoutOutcome::ShowLoading,
            SessionStatus::Unauthenticated => None,
            SessionStatus::Authenticated(view) => Some(view),
        };

        if self.require_auth && view.is_none() {
            return LayoutOutcome::Redirect(crate::guard::LOGIN_PATH);
        }

        if self.require_admin && !view.is_some_and(SessionView::is_admin) {
            return LayoutOutcome::Redirect(DEFAULT_DASHBOARD_PATH);
        }

        if view.is_some_and(|v| !v.is_onboarded()) {
            return LayoutOutcome::Redirect(ONBOARDING_PATH);
        }

        LayoutOutcome::Render
    }
}
