//! Sign-in, token, session and redirect callbacks.
//!
//! Each stage is a pure function over the session state so it can be tested
//! without a server.

use serde::Serialize;
use url::Url;

use super::{
    ACCESS_TOKEN_LIFETIME_SECS, AccountKind, AuthorizedUser, SessionError, SessionToken,
};
use crate::role::Role;

/// Decide whether a sign-in may proceed.
///
/// Credentials sign-ins require a verified, active account. OAuth sign-ins
/// are always allowed; onboarding is enforced later by the layout guard.
pub fn sign_in_allowed(user: &AuthorizedUser, account: AccountKind) -> bool {
    match account {
        AccountKind::Credentials => user.is_email_verified && user.is_active,
        AccountKind::OAuth => true,
    }
}

/// Build the token for a fresh sign-in at `now`.
pub fn initial_token(
    user: AuthorizedUser,
    account: AccountKind,
    provider: &str,
    now: u64,
) -> SessionToken {
    SessionToken {
        sub: user.id,
        email: user.email,
        name: user.name,
        picture: user.image,
        role: user.role,
        is_email_verified: user.is_email_verified,
        is_active: user.is_active,
        access_token: user.access_token,
        refresh_token: user.refresh_token,
        access_token_expires: now + ACCESS_TOKEN_LIFETIME_SECS,
        account,
        provider: provider.to_string(),
        backend_synced: user.backend_synced,
        error: None,
    }
}

/// User portion of the client-visible session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub image: Option<String>,
    pub role: Option<Role>,
    pub is_email_verified: bool,
    pub is_active: bool,
}

/// Client-visible session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub user: SessionUser,
    pub access_token: String,
    /// Unix seconds at which the access token expires
    pub expires: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionError>,
}

impl SessionView {
    pub fn is_admin(&self) -> bool {
        self.user.role.is_some_and(|r| r.is_admin())
    }

    pub fn is_onboarded(&self) -> bool {
        self.user.is_active && self.user.is_email_verified
    }
}

/// Project the token onto what the client is allowed to see.
/// The refresh token never leaves the server.
pub fn session_view(token: &SessionToken) -> SessionView {
    SessionView {
        user: SessionUser {
            id: token.sub.clone(),
            email: token.email.clone(),
            name: token.name.clone(),
            image: token.picture.clone(),
            role: token.role,
            is_email_verified: token.is_email_verified,
            is_active: token.is_active,
        },
        access_token: token.access_token.clone(),
        expires: token.access_token_expires,
        error: token.error,
    }
}

/// Resolve a post-sign-in callback URL against the public URL.
///
/// Relative paths are joined onto the public URL and absolute URLs are
/// parsed as is. Only targets on the public URL's origin survive; the
/// parser folds `\` into `/` and drops tabs, so the origin is checked on
/// the resolved URL rather than on the raw string.
pub fn redirect_target(url: &str, public_url: &Url) -> String {
    let resolved = if url.starts_with('/') {
        public_url.join(url)
    } else {
        Url::parse(url)
    };
    match resolved {
        Ok(target) if target.origin() == public_url.origin() => target.to_string(),
        _ => public_url.to_string(),
    }
}

/// Where a freshly signed-in user lands when no callback URL was given.
pub fn landing_path(token: &SessionToken) -> &'static str {
    if !token.is_onboarded() {
        return "/onboarding";
    }
    match token.role {
        Some(Role::Admin | Role::SuperAdmin) => "/admin",
        Some(Role::Teacher) => "/teacher",
        Some(Role::Student) | None => "/dashboard",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_support::token;

    fn user(verified: bool, active: bool) -> AuthorizedUser {
        AuthorizedUser {
            id: "7".to_string(),
            email: "neha@example.com".to_string(),
            name: "Neha".to_string(),
            image: Some("https://img.example.com/n.png".to_string()),
            role: Some(Role::Student),
            is_email_verified: verified,
            is_active: active,
            access_token: "at".to_string(),
            refresh_token: Some("rt".to_string()),
            backend_synced: true,
        }
    }

    #[test]
    fn test_credentials_require_verified_and_active() {
        for verified in [false, true] {
            for active in [false, true] {
                let allowed = sign_in_allowed(&user(verified, active), AccountKind::Credentials);
                assert_eq!(allowed, verified && active, "verified={verified} active={active}");
            }
        }
    }

    #[test]
    fn test_oauth_always_allowed() {
        for verified in [false, true] {
            for active in [false, true] {
                assert!(sign_in_allowed(&user(verified, active), AccountKind::OAuth));
            }
        }
    }

    #[test]
    fn test_initial_token_expires_in_one_hour() {
        let t = initial_token(user(true, true), AccountKind::Credentials, "credentials", 5_000);
        assert_eq!(t.access_token_expires, 5_000 + 3600);
        assert_eq!(t.sub, "7");
        assert_eq!(t.picture.as_deref(), Some("https://img.example.com/n.png"));
        assert_eq!(t.refresh_token.as_deref(), Some("rt"));
        assert_eq!(t.provider, "credentials");
        assert_eq!(t.error, None);
        assert!(t.is_usable(5_000));
    }

    #[test]
    fn test_session_view_hides_refresh_token() {
        let t = token(Some(Role::Teacher), 100);
        let view = session_view(&t);
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["user"]["role"], "teacher");
        assert_eq!(json["user"]["isEmailVerified"], true);
        assert_eq!(json["accessToken"], "backend-access");
        assert!(json.get("refreshToken").is_none());
        assert!(json.get("error").is_none());
        assert!(!json.to_string().contains("backend-refresh"));
    }

    #[test]
    fn test_session_view_carries_error() {
        let mut t = token(Some(Role::Student), 100);
        t.error = Some(SessionError::RefreshAccessTokenError);
        let json = serde_json::to_value(session_view(&t)).unwrap();
        assert_eq!(json["error"], "RefreshAccessTokenError");
    }

    #[test]
    fn test_redirect_target() {
        let base = Url::parse("https://prep.example.com").unwrap();

        assert_eq!(
            redirect_target("/dashboard/tests", &base),
            "https://prep.example.com/dashboard/tests"
        );
        assert_eq!(
            redirect_target("https://prep.example.com/admin", &base),
            "https://prep.example.com/admin"
        );
        assert_eq!(
            redirect_target("https://evil.example.net/phish", &base),
            "https://prep.example.com/"
        );
        assert_eq!(
            redirect_target("//evil.example.net/phish", &base),
            "https://prep.example.com/"
        );
        assert_eq!(redirect_target("not a url", &base), "https://prep.example.com/");
    }

    #[test]
    fn test_redirect_target_rejects_backslash_and_tab_authority() {
        let base = Url::parse("https://prep.example.com").unwrap();

        for url in [
            "/\\evil.example.net/phish",
            "/\t/evil.example.net",
            "/\\\\evil.example.net",
            "\t//evil.example.net",
        ] {
            assert_eq!(redirect_target(url, &base), "https://prep.example.com/", "{url:?}");
        }
    }

    #[test]
    fn test_landing_path_by_role() {
        assert_eq!(landing_path(&token(Some(Role::Student), 0)), "/dashboard");
        assert_eq!(landing_path(&token(Some(Role::Teacher), 0)), "/teacher");
        assert_eq!(landing_path(&token(Some(Role::Admin), 0)), "/admin");
        assert_eq!(landing_path(&token(Some(Role::SuperAdmin), 0)), "/admin");
        assert_eq!(landing_path(&token(None, 0)), "/dashboard");
    }

    #[test]
    fn test_landing_path_sends_unverified_admin_to_onboarding() {
        let mut t = token(Some(Role::Admin), 0);
        t.is_email_verified = false;
        assert_eq!(landing_path(&t), "/onboarding");
    }
}
