//! Sign-in providers: credentials and social profiles.
//!
//! Neither function lets a backend failure escape. Credentials failures
//! become "no user"; social failures become a locally fabricated user when
//! [`SocialFallback::Allow`] is configured.

use tracing::{info, warn};
use url::Url;

use super::AuthorizedUser;
use crate::backend::{BackendClient, SocialLoginRequest};
use crate::oauth::SocialProfile;
use crate::role::Role;

/// Access token placed in sessions the backend never recorded.
pub const SOCIAL_FALLBACK_TOKEN: &str = "social-login-fallback-token";

const INITIALS_AVATAR_URL: &str = "https://ui-avatars.com/api/";

/// What to do when the backend social-login endpoint is unavailable.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SocialFallback {
    /// Sign the user in with a locally fabricated record.
    #[default]
    Allow,
    /// Fail the sign-in.
    Deny,
}

/// Validate email and password against the backend.
/// Returns `None` on any failure without saying why.
pub async fn authorize_credentials(
    backend: &BackendClient,
    email: &str,
    password: &str,
) -> Option<AuthorizedUser> {
    match backend.login(email, password).await {
        Ok(response) => Some(response.into_authorized_user()),
        Err(e) => {
            info!(error = %e, "Credentials sign-in rejected");
            None
        }
    }
}

/// Get or create the backend user for a social profile.
/// Returns `None` only when the backend fails and the fallback is denied.
pub async fn resolve_social_profile(
    backend: &BackendClient,
    profile: &SocialProfile,
    fallback: SocialFallback,
) -> Option<AuthorizedUser> {
    let request = SocialLoginRequest {
        email: &profile.email,
        name: &profile.name,
        avatar: profile.avatar.as_deref(),
        provider: profile.provider.as_str(),
    };

    match backend.social_login(&request).await {
        Ok(response) => Some(response.into_authorized_user()),
        Err(e) => match fallback {
            SocialFallback::Allow => {
                warn!(
                    provider = profile.provider.as_str(),
                    error = %e,
                    "Social login backend unavailable, using unsynced fallback session"
                );
                Some(fallback_user(profile))
            }
            SocialFallback::Deny => {
                warn!(
                    provider = profile.provider.as_str(),
                    error = %e,
                    "Social login backend unavailable, rejecting sign-in"
                );
                None
            }
        },
    }
}

/// Build the locally fabricated user for a social profile.
pub fn fallback_user(profile: &SocialProfile) -> AuthorizedUser {
    AuthorizedUser {
        id: profile.provider_account_id.clone(),
        email: profile.email.clone(),
        name: profile.name.clone(),
        image: Some(
            profile
                .avatar
                .clone()
                .unwrap_or_else(|| initials_avatar_url(&profile.name)),
        ),
        role: Some(Role::Student),
        is_email_verified: true,
        is_active: true,
        access_token: SOCIAL_FALLBACK_TOKEN.to_string(),
        refresh_token: None,
        backend_synced: false,
    }
}

/// Avatar URL rendering the initials of `name`.
pub fn initials_avatar_url(name: &str) -> String {
    match Url::parse_with_params(INITIALS_AVATAR_URL, &[("name", name), ("background", "random")])
    {
        Ok(url) => url.to_string(),
        Err(_) => INITIALS_AVATAR_URL.to_string(),
    }
}
