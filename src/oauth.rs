//! OAuth authorization-code flow for the social sign-in providers.
//!
//! - Build the provider authorization URL with a CSRF `state`
//! - Exchange the returned code for a provider access token
//! - Fetch the provider profile (account id, email, name, avatar)

use base64::Engine;
use rand::RngCore;
use reqwest::{Client, header::ACCEPT};
use serde::{Deserialize, Serialize};
use url::Url;

/// Supported identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Github,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Github => "github",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Google => "Google",
            Provider::Github => "GitHub",
        }
    }

    pub fn from_path(s: &str) -> Option<Self> {
        match s {
            "google" => Some(Provider::Google),
            "github" => Some(Provider::Github),
            _ => None,
        }
    }
}

/// Provider endpoints. Defaults point at the real providers.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorize_url: Url,
    pub token_url: Url,
    pub userinfo_url: Url,
    /// Address list consulted when the profile hides the email (GitHub only).
    pub emails_url: Option<Url>,
    pub scope: &'static str,
}

impl ProviderEndpoints {
    pub fn default_for(provider: Provider) -> Result<Self, url::ParseError> {
        let endpoints = match provider {
            Provider::Google => Self {
                authorize_url: Url::parse("https://accounts.google.com/o/oauth2/v2/auth")?,
                token_url: Url::parse("https://oauth2.googleapis.com/token")?,
                userinfo_url: Url::parse("https://openidconnect.googleapis.com/v1/userinfo")?,
                emails_url: None,
                scope: "openid email profile",
            },
            Provider::Github => Self {
                authorize_url: Url::parse("https://github.com/login/oauth/authorize")?,
                token_url: Url::parse("https://github.com/login/oauth/access_token")?,
                userinfo_url: Url::parse("https://api.github.com/user")?,
                emails_url: Some(Url::parse("https://api.github.com/user/emails")?),
                scope: "read:user user:email",
            },
        };
        Ok(endpoints)
    }
}

/// A configured provider.
#[derive(Debug, Clone)]
pub struct OAuthProvider {
    pub provider: Provider,
    pub client_id: String,
    pub client_secret: String,
    pub endpoints: ProviderEndpoints,
}

impl OAuthProvider {
    pub fn new(
        provider: Provider,
        client_id: String,
        client_secret: String,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            provider,
            client_id,
            client_secret,
            endpoints: ProviderEndpoints::default_for(provider)?,
        })
    }

    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

/// Profile returned by a provider after a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialProfile {
    pub provider: Provider,
    pub provider_account_id: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("provider {0} is not configured")]
    NotConfigured(&'static str),
    #[error("request to {provider} {step} failed: {source}")]
    Transport {
        provider: &'static str,
        step: &'static str,
        source: reqwest::Error,
    },
    #[error("{provider} {step} returned HTTP {status}")]
    Status {
        provider: &'static str,
        step: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("invalid {provider} {step} response: {source}")]
    Decode {
        provider: &'static str,
        step: &'static str,
        source: reqwest::Error,
    },
    #[error("{0} did not return an access token")]
    MissingAccessToken(&'static str),
    #[error("{0} profile has no email address")]
    MissingEmail(&'static str),
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct GoogleProfile {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

#[derive(Deserialize)]
struct GithubProfile {
    id: u64,
    login: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct GithubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

/// The primary address if it is verified, otherwise the first verified one.
fn preferred_email(emails: Vec<GithubEmail>) -> Option<String> {
    let verified = emails.into_iter().filter(|e| e.verified && !e.email.is_empty());
    let (primary, rest): (Vec<_>, Vec<_>) = verified.partition(|e| e.primary);
    primary.into_iter().chain(rest).next().map(|e| e.email)
}

/// OAuth client for all configured providers.
#[derive(Clone)]
pub struct OAuthClient {
    http: Client,
    public_url: Url,
    providers: Vec<OAuthProvider>,
}

impl OAuthClient {
    pub fn new(http: Client, public_url: Url, providers: Vec<OAuthProvider>) -> Self {
        Self {
            http,
            public_url,
            providers,
        }
    }

    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.providers.iter().map(|p| p.provider)
    }

    fn get(&self, provider: Provider) -> Result<&OAuthProvider, OAuthError> {
        self.providers
            .iter()
            .find(|p| p.provider == provider)
            .ok_or(OAuthError::NotConfigured(provider.as_str()))
    }

    /// Callback URL registered with the provider.
    pub fn redirect_uri(&self, provider: Provider) -> String {
        let base = self.public_url.as_str().trim_end_matches('/');
        format!("{}/api/auth/callback/{}", base, provider.as_str())
    }

    /// URL to send the browser to for sign-in.
    pub fn authorization_url(&self, provider: Provider, state: &str) -> Result<Url, OAuthError> {
        let config = self.get(provider)?;
        let mut url = config.endpoints.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", &self.redirect_uri(provider))
            .append_pair("response_type", "code")
            .append_pair("scope", config.endpoints.scope)
            .append_pair("state", state);
        Ok(url)
    }

    /// Exchange an authorization code for a provider access token.
    pub async fn exchange_code(&self, provider: Provider, code: &str) -> Result<String, OAuthError> {
        let config = self.get(provider)?;
        let name = provider.as_str();
        let redirect_uri = self.redirect_uri(provider);

        let response = self
            .http
            .post(config.endpoints.token_url.clone())
            .header(ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri.as_str()),
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|source| OAuthError::Transport {
                provider: name,
                step: "token",
                source,
            })?;

        if !response.status().is_success() {
            return Err(OAuthError::Status {
                provider: name,
                step: "token",
                status: response.status(),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|source| OAuthError::Decode {
            provider: name,
            step: "token",
            source,
        })?;

        body.access_token
            .filter(|t| !t.is_empty())
            .ok_or(OAuthError::MissingAccessToken(name))
    }

    /// Authenticated GET against a provider API, decoded as JSON.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        provider: &'static str,
        step: &'static str,
        url: &Url,
        access_token: &str,
    ) -> Result<T, OAuthError> {
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| OAuthError::Transport {
                provider,
                step,
                source,
            })?;

        if !response.status().is_success() {
            return Err(OAuthError::Status {
                provider,
                step,
                status: response.status(),
            });
        }

        response.json().await.map_err(|source| OAuthError::Decode {
            provider,
            step,
            source,
        })
    }

    /// Fetch the signed-in user's profile.
    pub async fn fetch_profile(
        &self,
        provider: Provider,
        access_token: &str,
    ) -> Result<SocialProfile, OAuthError> {
        let config = self.get(provider)?;
        let name = provider.as_str();
        let userinfo_url = &config.endpoints.userinfo_url;

        let profile = match provider {
            Provider::Google => {
                let p: GoogleProfile = self
                    .get_json(name, "userinfo", userinfo_url, access_token)
                    .await?;
                let email = p
                    .email
                    .filter(|e| !e.is_empty())
                    .ok_or(OAuthError::MissingEmail(name))?;
                SocialProfile {
                    provider,
                    provider_account_id: p.sub,
                    name: p.name.unwrap_or_else(|| email.clone()),
                    email,
                    avatar: p.picture,
                }
            }
            Provider::Github => {
                let p: GithubProfile = self
                    .get_json(name, "userinfo", userinfo_url, access_token)
                    .await?;
                let email = match p.email.filter(|e| !e.is_empty()) {
                    Some(email) => email,
                    None => self.github_email(config, access_token).await?,
                };
                SocialProfile {
                    provider,
                    provider_account_id: p.id.to_string(),
                    name: p.name.filter(|n| !n.is_empty()).unwrap_or(p.login),
                    email,
                    avatar: p.avatar_url,
                }
            }
        };

        Ok(profile)
    }

    /// GitHub leaves `email` null on the profile for private addresses;
    /// the email list still has them.
    async fn github_email(
        &self,
        config: &OAuthProvider,
        access_token: &str,
    ) -> Result<String, OAuthError> {
        let name = config.provider.as_str();
        let Some(url) = &config.endpoints.emails_url else {
            return Err(OAuthError::MissingEmail(name));
        };
        let emails: Vec<GithubEmail> = self.get_json(name, "emails", url, access_token).await?;
        preferred_email(emails).ok_or(OAuthError::MissingEmail(name))
    }
}

/// Random CSRF state for an authorization request.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OAuthClient {
        OAuthClient::new(
            Client::new(),
            Url::parse("https://prep.example.com").unwrap(),
            vec![
                OAuthProvider::new(
                    Provider::Google,
                    "client-123".to_string(),
                    "secret".to_string(),
                )
                .unwrap(),
            ],
        )
    }

    #[test]
    fn test_provider_from_path() {
        assert_eq!(Provider::from_path("google"), Some(Provider::Google));
        assert_eq!(Provider::from_path("github"), Some(Provider::Github));
        assert_eq!(Provider::from_path("facebook"), None);
        assert_eq!(Provider::from_path("Google"), None);
    }

    #[test]
    fn test_redirect_uri() {
        assert_eq!(
            client().redirect_uri(Provider::Google),
            "https://prep.example.com/api/auth/callback/google"
        );
    }

    #[test]
    fn test_authorization_url() {
        let url = client().authorization_url(Provider::Google, "abc").unwrap();
        assert_eq!(url.host_str(), Some("accounts.google.com"));

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".into(), "client-123".into())));
        assert!(pairs.contains(&("state".into(), "abc".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "https://prep.example.com/api/auth/callback/google".into()
        )));
    }

    #[test]
    fn test_unconfigured_provider() {
        let result = client().authorization_url(Provider::Github, "abc");
        assert!(matches!(result, Err(OAuthError::NotConfigured("github"))));
    }

    #[test]
    fn test_default_endpoints() {
        let google = ProviderEndpoints::default_for(Provider::Google).unwrap();
        assert_eq!(google.token_url.host_str(), Some("oauth2.googleapis.com"));
        assert!(google.emails_url.is_none());

        let github = ProviderEndpoints::default_for(Provider::Github).unwrap();
        assert_eq!(
            github.emails_url.as_ref().map(Url::as_str),
            Some("https://api.github.com/user/emails")
        );
    }

    fn email(address: &str, primary: bool, verified: bool) -> GithubEmail {
        GithubEmail {
            email: address.to_string(),
            primary,
            verified,
        }
    }

    #[test]
    fn test_preferred_email() {
        let emails = vec![
            email("old@example.com", false, true),
            email("main@example.com", true, true),
        ];
        assert_eq!(preferred_email(emails).as_deref(), Some("main@example.com"));

        // An unverified primary is skipped for the first verified address
        let emails = vec![
            email("main@example.com", true, false),
            email("work@example.com", false, true),
            email("other@example.com", false, true),
        ];
        assert_eq!(preferred_email(emails).as_deref(), Some("work@example.com"));

        assert_eq!(preferred_email(vec![email("x@example.com", true, false)]), None);
        assert_eq!(preferred_email(Vec::new()), None);
    }

    #[test]
    fn test_generate_state_is_unique() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
    }
}
