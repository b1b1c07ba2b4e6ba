//! Session token signing and validation.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::session::SessionToken;

/// Session cookie lifetime: 30 days, rolled forward whenever the token is re-signed.
pub const SESSION_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

/// JWT claims for the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(flatten)]
    pub token: SessionToken,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Signing keys for session tokens.
#[derive(Clone)]
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

/// Result of signing a session token.
#[derive(Debug, Clone)]
pub struct EncodedSession {
    /// The JWT token string
    pub token: String,
    /// Cookie lifetime in seconds
    pub max_age: u64,
}

impl SessionCodec {
    /// Create a codec with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Sign a session token issued at `now`.
    pub fn encode(&self, token: &SessionToken, now: u64) -> Result<EncodedSession, JwtError> {
        let claims = SessionClaims {
            token: token.clone(),
            iat: now,
            exp: now + SESSION_MAX_AGE_SECS,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(EncodedSession {
            token,
            max_age: SESSION_MAX_AGE_SECS,
        })
    }

    /// Validate a session cookie and return the token inside.
    /// The access token inside may still be expired; that is the refresh
    /// pipeline's concern, not the cookie's.
    pub fn decode(&self, token: &str) -> Result<SessionToken, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data =
            jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation)
                .map_err(JwtError::Decoding)?;

        Ok(token_data.claims.token)
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("Failed to decode token: {0}")]
    Decoding(jsonwebtoken::errors::Error),
}
