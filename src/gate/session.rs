//! Session tokens
//!
//! HS256 JWTs stored in a cookie. No server-side session storage needed:
//! the token is the whole session.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Identity;

/// Algorithms accepted on verification. Anything outside the HMAC family,
/// including `none`, is rejected before the key is used.
const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Session codec failures.
///
/// Verification collapses every cause into [`SessionError::Invalid`]; the
/// gate treats them all as "log in again".
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to sign session token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("invalid session token")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

/// Signed session claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// GitHub user id
    pub id: String,
    /// GitHub login
    pub login: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expires at (unix seconds)
    pub exp: i64,
}

/// Session signing key.
///
/// Built once at startup and held for the process lifetime. A generated key
/// is never persisted, so every restart invalidates outstanding sessions.
#[derive(Clone)]
pub struct SessionKey {
    secret: Vec<u8>,
    generated: bool,
}

impl SessionKey {
    /// Use a configured secret.
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            generated: false,
        }
    }

    /// Generate a random 16-byte key, hex encoded.
    pub fn generate() -> Self {
        let mut bytes = [0_u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            secret: hex::encode(bytes).into_bytes(),
            generated: true,
        }
    }

    /// Configured secret if present, otherwise a generated one.
    pub fn from_config(secret: Option<&str>) -> Self {
        match secret {
            Some(secret) if !secret.is_empty() => Self::from_secret(secret),
            _ => {
                tracing::warn!(
                    "jwt_secret_key not set; generated a per-process key, sessions will not survive a restart"
                );
                Self::generate()
            }
        }
    }

    /// Whether the key was generated at startup rather than configured.
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(&self.secret)
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.secret)
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("secret", &"<redacted>")
            .field("generated", &self.generated)
            .finish()
    }
}

/// Create a signed session token for `identity`, valid for `ttl`.
pub fn issue_session_token(
    identity: &Identity,
    key: &SessionKey,
    ttl: Duration,
) -> Result<String, SessionError> {
    let now = Utc::now();
    let claims = SessionClaims {
        id: identity.id.clone(),
        login: identity.login.clone(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    encode(&Header::new(Algorithm::HS256), &claims, &key.encoding_key())
        .map_err(SessionError::Signing)
}

/// Verify and decode a session token
///
/// # Errors
/// Returns [`SessionError::Invalid`] if the algorithm is not HMAC, the
/// signature does not match, the token is malformed or it has expired
pub fn verify_session_token(token: &str, key: &SessionKey) -> Result<Identity, SessionError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);

    let data = decode::<SessionClaims>(token, &key.decoding_key(), &validation)
        .map_err(SessionError::Invalid)?;

    Ok(Identity::new(data.claims.id, data.claims.login))
}
