//! JWT issue and verification
//!
//! Tokens are HS256-signed and carry a unique `jti` so individual sessions
//! can be revoked before their expiry. Verification checks signature and
//! expiry here; the revocation predicate is consulted separately by callers
//! that hold a [`super::RevocationStore`].

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AppError, Result};

const ISSUER: &str = "ripple";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated user id
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub username: String,
    /// Session id, the revocation handle
    pub jti: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issue a token for the user with a fresh session id.
pub fn issue_token(user_id: i64, username: &str, cfg: &AuthConfig) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        user_id,
        username: username.to_string(),
        jti: Uuid::new_v4().to_string(),
        iss: ISSUER.to_string(),
        iat: now.timestamp(),
        exp: now.timestamp() + cfg.jwt_expiry as i64,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
}

/// Verify signature and expiry, returning the claims. Revocation is a
/// separate check because it needs the store handle.
pub fn verify_token(token: &str, cfg: &AuthConfig) -> Result<Claims> {
    let mut validation = Validation::default();
    validation.set_issuer(&[ISSUER]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}
