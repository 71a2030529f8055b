//! Session revocation store
//!
//! Revoked session ids (JTIs) live in Redis under a TTL equal to the token's
//! remaining lifetime, so entries expire exactly when the token itself would
//! have.

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::config::SessionRevocationConfig;
use crate::error::Result;

const KEY_PREFIX: &str = "bl:jti:";

#[derive(Clone)]
pub struct RevocationStore {
    conn: ConnectionManager,
}

impl RevocationStore {
    pub async fn connect(cfg: &SessionRevocationConfig) -> Result<Self> {
        let client = redis::Client::open(cfg.url())?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Revoke a session id until the token's original expiry. Tokens already
    /// past expiry need no entry; signature validation rejects them anyway.
    pub async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let ttl = expires_at.timestamp() - Utc::now().timestamp();
        if ttl <= 0 {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(Self::key(jti), "revoked", ttl as u64).await?;
        Ok(())
    }

    /// Membership test: has this session id been revoked?
    pub async fn is_revoked(&self, jti: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(Self::key(jti)).await?;
        Ok(value.is_some())
    }

    fn key(jti: &str) -> String {
        format!("{KEY_PREFIX}{jti}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_prefixed() {
        assert_eq!(
            RevocationStore::key("abc-123"),
            "bl:jti:abc-123".to_string()
        );
    }
}
