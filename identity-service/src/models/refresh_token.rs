use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Refresh token record. Only the SHA-256 hash of the secret is kept.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RefreshToken {
    pub id: Uuid,

    /// Internal id of the owning identity
    pub identity_id: Uuid,

    /// SHA-256 hex digest of the refresh secret
    #[serde(skip_serializing)]
    pub token_hash: String,

    /// Client-supplied device descriptor (user agent or app label)
    pub device_info: String,

    /// Network address the session was opened from
    pub ip_address: String,

    pub expires_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,

    /// Set when the token is revoked (logout, password change, explicit revoke)
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshToken {
    /// Create a new refresh token record for an already-hashed secret
    pub fn new(
        identity_id: Uuid,
        token_hash: String,
        device_info: String,
        ip_address: String,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            identity_id,
            token_hash,
            device_info,
            ip_address,
            expires_at: now + ttl,
            created_at: now,
            revoked_at: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Active iff not revoked and `now` is before expiry
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired_at(now)
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> RefreshToken {
        RefreshToken::new(
            Uuid::new_v4(),
            "abc".to_string(),
            "cli".to_string(),
            "127.0.0.1".to_string(),
            Duration::days(7),
        )
    }

    #[test]
    fn test_refresh_token_creation() {
        let token = token();
        assert!(token.revoked_at.is_none());
        assert!(token.is_active());
        assert_eq!(token.expires_at - token.created_at, Duration::days(7));
    }

    #[test]
    fn test_refresh_token_expiry() {
        let mut token = token();
        assert!(!token.is_expired_at(Utc::now()));

        token.expires_at = Utc::now() - Duration::seconds(1);
        assert!(token.is_expired_at(Utc::now()));
        assert!(!token.is_active());
    }

    #[test]
    fn test_refresh_token_revocation() {
        let mut token = token();
        token.revoked_at = Some(Utc::now());
        assert!(token.is_revoked());
        assert!(!token.is_active());
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let token = token();
        assert!(!token.is_active_at(token.expires_at));
        assert!(token.is_active_at(token.expires_at - Duration::milliseconds(1)));
    }
}
