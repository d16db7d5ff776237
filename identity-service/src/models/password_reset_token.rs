use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// How long a reset link stays usable.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;

#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn new(identity_id: Uuid, token_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            identity_id,
            token_hash,
            expires_at: now + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
            used_at: None,
            created_at: now,
        }
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Valid iff never consumed and not past expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_used() && !self.is_expired_at(now)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_token_is_valid_for_one_hour() {
        let token = PasswordResetToken::new(Uuid::new_v4(), "hash".to_string());
        assert!(token.is_valid());
        assert_eq!(token.expires_at - token.created_at, Duration::hours(1));
    }

    #[test]
    fn used_token_is_invalid() {
        let mut token = PasswordResetToken::new(Uuid::new_v4(), "hash".to_string());
        token.used_at = Some(Utc::now());
        assert!(!token.is_valid());
    }

    #[test]
    fn expired_token_is_invalid() {
        let token = PasswordResetToken::new(Uuid::new_v4(), "hash".to_string());
        assert!(!token.is_valid_at(token.created_at + Duration::minutes(61)));
    }
}
