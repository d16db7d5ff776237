//! Persistence seams for the identity engine.
//!
//! Every trait is object-safe so engines can hold `Arc<dyn ...>` handles and
//! tests can substitute [`InMemoryStore`] for [`PgStore`].

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Identity, IdentityStatus, LoginAttempt, PasswordResetToken, RefreshToken};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Identity records keyed by email (case-insensitive) and by ids.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<Identity>>;

    async fn find_identity_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<Identity>>;

    async fn find_identity_by_id(&self, id: Uuid) -> StoreResult<Option<Identity>>;

    /// Fails with [`StoreError::Conflict`] when the email is already taken.
    async fn create_identity(&self, identity: &Identity) -> StoreResult<()>;

    async fn update_status(&self, id: Uuid, status: IdentityStatus) -> StoreResult<()>;

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<()>;

    async fn mark_email_verified(&self, id: Uuid) -> StoreResult<()>;

    async fn delete_identity(&self, id: Uuid) -> StoreResult<()>;

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Append-only login audit trail.
#[async_trait]
pub trait AttemptLedger: Send + Sync {
    async fn record_attempt(&self, attempt: &LoginAttempt) -> StoreResult<()>;

    /// Failed attempts for `identity_id` at or after `since`.
    async fn count_recent_failures(&self, identity_id: Uuid, since: DateTime<Utc>)
        -> StoreResult<u64>;

    /// Newest first.
    async fn list_recent_attempts(
        &self,
        identity_id: Uuid,
        limit: u32,
    ) -> StoreResult<Vec<LoginAttempt>>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn create_refresh_token(&self, token: &RefreshToken) -> StoreResult<()>;

    async fn find_refresh_token_by_hash(&self, token_hash: &str)
        -> StoreResult<Option<RefreshToken>>;

    /// Tokens neither revoked nor expired, newest first.
    async fn list_active_refresh_tokens_for(
        &self,
        identity_id: Uuid,
    ) -> StoreResult<Vec<RefreshToken>>;

    /// Idempotent: revoking an already revoked token keeps the first timestamp.
    async fn revoke_refresh_token(&self, id: Uuid) -> StoreResult<()>;

    /// Returns how many tokens moved from active to revoked.
    async fn revoke_all_refresh_tokens_for(&self, identity_id: Uuid) -> StoreResult<u64>;

    async fn delete_expired_refresh_tokens(&self) -> StoreResult<u64>;
}

#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    async fn create_reset_token(&self, token: &PasswordResetToken) -> StoreResult<()>;

    async fn find_reset_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<PasswordResetToken>>;

    /// Store the new password hash and mark the token used, atomically.
    ///
    /// Succeeds only while the token is unused and unexpired; returns `false`
    /// when another caller consumed it first or it has lapsed, in which case
    /// the password is left unchanged.
    async fn consume_reset_token(&self, id: Uuid, new_password_hash: &str) -> StoreResult<bool>;

    async fn delete_expired_reset_tokens(&self) -> StoreResult<u64>;
}
