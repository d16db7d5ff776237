//! In-process store used by tests and local runs without PostgreSQL.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    AttemptLedger, CredentialStore, RefreshTokenStore, ResetTokenStore, StoreError, StoreResult,
};
use crate::models::{Identity, IdentityStatus, LoginAttempt, PasswordResetToken, RefreshToken};

/// Mirrors the relational constraints of the PostgreSQL schema: unique
/// lowercase email, unique token hashes, cascading deletes.
#[derive(Default)]
pub struct InMemoryStore {
    identities: Mutex<HashMap<Uuid, Identity>>,
    attempts: Mutex<Vec<LoginAttempt>>,
    refresh_tokens: Mutex<HashMap<Uuid, RefreshToken>>,
    reset_tokens: Mutex<HashMap<Uuid, PasswordResetToken>>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> StoreResult<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|e| StoreError::Backend(anyhow::anyhow!("In-memory {} mutex poisoned: {}", name, e)))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded attempt, oldest first.
    pub fn attempts(&self) -> StoreResult<Vec<LoginAttempt>> {
        Ok(lock(&self.attempts, "attempts")?.clone())
    }

    /// Every refresh token row regardless of state.
    pub fn refresh_tokens(&self) -> StoreResult<Vec<RefreshToken>> {
        Ok(lock(&self.refresh_tokens, "refresh token")?
            .values()
            .cloned()
            .collect())
    }

    /// Overwrite a stored refresh token, e.g. to move its expiry into the past.
    pub fn put_refresh_token(&self, token: RefreshToken) -> StoreResult<()> {
        lock(&self.refresh_tokens, "refresh token")?.insert(token.id, token);
        Ok(())
    }

    pub fn put_reset_token(&self, token: PasswordResetToken) -> StoreResult<()> {
        lock(&self.reset_tokens, "reset token")?.insert(token.id, token);
        Ok(())
    }

    pub fn reset_tokens(&self) -> StoreResult<Vec<PasswordResetToken>> {
        Ok(lock(&self.reset_tokens, "reset token")?
            .values()
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let identities = lock(&self.identities, "identity")?;
        Ok(identities
            .values()
            .find(|i| i.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_identity_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<Identity>> {
        let identities = lock(&self.identities, "identity")?;
        Ok(identities.values().find(|i| i.user_id == user_id).cloned())
    }

    async fn find_identity_by_id(&self, id: Uuid) -> StoreResult<Option<Identity>> {
        Ok(lock(&self.identities, "identity")?.get(&id).cloned())
    }

    async fn create_identity(&self, identity: &Identity) -> StoreResult<()> {
        let mut identities = lock(&self.identities, "identity")?;
        if identities
            .values()
            .any(|i| i.email.eq_ignore_ascii_case(&identity.email))
        {
            return Err(StoreError::Conflict("identity already exists".to_string()));
        }
        identities.insert(identity.id, identity.clone());
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: IdentityStatus) -> StoreResult<()> {
        let mut identities = lock(&self.identities, "identity")?;
        let identity = identities.get_mut(&id).ok_or(StoreError::NotFound)?;
        identity.status = status;
        identity.updated_at = Utc::now();
        Ok(())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        let mut identities = lock(&self.identities, "identity")?;
        let identity = identities.get_mut(&id).ok_or(StoreError::NotFound)?;
        identity.password_hash = password_hash.to_string();
        identity.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_email_verified(&self, id: Uuid) -> StoreResult<()> {
        let mut identities = lock(&self.identities, "identity")?;
        let identity = identities.get_mut(&id).ok_or(StoreError::NotFound)?;
        identity.email_verified = true;
        identity.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_identity(&self, id: Uuid) -> StoreResult<()> {
        lock(&self.identities, "identity")?
            .remove(&id)
            .ok_or(StoreError::NotFound)?;

        lock(&self.refresh_tokens, "refresh token")?.retain(|_, t| t.identity_id != id);
        lock(&self.reset_tokens, "reset token")?.retain(|_, t| t.identity_id != id);
        for attempt in lock(&self.attempts, "attempts")?.iter_mut() {
            if attempt.identity_id == Some(id) {
                attempt.identity_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AttemptLedger for InMemoryStore {
    async fn record_attempt(&self, attempt: &LoginAttempt) -> StoreResult<()> {
        lock(&self.attempts, "attempts")?.push(attempt.clone());
        Ok(())
    }

    async fn count_recent_failures(
        &self,
        identity_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let attempts = lock(&self.attempts, "attempts")?;
        Ok(attempts
            .iter()
            .filter(|a| a.identity_id == Some(identity_id) && !a.success && a.attempted_at >= since)
            .count() as u64)
    }

    async fn list_recent_attempts(
        &self,
        identity_id: Uuid,
        limit: u32,
    ) -> StoreResult<Vec<LoginAttempt>> {
        let attempts = lock(&self.attempts, "attempts")?;
        let mut matching: Vec<LoginAttempt> = attempts
            .iter()
            .filter(|a| a.identity_id == Some(identity_id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.attempted_at.cmp(&a.attempted_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryStore {
    async fn create_refresh_token(&self, token: &RefreshToken) -> StoreResult<()> {
        let mut tokens = lock(&self.refresh_tokens, "refresh token")?;
        if tokens.values().any(|t| t.token_hash == token.token_hash) {
            return Err(StoreError::Conflict(
                "refresh token already exists".to_string(),
            ));
        }
        tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<RefreshToken>> {
        let tokens = lock(&self.refresh_tokens, "refresh token")?;
        Ok(tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn list_active_refresh_tokens_for(
        &self,
        identity_id: Uuid,
    ) -> StoreResult<Vec<RefreshToken>> {
        let now = Utc::now();
        let tokens = lock(&self.refresh_tokens, "refresh token")?;
        let mut active: Vec<RefreshToken> = tokens
            .values()
            .filter(|t| t.identity_id == identity_id && t.is_active_at(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active)
    }

    async fn revoke_refresh_token(&self, id: Uuid) -> StoreResult<()> {
        let mut tokens = lock(&self.refresh_tokens, "refresh token")?;
        let token = tokens.get_mut(&id).ok_or(StoreError::NotFound)?;
        if token.revoked_at.is_none() {
            token.revoked_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn revoke_all_refresh_tokens_for(&self, identity_id: Uuid) -> StoreResult<u64> {
        let now = Utc::now();
        let mut revoked = 0;
        for token in lock(&self.refresh_tokens, "refresh token")?.values_mut() {
            if token.identity_id == identity_id && token.revoked_at.is_none() {
                token.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn delete_expired_refresh_tokens(&self) -> StoreResult<u64> {
        let now = Utc::now();
        let mut tokens = lock(&self.refresh_tokens, "refresh token")?;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired_at(now));
        Ok((before - tokens.len()) as u64)
    }
}

#[async_trait]
impl ResetTokenStore for InMemoryStore {
    async fn create_reset_token(&self, token: &PasswordResetToken) -> StoreResult<()> {
        let mut tokens = lock(&self.reset_tokens, "reset token")?;
        if tokens.values().any(|t| t.token_hash == token.token_hash) {
            return Err(StoreError::Conflict("reset token already exists".to_string()));
        }
        tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn find_reset_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<PasswordResetToken>> {
        let tokens = lock(&self.reset_tokens, "reset token")?;
        Ok(tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn consume_reset_token(&self, id: Uuid, new_password_hash: &str) -> StoreResult<bool> {
        let now = Utc::now();
        let mut tokens = lock(&self.reset_tokens, "reset token")?;
        let Some(token) = tokens.get_mut(&id).filter(|t| t.is_valid_at(now)) else {
            return Ok(false);
        };

        let mut identities = lock(&self.identities, "identity")?;
        let Some(identity) = identities.get_mut(&token.identity_id) else {
            return Ok(false);
        };

        identity.password_hash = new_password_hash.to_string();
        identity.updated_at = now;
        token.used_at = Some(now);
        Ok(true)
    }

    async fn delete_expired_reset_tokens(&self) -> StoreResult<u64> {
        let now = Utc::now();
        let mut tokens = lock(&self.reset_tokens, "reset token")?;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired_at(now));
        Ok((before - tokens.len()) as u64)
    }
}
