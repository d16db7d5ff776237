//! Refresh token lifecycle and access token renewal.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use super::error::ServiceError;
use super::jwt::{AccessTokenClaims, JwtService};
use super::opaque::{hash_token, OpaqueToken};
use super::roles::{resolve_or_empty, RoleResolver};
use crate::models::RefreshToken;
use crate::store::{CredentialStore, RefreshTokenStore, ResetTokenStore};

#[derive(Debug, Clone)]
pub struct RefreshResult {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub refresh_tokens: u64,
    pub reset_tokens: u64,
}

#[derive(Clone)]
pub struct TokenService {
    credentials: Arc<dyn CredentialStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    reset_tokens: Arc<dyn ResetTokenStore>,
    jwt: JwtService,
    roles: Arc<dyn RoleResolver>,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        reset_tokens: Arc<dyn ResetTokenStore>,
        jwt: JwtService,
        roles: Arc<dyn RoleResolver>,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            credentials,
            refresh_tokens,
            reset_tokens,
            jwt,
            roles,
            refresh_ttl,
        }
    }

    /// Mint a refresh secret for the identity. The plaintext is returned once
    /// and only its hash is stored.
    pub async fn issue_refresh_token(
        &self,
        identity_id: Uuid,
        device_info: &str,
        ip_address: &str,
    ) -> Result<String, ServiceError> {
        let secret = OpaqueToken::generate();
        let record = RefreshToken::new(
            identity_id,
            hash_token(&secret),
            device_info.to_string(),
            ip_address.to_string(),
            self.refresh_ttl,
        );
        self.refresh_tokens.create_refresh_token(&record).await?;

        tracing::debug!(token_id = %record.id, identity_id = %identity_id, "Refresh token issued");
        Ok(secret)
    }

    /// Exchange an active refresh secret for a new access token.
    ///
    /// The refresh token is not rotated; its record is left untouched.
    #[tracing::instrument(skip_all)]
    pub async fn refresh_access_token(
        &self,
        refresh_secret: &str,
    ) -> Result<RefreshResult, ServiceError> {
        let record = self
            .refresh_tokens
            .find_refresh_token_by_hash(&hash_token(refresh_secret))
            .await?
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        if !record.is_active_at(Utc::now()) {
            tracing::info!(token_id = %record.id, "Refresh rejected, token revoked or expired");
            return Err(ServiceError::InvalidOrExpiredToken);
        }

        let identity = self
            .credentials
            .find_identity_by_id(record.identity_id)
            .await?
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        let grant = resolve_or_empty(self.roles.as_ref(), identity.user_id).await;
        let access_token = self
            .jwt
            .generate_access_token(identity.user_id, &identity.email, &grant)
            .map_err(ServiceError::SigningFailure)?;

        Ok(RefreshResult {
            access_token,
            expires_in: self.jwt.access_token_expiry_seconds(),
        })
    }

    /// Revoke the single session identified by its secret.
    pub async fn revoke_refresh_token(&self, refresh_secret: &str) -> Result<(), ServiceError> {
        let record = self
            .refresh_tokens
            .find_refresh_token_by_hash(&hash_token(refresh_secret))
            .await?
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        self.refresh_tokens.revoke_refresh_token(record.id).await?;
        tracing::info!(token_id = %record.id, "Refresh token revoked");
        Ok(())
    }

    pub async fn revoke_all_for(&self, identity_id: Uuid) -> Result<u64, ServiceError> {
        Ok(self
            .refresh_tokens
            .revoke_all_refresh_tokens_for(identity_id)
            .await?)
    }

    /// Active refresh tokens of a user, newest first. Unknown users have none.
    pub async fn active_sessions(&self, user_id: Uuid) -> Result<Vec<RefreshToken>, ServiceError> {
        let Some(identity) = self.credentials.find_identity_by_user_id(user_id).await? else {
            return Ok(Vec::new());
        };
        Ok(self
            .refresh_tokens
            .list_active_refresh_tokens_for(identity.id)
            .await?)
    }

    /// Delete expired refresh and reset tokens.
    pub async fn sweep_expired(&self) -> Result<SweepReport, ServiceError> {
        let refresh_tokens = self.refresh_tokens.delete_expired_refresh_tokens().await?;
        let reset_tokens = self.reset_tokens.delete_expired_reset_tokens().await?;
        Ok(SweepReport {
            refresh_tokens,
            reset_tokens,
        })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, ServiceError> {
        self.jwt
            .validate_access_token(token)
            .map_err(|_| ServiceError::InvalidOrExpiredToken)
    }
}
