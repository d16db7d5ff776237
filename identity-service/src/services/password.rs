//! Password recovery via single-use reset secrets.

use std::sync::Arc;

use super::error::ServiceError;
use super::events::{publish_detached, EventPublisher, IdentityEvent, IdentityEventKind};
use super::identity::MessageResult;
use super::notifier::ResetNotifier;
use super::opaque::{hash_token, OpaqueToken};
use super::token::TokenService;
use crate::models::PasswordResetToken;
use crate::store::{CredentialStore, ResetTokenStore};
use crate::utils::password::{Password, PasswordHasher};

pub const FORGOT_PASSWORD_MESSAGE: &str = "If the email exists, a reset link has been sent.";
pub const RESET_PASSWORD_MESSAGE: &str = "Password reset successful.";

#[derive(Clone)]
pub struct PasswordService {
    credentials: Arc<dyn CredentialStore>,
    reset_tokens: Arc<dyn ResetTokenStore>,
    hasher: PasswordHasher,
    tokens: TokenService,
    events: Arc<dyn EventPublisher>,
    notifier: Arc<dyn ResetNotifier>,
}

impl PasswordService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        reset_tokens: Arc<dyn ResetTokenStore>,
        hasher: PasswordHasher,
        tokens: TokenService,
        events: Arc<dyn EventPublisher>,
        notifier: Arc<dyn ResetNotifier>,
    ) -> Self {
        Self {
            credentials,
            reset_tokens,
            hasher,
            tokens,
            events,
            notifier,
        }
    }

    /// Same response whether or not the email is registered.
    #[tracing::instrument(skip_all)]
    pub async fn forgot_password(&self, email: &str) -> Result<MessageResult, ServiceError> {
        let email = email.trim().to_lowercase();

        if let Some(identity) = self.credentials.find_identity_by_email(&email).await? {
            let secret = OpaqueToken::generate();
            let record = PasswordResetToken::new(identity.id, hash_token(&secret));
            self.reset_tokens.create_reset_token(&record).await?;

            if let Err(e) = self
                .notifier
                .send_reset_token(&identity.email, &secret)
                .await
            {
                tracing::error!(user_id = %identity.user_id, error = %e, "Failed to deliver reset token");
            }
        } else {
            tracing::debug!("Password reset requested for unknown email");
        }

        Ok(MessageResult {
            message: FORGOT_PASSWORD_MESSAGE.to_string(),
        })
    }

    #[tracing::instrument(skip_all)]
    pub async fn reset_password(
        &self,
        reset_secret: &str,
        new_password: &Password,
    ) -> Result<MessageResult, ServiceError> {
        let record = self
            .reset_tokens
            .find_reset_token_by_hash(&hash_token(reset_secret))
            .await?
            .filter(|t| t.is_valid())
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        let identity = self
            .credentials
            .find_identity_by_id(record.identity_id)
            .await?
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        let new_hash = self
            .hasher
            .hash(new_password)
            .await
            .map_err(ServiceError::HashingFailure)?;

        // Password update and consumption commit together; a lost race leaves
        // the password untouched.
        let consumed = self
            .reset_tokens
            .consume_reset_token(record.id, new_hash.as_str())
            .await?;
        if !consumed {
            tracing::info!(token_id = %record.id, "Reset token already consumed or expired");
            return Err(ServiceError::InvalidOrExpiredToken);
        }

        let revoked = self.tokens.revoke_all_for(identity.id).await?;

        tracing::info!(user_id = %identity.user_id, revoked, "Password reset");

        publish_detached(
            self.events.clone(),
            IdentityEvent::new(
                identity.user_id,
                &identity.email,
                IdentityEventKind::PasswordChanged,
            ),
        );

        Ok(MessageResult {
            message: RESET_PASSWORD_MESSAGE.to_string(),
        })
    }
}
