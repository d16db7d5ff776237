//! Identity lifecycle: registration, login, logout and account self-service.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::error::ServiceError;
use super::events::{publish_detached, EventPublisher, IdentityEvent, IdentityEventKind};
use super::jwt::JwtService;
use super::roles::{resolve_or_empty, RoleResolver};
use super::token::TokenService;
use crate::models::{Identity, IdentityStatus, LoginAttempt};
use crate::store::{AttemptLedger, CredentialStore, StoreError};
use crate::utils::password::{Password, PasswordHashString, PasswordHasher};

pub const TOKEN_TYPE_BEARER: &str = "Bearer";
pub const REGISTER_MESSAGE: &str = "Registration successful. Please verify your email.";
pub const PASSWORD_CHANGED_MESSAGE: &str = "Password changed successfully.";

#[derive(Debug, Clone)]
pub struct RegisterResult {
    pub user_id: Uuid,
    pub email: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct MessageResult {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResult {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub status: IdentityStatus,
    pub email_verified: bool,
}

pub struct NewIdentity {
    pub email: String,
    pub password: Password,
    pub first_name: String,
    pub last_name: String,
}

/// Where a login came from. Both values are stored verbatim.
pub struct LoginOrigin {
    pub device_info: String,
    pub ip_address: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone)]
pub struct IdentityService {
    credentials: Arc<dyn CredentialStore>,
    attempts: Arc<dyn AttemptLedger>,
    hasher: PasswordHasher,
    jwt: JwtService,
    roles: Arc<dyn RoleResolver>,
    events: Arc<dyn EventPublisher>,
    tokens: TokenService,
    require_verified_email: bool,
}

impl IdentityService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        attempts: Arc<dyn AttemptLedger>,
        hasher: PasswordHasher,
        jwt: JwtService,
        roles: Arc<dyn RoleResolver>,
        events: Arc<dyn EventPublisher>,
        tokens: TokenService,
        require_verified_email: bool,
    ) -> Self {
        Self {
            credentials,
            attempts,
            hasher,
            jwt,
            roles,
            events,
            tokens,
            require_verified_email,
        }
    }

    #[tracing::instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: NewIdentity) -> Result<RegisterResult, ServiceError> {
        let email = normalize_email(&input.email);

        if self.credentials.find_identity_by_email(&email).await?.is_some() {
            tracing::info!("Registration rejected, email already registered");
            return Err(ServiceError::DuplicateEmail);
        }

        let password_hash = self
            .hasher
            .hash(&input.password)
            .await
            .map_err(ServiceError::HashingFailure)?;

        let identity = Identity::new(
            email,
            password_hash.into_string(),
            input.first_name,
            input.last_name,
        );

        match self.credentials.create_identity(&identity).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(ServiceError::DuplicateEmail),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id = %identity.user_id, "Identity registered");

        publish_detached(
            self.events.clone(),
            IdentityEvent::new(
                identity.user_id,
                &identity.email,
                IdentityEventKind::Registered,
            ),
        );

        Ok(RegisterResult {
            user_id: identity.user_id,
            email: identity.email,
            message: REGISTER_MESSAGE.to_string(),
        })
    }

    #[tracing::instrument(skip(self, password, origin), fields(ip = %origin.ip_address))]
    pub async fn login(
        &self,
        email: &str,
        password: &Password,
        origin: LoginOrigin,
    ) -> Result<LoginResult, ServiceError> {
        let email = normalize_email(email);

        let Some(identity) = self.credentials.find_identity_by_email(&email).await? else {
            self.attempts
                .record_attempt(&LoginAttempt::new(None, &email, &origin.ip_address, false))
                .await?;
            self.hasher.verify_dummy(password).await;
            tracing::info!("Login failed, unknown email");
            return Err(ServiceError::InvalidCredentials);
        };

        if identity.is_locked_out() {
            tracing::warn!(user_id = %identity.user_id, status = %identity.status, "Login refused, account locked");
            return Err(ServiceError::AccountLocked);
        }

        let matches = self
            .hasher
            .verify(
                password,
                &PasswordHashString::new(identity.password_hash.clone()),
            )
            .await
            .map_err(ServiceError::HashingFailure)?;

        if !matches {
            self.attempts
                .record_attempt(&LoginAttempt::new(
                    Some(identity.id),
                    &email,
                    &origin.ip_address,
                    false,
                ))
                .await?;
            tracing::info!(user_id = %identity.user_id, "Login failed, wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        if self.require_verified_email && !identity.can_login() {
            tracing::info!(user_id = %identity.user_id, "Login refused, email not verified");
            return Err(ServiceError::EmailNotVerified);
        }

        self.attempts
            .record_attempt(&LoginAttempt::new(
                Some(identity.id),
                &email,
                &origin.ip_address,
                true,
            ))
            .await?;

        let grant = resolve_or_empty(self.roles.as_ref(), identity.user_id).await;

        let access_token = self
            .jwt
            .generate_access_token(identity.user_id, &identity.email, &grant)
            .map_err(ServiceError::SigningFailure)?;

        let refresh_token = self
            .tokens
            .issue_refresh_token(identity.id, &origin.device_info, &origin.ip_address)
            .await?;

        tracing::info!(user_id = %identity.user_id, "Login succeeded");

        publish_detached(
            self.events.clone(),
            IdentityEvent::new(
                identity.user_id,
                &identity.email,
                IdentityEventKind::LoggedIn {
                    device_info: origin.device_info,
                    ip_address: origin.ip_address,
                },
            ),
        );

        Ok(LoginResult {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.jwt.access_token_expiry_seconds(),
        })
    }

    /// Ends every session of the user. Unknown users are a no-op.
    ///
    /// The identity is resolved before revoking because tokens are keyed by the
    /// internal id; a failed lookup therefore fails the logout.
    #[tracing::instrument(skip(self))]
    pub async fn logout(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let Some(identity) = self.credentials.find_identity_by_user_id(user_id).await? else {
            return Ok(());
        };

        let revoked = self.tokens.revoke_all_for(identity.id).await?;
        tracing::info!(revoked, "Logged out");

        publish_detached(
            self.events.clone(),
            IdentityEvent::new(
                identity.user_id,
                &identity.email,
                IdentityEventKind::LoggedOut,
            ),
        );
        Ok(())
    }

    #[tracing::instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &Password,
        new_password: &Password,
    ) -> Result<MessageResult, ServiceError> {
        let identity = self
            .credentials
            .find_identity_by_user_id(user_id)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        let matches = self
            .hasher
            .verify(
                current_password,
                &PasswordHashString::new(identity.password_hash.clone()),
            )
            .await
            .map_err(ServiceError::HashingFailure)?;
        if !matches {
            return Err(ServiceError::InvalidCredentials);
        }

        let new_hash = self
            .hasher
            .hash(new_password)
            .await
            .map_err(ServiceError::HashingFailure)?;
        self.credentials
            .update_password_hash(identity.id, new_hash.as_str())
            .await?;
        let revoked = self.tokens.revoke_all_for(identity.id).await?;

        tracing::info!(revoked, "Password changed");

        publish_detached(
            self.events.clone(),
            IdentityEvent::new(
                identity.user_id,
                &identity.email,
                IdentityEventKind::PasswordChanged,
            ),
        );

        Ok(MessageResult {
            message: PASSWORD_CHANGED_MESSAGE.to_string(),
        })
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<ProfileResult, ServiceError> {
        let identity = self
            .credentials
            .find_identity_by_user_id(user_id)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        Ok(ProfileResult {
            user_id: identity.user_id,
            email: identity.email,
            first_name: identity.first_name,
            last_name: identity.last_name,
            status: identity.status,
            email_verified: identity.email_verified,
        })
    }

    /// Failed logins for the identity inside the trailing `window`.
    pub async fn recent_failures(
        &self,
        identity_id: Uuid,
        window: Duration,
    ) -> Result<u64, ServiceError> {
        Ok(self
            .attempts
            .count_recent_failures(identity_id, Utc::now() - window)
            .await?)
    }

    pub async fn login_history(
        &self,
        identity_id: Uuid,
        limit: u32,
    ) -> Result<Vec<LoginAttempt>, ServiceError> {
        Ok(self
            .attempts
            .list_recent_attempts(identity_id, limit)
            .await?)
    }
}
