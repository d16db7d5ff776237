//! Shared setup for identity-service integration tests.
//!
//! Engines are wired over `InMemoryStore` with recording collaborators so
//! every test can inspect what was persisted and published.

#![allow(dead_code)]

use identity_service::{
    build_router, build_services,
    config::JwtConfig,
    models::Identity,
    services::{
        IdentityService, LoginOrigin, NewIdentity, PasswordService, RecordingEventPublisher,
        RecordingResetNotifier, RoleGrant, RoleResolver, StaticRoleResolver, TokenService,
    },
    store::{CredentialStore, InMemoryStore},
    utils::Password,
    AppState, Collaborators, HttpSettings,
};
use secrecy::SecretString;
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const PASSWORD: &str = "correct-horse-battery";

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: SecretString::new(TEST_SECRET.to_string()),
        issuer: "identity-service".to_string(),
        access_token_expiry_minutes: 15,
        refresh_token_expiry_days: 7,
    }
}

pub fn admin_grant() -> RoleGrant {
    RoleGrant {
        roles: vec!["admin".to_string()],
        permissions: vec!["users:read".to_string(), "users:write".to_string()],
    }
}

pub struct TestHarness {
    pub store: Arc<InMemoryStore>,
    pub events: Arc<RecordingEventPublisher>,
    pub notifier: Arc<RecordingResetNotifier>,
    pub identity: IdentityService,
    pub tokens: TokenService,
    pub passwords: PasswordService,
    pub collaborators: Collaborators,
}

pub struct HarnessBuilder {
    roles: Arc<dyn RoleResolver>,
    events: Arc<RecordingEventPublisher>,
    notifier: Arc<RecordingResetNotifier>,
    require_verified_email: bool,
}

impl HarnessBuilder {
    pub fn roles(mut self, roles: impl RoleResolver + 'static) -> Self {
        self.roles = Arc::new(roles);
        self
    }

    pub fn events(mut self, events: RecordingEventPublisher) -> Self {
        self.events = Arc::new(events);
        self
    }

    pub fn notifier(mut self, notifier: RecordingResetNotifier) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn require_verified_email(mut self) -> Self {
        self.require_verified_email = true;
        self
    }

    pub fn build(self) -> TestHarness {
        let store = Arc::new(InMemoryStore::new());
        let collaborators = Collaborators::from_store(
            store.clone(),
            self.roles,
            self.events.clone(),
            self.notifier.clone(),
        );
        let (identity, tokens, passwords) =
            build_services(&collaborators, &jwt_config(), self.require_verified_email)
                .expect("services should build");

        TestHarness {
            store,
            events: self.events,
            notifier: self.notifier,
            identity,
            tokens,
            passwords,
            collaborators,
        }
    }
}

impl TestHarness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            roles: Arc::new(StaticRoleResolver::new(admin_grant())),
            events: Arc::new(RecordingEventPublisher::new()),
            notifier: Arc::new(RecordingResetNotifier::new()),
            require_verified_email: false,
        }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    pub async fn register(&self, email: &str) -> Identity {
        self.identity
            .register(NewIdentity {
                email: email.to_string(),
                password: Password::new(PASSWORD.to_string()),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
            })
            .await
            .expect("registration should succeed");

        self.find(email).await
    }

    pub async fn find(&self, email: &str) -> Identity {
        self.store
            .find_identity_by_email(email)
            .await
            .expect("store lookup")
            .expect("identity exists")
    }

    /// Log in with [`PASSWORD`] and return the refresh secret.
    pub async fn login(&self, email: &str) -> identity_service::services::LoginResult {
        self.identity
            .login(email, &Password::new(PASSWORD.to_string()), origin())
            .await
            .expect("login should succeed")
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            identity_service: self.identity.clone(),
            token_service: self.tokens.clone(),
            password_service: self.passwords.clone(),
            credentials: self.collaborators.credentials.clone(),
            login_rate_limiter: create_ip_rate_limiter(100, 60),
            password_reset_rate_limiter: create_ip_rate_limiter(100, 60),
            service_name: "identity-service".to_string(),
            service_version: "test".to_string(),
        }
    }

    pub fn router(&self) -> axum::Router {
        build_router(
            self.app_state(),
            &HttpSettings {
                allowed_origins: vec!["http://localhost:3000".to_string()],
                request_timeout_seconds: 30,
                docs_enabled: false,
            },
        )
    }
}

pub fn origin() -> LoginOrigin {
    LoginOrigin {
        device_info: "integration-test".to_string(),
        ip_address: "203.0.113.10".to_string(),
    }
}

/// Events are published from detached tasks; poll until `count` arrived.
pub async fn wait_for_events(events: &RecordingEventPublisher, count: usize) {
    for _ in 0..100 {
        if events.events().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
