mod common;

use chrono::Duration;
use common::{origin, wait_for_events, TestHarness, PASSWORD};
use identity_service::{
    models::IdentityStatus,
    services::{IdentityEventKind, JwtService, ServiceError, StaticRoleResolver},
    store::CredentialStore,
    utils::Password,
};

#[tokio::test]
async fn login_issues_tokens_and_records_success() {
    let harness = TestHarness::new();
    let identity = harness.register("ada@example.com").await;

    let result = harness.login("ada@example.com").await;

    assert_eq!(result.token_type, "Bearer");
    assert_eq!(result.expires_in, 15 * 60);
    assert_eq!(result.refresh_token.len(), 64);

    let tokens = harness.store.refresh_tokens().unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].identity_id, identity.id);
    assert_ne!(tokens[0].token_hash, result.refresh_token);
    assert_eq!(tokens[0].device_info, "integration-test");
    assert_eq!(tokens[0].ip_address, "203.0.113.10");

    let attempts = harness.store.attempts().unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].success);
    assert_eq!(attempts[0].identity_id, Some(identity.id));
}

#[tokio::test]
async fn access_token_carries_user_and_roles() {
    let harness = TestHarness::new();
    let identity = harness.register("claims@example.com").await;

    let result = harness.login("claims@example.com").await;

    let jwt = JwtService::new(&common::jwt_config()).unwrap();
    let claims = jwt.validate_access_token(&result.access_token).unwrap();
    assert_eq!(claims.sub, identity.user_id.to_string());
    assert_eq!(claims.email, "claims@example.com");
    assert_eq!(claims.roles, vec!["admin".to_string()]);
    assert_eq!(claims.permissions.len(), 2);
}

#[tokio::test]
async fn role_service_outage_yields_empty_roles() {
    let harness = TestHarness::builder()
        .roles(StaticRoleResolver::unavailable())
        .build();
    harness.register("noroles@example.com").await;

    let result = harness.login("noroles@example.com").await;

    let claims = harness
        .tokens
        .verify_access_token(&result.access_token)
        .unwrap();
    assert!(claims.roles.is_empty());
    assert!(claims.permissions.is_empty());
}

#[tokio::test]
async fn wrong_password_records_failure_and_issues_nothing() {
    let harness = TestHarness::new();
    let identity = harness.register("wrong@example.com").await;

    let err = harness
        .identity
        .login(
            "wrong@example.com",
            &Password::new("not-the-password".to_string()),
            origin(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::InvalidCredentials));
    assert!(harness.store.refresh_tokens().unwrap().is_empty());

    let attempts = harness.store.attempts().unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].success);
    assert_eq!(attempts[0].identity_id, Some(identity.id));
}

#[tokio::test]
async fn unknown_email_is_indistinguishable_from_wrong_password() {
    let harness = TestHarness::new();
    harness.register("known@example.com").await;

    let unknown = harness
        .identity
        .login(
            "nobody@example.com",
            &Password::new(PASSWORD.to_string()),
            origin(),
        )
        .await
        .unwrap_err();
    let wrong = harness
        .identity
        .login(
            "known@example.com",
            &Password::new("bad-password".to_string()),
            origin(),
        )
        .await
        .unwrap_err();

    assert_eq!(unknown.kind(), wrong.kind());
    assert_eq!(unknown.to_string(), wrong.to_string());

    let attempts = harness.store.attempts().unwrap();
    let unknown_attempt = attempts
        .iter()
        .find(|a| a.email == "nobody@example.com")
        .expect("unknown email attempt recorded");
    assert_eq!(unknown_attempt.identity_id, None);
    assert!(!unknown_attempt.success);
}

#[tokio::test]
async fn locked_and_suspended_accounts_are_refused() {
    let harness = TestHarness::new();

    for (email, status) in [
        ("locked@example.com", IdentityStatus::Locked),
        ("suspended@example.com", IdentityStatus::Suspended),
    ] {
        let identity = harness.register(email).await;
        harness.store.update_status(identity.id, status).await.unwrap();

        let err = harness
            .identity
            .login(email, &Password::new(PASSWORD.to_string()), origin())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AccountLocked));
    }

    assert!(harness.store.refresh_tokens().unwrap().is_empty());
}

#[tokio::test]
async fn unverified_account_may_log_in_by_default() {
    let harness = TestHarness::new();
    let identity = harness.register("fresh@example.com").await;
    assert_eq!(identity.status, IdentityStatus::Unverified);

    harness.login("fresh@example.com").await;
}

#[tokio::test]
async fn verified_email_policy_refuses_unverified_accounts() {
    let harness = TestHarness::builder().require_verified_email().build();
    let identity = harness.register("strict@example.com").await;

    let err = harness
        .identity
        .login(
            "strict@example.com",
            &Password::new(PASSWORD.to_string()),
            origin(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::EmailNotVerified));

    harness.store.mark_email_verified(identity.id).await.unwrap();
    harness
        .store
        .update_status(identity.id, IdentityStatus::Active)
        .await
        .unwrap();
    harness.login("strict@example.com").await;
}

#[tokio::test]
async fn failures_are_counted_within_window() {
    let harness = TestHarness::new();
    let identity = harness.register("counted@example.com").await;

    for _ in 0..3 {
        let _ = harness
            .identity
            .login(
                "counted@example.com",
                &Password::new("nope-nope".to_string()),
                origin(),
            )
            .await;
    }

    let failures = harness
        .identity
        .recent_failures(identity.id, Duration::minutes(15))
        .await
        .unwrap();
    assert_eq!(failures, 3);

    let history = harness.identity.login_history(identity.id, 10).await.unwrap();
    assert_eq!(history.len(), 3);
}

#[tokio::test]
async fn login_publishes_logged_in_event() {
    let harness = TestHarness::new();
    harness.register("evt@example.com").await;
    harness.login("evt@example.com").await;

    wait_for_events(&harness.events, 2).await;
    let logged_in = harness
        .events
        .events()
        .into_iter()
        .find(|e| matches!(e.kind, IdentityEventKind::LoggedIn { .. }))
        .expect("logged in event");
    assert_eq!(
        logged_in.kind,
        IdentityEventKind::LoggedIn {
            device_info: "integration-test".to_string(),
            ip_address: "203.0.113.10".to_string(),
        }
    );
}

#[tokio::test]
async fn logout_revokes_every_session() {
    let harness = TestHarness::new();
    let identity = harness.register("multi@example.com").await;
    let first = harness.login("multi@example.com").await;
    let second = harness.login("multi@example.com").await;

    harness.identity.logout(identity.user_id).await.unwrap();

    for secret in [first.refresh_token, second.refresh_token] {
        let err = harness.tokens.refresh_access_token(&secret).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidOrExpiredToken));
    }
}

#[tokio::test]
async fn logout_of_unknown_user_succeeds() {
    let harness = TestHarness::new();
    assert!(harness.identity.logout(uuid::Uuid::new_v4()).await.is_ok());
}

#[tokio::test]
async fn change_password_requires_current_password() {
    let harness = TestHarness::new();
    let identity = harness.register("change@example.com").await;
    let session = harness.login("change@example.com").await;

    let err = harness
        .identity
        .change_password(
            identity.user_id,
            &Password::new("guess".to_string()),
            &Password::new("brand-new-password".to_string()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidCredentials));

    harness
        .identity
        .change_password(
            identity.user_id,
            &Password::new(PASSWORD.to_string()),
            &Password::new("brand-new-password".to_string()),
        )
        .await
        .unwrap();

    assert!(harness
        .tokens
        .refresh_access_token(&session.refresh_token)
        .await
        .is_err());
    assert!(harness
        .identity
        .login(
            "change@example.com",
            &Password::new("brand-new-password".to_string()),
            origin(),
        )
        .await
        .is_ok());
}

#[tokio::test]
async fn current_user_returns_profile() {
    let harness = TestHarness::new();
    let identity = harness.register("me@example.com").await;

    let profile = harness.identity.current_user(identity.user_id).await.unwrap();
    assert_eq!(profile.email, "me@example.com");
    assert_eq!(profile.first_name, "Ada");
    assert_eq!(profile.status, IdentityStatus::Unverified);
}
