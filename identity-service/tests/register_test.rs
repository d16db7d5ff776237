mod common;

use common::{wait_for_events, TestHarness, PASSWORD};
use identity_service::{
    models::IdentityStatus,
    services::{IdentityEventKind, NewIdentity, ServiceError},
    utils::Password,
};

fn new_identity(email: &str) -> NewIdentity {
    NewIdentity {
        email: email.to_string(),
        password: Password::new(PASSWORD.to_string()),
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
    }
}

#[tokio::test]
async fn register_creates_unverified_identity() {
    let harness = TestHarness::new();

    let result = harness
        .identity
        .register(new_identity("grace@example.com"))
        .await
        .expect("registration should succeed");

    assert_eq!(result.email, "grace@example.com");
    assert_eq!(
        result.message,
        "Registration successful. Please verify your email."
    );

    let identity = harness.find("grace@example.com").await;
    assert_eq!(identity.user_id, result.user_id);
    assert_eq!(identity.status, IdentityStatus::Unverified);
    assert!(!identity.email_verified);
    assert!(identity.password_hash.starts_with("$argon2"));
    assert_ne!(identity.password_hash, PASSWORD);
}

#[tokio::test]
async fn register_normalizes_email() {
    let harness = TestHarness::new();

    let result = harness
        .identity
        .register(new_identity("  Grace@Example.COM "))
        .await
        .unwrap();

    assert_eq!(result.email, "grace@example.com");
}

#[tokio::test]
async fn duplicate_email_is_rejected_without_state_change() {
    let harness = TestHarness::new();
    let first = harness.register("dup@example.com").await;

    let err = harness
        .identity
        .register(new_identity("DUP@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateEmail));

    let still = harness.find("dup@example.com").await;
    assert_eq!(still.user_id, first.user_id);
    assert_eq!(still.password_hash, first.password_hash);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_registration_yields_one_identity() {
    let harness = TestHarness::new();

    let (first, second) = tokio::join!(
        harness.identity.register(new_identity("twin@example.com")),
        harness.identity.register(new_identity("Twin@example.com")),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(ServiceError::DuplicateEmail))));

    harness.find("twin@example.com").await;
}

#[tokio::test]
async fn register_publishes_registered_event() {
    let harness = TestHarness::new();
    let identity = harness.register("events@example.com").await;

    wait_for_events(&harness.events, 1).await;
    let events = harness.events.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, IdentityEventKind::Registered);
    assert_eq!(events[0].user_id, identity.user_id);
}

#[tokio::test]
async fn event_bus_failure_does_not_fail_registration() {
    let harness = TestHarness::builder()
        .events(identity_service::services::RecordingEventPublisher::failing())
        .build();

    assert!(harness
        .identity
        .register(new_identity("resilient@example.com"))
        .await
        .is_ok());
}
