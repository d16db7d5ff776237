//! Identity lifecycle events for downstream consumers.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, Client};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const EVENT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IdentityEventKind {
    #[serde(rename = "identity.registered")]
    Registered,
    #[serde(rename = "identity.logged_in")]
    LoggedIn {
        device_info: String,
        ip_address: String,
    },
    #[serde(rename = "identity.logged_out")]
    LoggedOut,
    #[serde(rename = "identity.password_changed")]
    PasswordChanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityEvent {
    pub version: String,
    pub user_id: Uuid,
    pub email: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: IdentityEventKind,
}

impl IdentityEvent {
    pub fn new(user_id: Uuid, email: &str, kind: IdentityEventKind) -> Self {
        Self {
            version: EVENT_VERSION.to_string(),
            user_id,
            email: email.to_string(),
            occurred_at: Utc::now(),
            kind,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            IdentityEventKind::Registered => "identity.registered",
            IdentityEventKind::LoggedIn { .. } => "identity.logged_in",
            IdentityEventKind::LoggedOut => "identity.logged_out",
            IdentityEventKind::PasswordChanged => "identity.password_changed",
        }
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &IdentityEvent) -> Result<(), anyhow::Error>;
}

/// Fire-and-forget publish. The caller never waits and never sees the error.
pub fn publish_detached(publisher: Arc<dyn EventPublisher>, event: IdentityEvent) {
    tokio::spawn(async move {
        if let Err(e) = publisher.publish(&event).await {
            tracing::warn!(
                event_type = event.type_name(),
                user_id = %event.user_id,
                error = %e,
                "Failed to publish identity event"
            );
        }
    });
}

/// Publishes JSON events on a Redis pub/sub channel.
#[derive(Clone)]
pub struct RedisEventPublisher {
    manager: ConnectionManager,
    channel: String,
}

impl RedisEventPublisher {
    pub async fn new(url: &str, channel: &str) -> Result<Self, anyhow::Error> {
        tracing::info!(channel = %channel, "Connecting to Redis for identity events");
        let client = Client::open(url)?;

        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        Ok(Self {
            manager,
            channel: channel.to_string(),
        })
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, event: &IdentityEvent) -> Result<(), anyhow::Error> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.manager.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(&self.channel)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to publish event: {}", e))?;

        tracing::debug!(
            event_type = event.type_name(),
            receivers,
            "Identity event published"
        );
        Ok(())
    }
}

/// Drops every event. Used when no event bus is configured.
#[derive(Clone, Default)]
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(&self, event: &IdentityEvent) -> Result<(), anyhow::Error> {
        tracing::debug!(event_type = event.type_name(), "Event bus disabled, dropping event");
        Ok(())
    }
}

/// Keeps published events in memory; optionally fails every publish.
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<IdentityEvent>>,
    fail: bool,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<IdentityEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: &IdentityEvent) -> Result<(), anyhow::Error> {
        if self.fail {
            return Err(anyhow::anyhow!("Event bus unavailable"));
        }
        self.events
            .lock()
            .map_err(|e| anyhow::anyhow!("Recording publisher mutex poisoned: {}", e))?
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logged_in_serializes_with_type_tag() {
        let event = IdentityEvent::new(
            Uuid::nil(),
            "a@x.com",
            IdentityEventKind::LoggedIn {
                device_info: "cli".to_string(),
                ip_address: "10.0.0.1".to_string(),
            },
        );
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "identity.logged_in");
        assert_eq!(json["version"], EVENT_VERSION);
        assert_eq!(json["device_info"], "cli");
        assert_eq!(json["ip_address"], "10.0.0.1");
        assert_eq!(json["email"], "a@x.com");
    }

    #[test]
    fn unit_variants_carry_only_the_envelope() {
        let event = IdentityEvent::new(Uuid::nil(), "a@x.com", IdentityEventKind::LoggedOut);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "identity.logged_out");
        assert!(json.get("device_info").is_none());

        let back: IdentityEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn failing_publisher_reports_error() {
        let publisher = RecordingEventPublisher::failing();
        let event = IdentityEvent::new(Uuid::nil(), "a@x.com", IdentityEventKind::Registered);
        assert!(publisher.publish(&event).await.is_err());
        assert!(publisher.events().is_empty());
    }
}
