use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only login audit record.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LoginAttempt {
    pub id: Uuid,
    /// `None` when the submitted email matched no identity
    pub identity_id: Option<Uuid>,
    pub email: String,
    pub ip_address: String,
    pub success: bool,
    pub attempted_at: DateTime<Utc>,
}

impl LoginAttempt {
    pub fn new(identity_id: Option<Uuid>, email: &str, ip_address: &str, success: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity_id,
            email: email.to_string(),
            ip_address: ip_address.to_string(),
            success,
            attempted_at: Utc::now(),
        }
    }
}
