//! Identity model - one authentication record per registered email.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Identity status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityStatus {
    Unverified,
    Active,
    Locked,
    Suspended,
}

impl IdentityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityStatus::Unverified => "unverified",
            IdentityStatus::Active => "active",
            IdentityStatus::Locked => "locked",
            IdentityStatus::Suspended => "suspended",
        }
    }
}

impl std::str::FromStr for IdentityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unverified" => Ok(IdentityStatus::Unverified),
            "active" => Ok(IdentityStatus::Active),
            "locked" => Ok(IdentityStatus::Locked),
            "suspended" => Ok(IdentityStatus::Suspended),
            other => Err(format!("Invalid identity status: {}", other)),
        }
    }
}

impl TryFrom<String> for IdentityStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity entity.
///
/// `id` is internal to this service; `user_id` is the identifier every other
/// service knows the user by and the `sub` of issued access tokens.
#[derive(Debug, Clone, FromRow)]
pub struct Identity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    #[sqlx(try_from = "String")]
    pub status: IdentityStatus,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Create a freshly registered identity (unverified, email not confirmed).
    pub fn new(email: String, password_hash: String, first_name: String, last_name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            email,
            password_hash,
            first_name,
            last_name,
            status: IdentityStatus::Unverified,
            email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == IdentityStatus::Active
    }

    /// Locked and suspended accounts are refused regardless of password.
    pub fn is_locked_out(&self) -> bool {
        matches!(
            self.status,
            IdentityStatus::Locked | IdentityStatus::Suspended
        )
    }

    /// Strict login gate: active and email confirmed.
    pub fn can_login(&self) -> bool {
        self.is_active() && self.email_verified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::new(
            "a@x.com".to_string(),
            "hash".to_string(),
            "A".to_string(),
            "B".to_string(),
        )
    }

    #[test]
    fn new_identity_is_unverified() {
        let identity = identity();
        assert_eq!(identity.status, IdentityStatus::Unverified);
        assert!(!identity.email_verified);
        assert!(!identity.is_locked_out());
        assert!(!identity.can_login());
        assert_ne!(identity.id, identity.user_id);
    }

    #[test]
    fn locked_and_suspended_are_locked_out() {
        let mut identity = identity();
        identity.status = IdentityStatus::Locked;
        assert!(identity.is_locked_out());
        identity.status = IdentityStatus::Suspended;
        assert!(identity.is_locked_out());
    }

    #[test]
    fn can_login_requires_active_and_verified() {
        let mut identity = identity();
        identity.status = IdentityStatus::Active;
        assert!(!identity.can_login());
        identity.email_verified = true;
        assert!(identity.can_login());
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            IdentityStatus::Unverified,
            IdentityStatus::Active,
            IdentityStatus::Locked,
            IdentityStatus::Suspended,
        ] {
            assert_eq!(status.as_str().parse::<IdentityStatus>(), Ok(status));
        }
        assert!("deleted".parse::<IdentityStatus>().is_err());
    }
}
