//! HTTP handlers for the identity service.

pub mod auth;
pub mod health;
pub mod origin;
pub mod user;

pub use auth::*;
pub use health::{health_check, readiness_check};
pub use user::{get_me, list_sessions};
