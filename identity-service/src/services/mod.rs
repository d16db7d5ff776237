//! Business logic for the identity service.
//!
//! The three engines ([`IdentityService`], [`TokenService`],
//! [`PasswordService`]) only talk to the store traits and the collaborator
//! traits defined here.

pub mod error;
pub mod events;
pub mod identity;
pub mod jwt;
pub mod notifier;
pub mod opaque;
pub mod password;
pub mod roles;
pub mod token;

pub use error::ServiceError;
pub use events::{
    EventPublisher, IdentityEvent, IdentityEventKind, NoopEventPublisher,
    RecordingEventPublisher, RedisEventPublisher,
};
pub use identity::{
    IdentityService, LoginOrigin, LoginResult, MessageResult, NewIdentity, ProfileResult,
    RegisterResult,
};
pub use jwt::{AccessTokenClaims, JwtService};
pub use notifier::{LogResetNotifier, RecordingResetNotifier, ResetNotifier};
pub use opaque::{hash_token, OpaqueToken};
pub use password::PasswordService;
pub use roles::{HttpRoleResolver, RoleGrant, RoleResolver, StaticRoleResolver};
pub use token::{RefreshResult, SweepReport, TokenService};
