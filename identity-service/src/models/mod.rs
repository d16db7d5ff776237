pub mod identity;
pub mod login_attempt;
pub mod password_reset_token;
pub mod refresh_token;

pub use identity::{Identity, IdentityStatus};
pub use login_attempt::LoginAttempt;
pub use password_reset_token::{PasswordResetToken, RESET_TOKEN_TTL_MINUTES};
pub use refresh_token::RefreshToken;
