pub mod auth;

pub use auth::*;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// OpenAPI view of `service_core::error::ErrorResponse`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Invalid email or password")]
    pub error: String,
    #[schema(example = "INVALID_CREDENTIALS")]
    pub code: String,
    pub details: Option<String>,
}
