use axum::http::StatusCode;
use service_core::error::AppError;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is locked or suspended")]
    AccountLocked,

    #[error("Email address has not been verified")]
    EmailNotVerified,

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Password hashing failed: {0}")]
    HashingFailure(anyhow::Error),

    #[error("Store error: {0}")]
    StoreFailure(#[from] StoreError),

    #[error("Token signing failed: {0}")]
    SigningFailure(anyhow::Error),
}

impl ServiceError {
    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::DuplicateEmail => "DUPLICATE_EMAIL",
            ServiceError::InvalidCredentials => "INVALID_CREDENTIALS",
            ServiceError::AccountLocked => "ACCOUNT_LOCKED",
            ServiceError::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            ServiceError::InvalidOrExpiredToken => "INVALID_OR_EXPIRED_TOKEN",
            ServiceError::HashingFailure(_) => "HASHING_FAILURE",
            ServiceError::StoreFailure(_) => "STORE_FAILURE",
            ServiceError::SigningFailure(_) => "SIGNING_FAILURE",
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let code = err.kind();
        match err {
            ServiceError::DuplicateEmail => {
                AppError::rejected(StatusCode::CONFLICT, code, err.to_string())
            }
            ServiceError::InvalidCredentials | ServiceError::InvalidOrExpiredToken => {
                AppError::rejected(StatusCode::UNAUTHORIZED, code, err.to_string())
            }
            ServiceError::AccountLocked | ServiceError::EmailNotVerified => {
                AppError::rejected(StatusCode::FORBIDDEN, code, err.to_string())
            }
            ServiceError::StoreFailure(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::HashingFailure(e) | ServiceError::SigningFailure(e) => {
                AppError::InternalError(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn business_errors_map_to_client_statuses() {
        let cases = [
            (ServiceError::DuplicateEmail, StatusCode::CONFLICT),
            (ServiceError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (ServiceError::InvalidOrExpiredToken, StatusCode::UNAUTHORIZED),
            (ServiceError::AccountLocked, StatusCode::FORBIDDEN),
            (ServiceError::EmailNotVerified, StatusCode::FORBIDDEN),
        ];
        for (err, status) in cases {
            let kind = err.kind();
            let app: AppError = err.into();
            assert_eq!(app.code(), kind);
            assert_eq!(app.into_response().status(), status);
        }
    }

    #[test]
    fn infrastructure_errors_are_opaque_500s() {
        let app: AppError = ServiceError::StoreFailure(StoreError::NotFound).into();
        assert_eq!(
            app.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let app: AppError = ServiceError::SigningFailure(anyhow::anyhow!("bad key")).into();
        assert_eq!(
            app.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
