use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{ChangePasswordRequest, ForgotPasswordRequest, MessageResponse, ResetPasswordRequest},
    middleware::AuthUser,
    utils::{Password, ValidatedJson},
    AppState,
};

/// Request a password reset token
///
/// Responds identically whether or not the email is registered.
#[utoipa::path(
    post,
    path = "/api/v1/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset requested", body = MessageResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Password"
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.password_service.forgot_password(&req.email).await?;
    Ok((StatusCode::OK, Json(MessageResponse::new(result.message))))
}

/// Set a new password using a reset token
#[utoipa::path(
    post,
    path = "/api/v1/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Password"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = state
        .password_service
        .reset_password(&req.token, &Password::new(req.new_password))
        .await?;
    Ok((StatusCode::OK, Json(MessageResponse::new(result.message))))
}

/// Change the caller's password
#[utoipa::path(
    post,
    path = "/api/v1/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 401, description = "Current password is wrong", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Password",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = state
        .identity_service
        .change_password(
            user.user_id()?,
            &Password::new(req.current_password),
            &Password::new(req.new_password),
        )
        .await?;
    Ok((StatusCode::OK, Json(MessageResponse::new(result.message))))
}
