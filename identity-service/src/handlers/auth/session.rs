use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use std::net::SocketAddr;

use crate::{
    dtos::{LoginRequest, LoginResponse, MessageResponse, RefreshRequest, RefreshResponse},
    handlers::origin::{device_info, origin_address},
    middleware::AuthUser,
    services::LoginOrigin,
    utils::{Password, ValidatedJson},
    AppState,
};

/// Login with email and password
#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account locked or email not verified", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let origin = LoginOrigin {
        device_info: device_info(req.device_info, &headers),
        ip_address: origin_address(&headers, connect_info.as_ref()),
    };

    let result = state
        .identity_service
        .login(&req.email, &Password::new(req.password), origin)
        .await?;

    Ok((StatusCode::OK, Json(LoginResponse::from(result))))
}

/// Logout: revoke every refresh token of the caller
#[utoipa::path(
    post,
    path = "/api/v1/logout",
    responses(
        (status = 200, description = "Logged out successfully", body = MessageResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    state.identity_service.logout(user.user_id()?).await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Logged out successfully")),
    ))
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/api/v1/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed successfully", body = RefreshResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = state
        .token_service
        .refresh_access_token(&req.refresh_token)
        .await?;
    Ok((StatusCode::OK, Json(RefreshResponse::from(result))))
}

/// Revoke a single refresh token
#[utoipa::path(
    post,
    path = "/api/v1/revoke",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Refresh token revoked", body = MessageResponse),
        (status = 401, description = "Unknown token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn revoke(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .token_service
        .revoke_refresh_token(&req.refresh_token)
        .await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Refresh token revoked")),
    ))
}
