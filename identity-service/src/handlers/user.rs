use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{ProfileResponse, SessionResponse},
    middleware::AuthUser,
    AppState,
};

/// Profile of the authenticated caller
#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Current user", body = ProfileResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    ),
    tag = "User",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.identity_service.current_user(user.user_id()?).await?;
    Ok(Json(ProfileResponse::from(profile)))
}

/// Active sessions (refresh tokens) of the caller
#[utoipa::path(
    get,
    path = "/api/v1/sessions",
    responses(
        (status = 200, description = "Active sessions, newest first", body = [SessionResponse]),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    ),
    tag = "User",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let sessions: Vec<SessionResponse> = state
        .token_service
        .active_sessions(user.user_id()?)
        .await?
        .into_iter()
        .map(SessionResponse::from)
        .collect();
    Ok(Json(sessions))
}
