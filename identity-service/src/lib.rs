pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use chrono::Duration as ChronoDuration;
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{correlation_id_middleware, CORRELATION_ID_HEADER},
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::{openapi::security::SecurityScheme, Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::JwtConfig;
use crate::services::{
    EventPublisher, IdentityService, JwtService, PasswordService, ResetNotifier, RoleResolver,
    TokenService,
};
use crate::store::{AttemptLedger, CredentialStore, RefreshTokenStore, ResetTokenStore};
use crate::utils::PasswordHasher;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::auth::registration::register,
        handlers::auth::session::login,
        handlers::auth::session::logout,
        handlers::auth::session::refresh,
        handlers::auth::session::revoke,
        handlers::auth::password::forgot_password,
        handlers::auth::password::reset_password,
        handlers::auth::password::change_password,
        handlers::user::get_me,
        handlers::user::list_sessions,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::RegisterRequest,
            dtos::RegisterResponse,
            dtos::LoginRequest,
            dtos::LoginResponse,
            dtos::RefreshRequest,
            dtos::RefreshResponse,
            dtos::ForgotPasswordRequest,
            dtos::ResetPasswordRequest,
            dtos::ChangePasswordRequest,
            dtos::MessageResponse,
            dtos::ProfileResponse,
            dtos::SessionResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, login and token management"),
        (name = "Password", description = "Password recovery and change"),
        (name = "User", description = "Caller profile and sessions"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Storage and collaborator handles the engines are built from.
#[derive(Clone)]
pub struct Collaborators {
    pub credentials: Arc<dyn CredentialStore>,
    pub attempts: Arc<dyn AttemptLedger>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub reset_tokens: Arc<dyn ResetTokenStore>,
    pub roles: Arc<dyn RoleResolver>,
    pub events: Arc<dyn EventPublisher>,
    pub notifier: Arc<dyn ResetNotifier>,
}

impl Collaborators {
    /// Use one backend for every store trait.
    pub fn from_store<S>(
        store: Arc<S>,
        roles: Arc<dyn RoleResolver>,
        events: Arc<dyn EventPublisher>,
        notifier: Arc<dyn ResetNotifier>,
    ) -> Self
    where
        S: CredentialStore + AttemptLedger + RefreshTokenStore + ResetTokenStore + 'static,
    {
        Self {
            credentials: store.clone(),
            attempts: store.clone(),
            refresh_tokens: store.clone(),
            reset_tokens: store,
            roles,
            events,
            notifier,
        }
    }
}

/// HTTP-layer settings, separate from the engines.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub allowed_origins: Vec<String>,
    pub request_timeout_seconds: u64,
    pub docs_enabled: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub identity_service: IdentityService,
    pub token_service: TokenService,
    pub password_service: PasswordService,
    pub credentials: Arc<dyn CredentialStore>,
    pub login_rate_limiter: IpRateLimiter,
    pub password_reset_rate_limiter: IpRateLimiter,
    pub service_name: String,
    pub service_version: String,
}

/// Wire the three engines over the given collaborators.
pub fn build_services(
    collaborators: &Collaborators,
    jwt_config: &JwtConfig,
    require_verified_email: bool,
) -> Result<(IdentityService, TokenService, PasswordService), AppError> {
    let jwt = JwtService::new(jwt_config).map_err(AppError::ConfigError)?;
    let hasher = PasswordHasher::new().map_err(AppError::InternalError)?;

    let token_service = TokenService::new(
        collaborators.credentials.clone(),
        collaborators.refresh_tokens.clone(),
        collaborators.reset_tokens.clone(),
        jwt.clone(),
        collaborators.roles.clone(),
        ChronoDuration::days(jwt_config.refresh_token_expiry_days),
    );

    let identity_service = IdentityService::new(
        collaborators.credentials.clone(),
        collaborators.attempts.clone(),
        hasher.clone(),
        jwt,
        collaborators.roles.clone(),
        collaborators.events.clone(),
        token_service.clone(),
        require_verified_email,
    );

    let password_service = PasswordService::new(
        collaborators.credentials.clone(),
        collaborators.reset_tokens.clone(),
        hasher,
        token_service.clone(),
        collaborators.events.clone(),
        collaborators.notifier.clone(),
    );

    Ok((identity_service, token_service, password_service))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(CORRELATION_ID_HEADER),
        ])
}

pub fn build_router(state: AppState, http: &HttpSettings) -> Router {
    let login_route = Router::new()
        .route("/api/v1/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let forgot_password_route = Router::new()
        .route(
            "/api/v1/forgot-password",
            post(handlers::auth::forgot_password),
        )
        .layer(from_fn_with_state(
            state.password_reset_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let protected_routes = Router::new()
        .route("/api/v1/logout", post(handlers::auth::logout))
        .route("/api/v1/me", get(handlers::user::get_me))
        .route("/api/v1/sessions", get(handlers::user::list_sessions))
        .route(
            "/api/v1/change-password",
            post(handlers::auth::change_password),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check));

    if http.docs_enabled {
        app = app.merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    app.route("/api/v1/register", post(handlers::auth::register))
        .route("/api/v1/refresh", post(handlers::auth::refresh))
        .route("/api/v1/revoke", post(handlers::auth::revoke))
        .route(
            "/api/v1/reset-password",
            post(handlers::auth::reset_password),
        )
        .merge(login_route)
        .merge(forgot_password_route)
        .merge(protected_routes)
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(
            http.request_timeout_seconds,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&http.allowed_origins))
}
