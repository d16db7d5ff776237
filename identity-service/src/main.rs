use identity_service::{
    build_router, build_services,
    config::{Environment, IdentityConfig},
    services::{
        EventPublisher, HttpRoleResolver, LogResetNotifier, NoopEventPublisher,
        RedisEventPublisher, RoleGrant, RoleResolver, StaticRoleResolver, TokenService,
    },
    store::PgStore,
    AppState, Collaborators, HttpSettings,
};
use service_core::error::AppError;
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = IdentityConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity service"
    );

    let store = PgStore::connect(&config.database)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
    store
        .migrate()
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
    let store = Arc::new(store);

    let events: Arc<dyn EventPublisher> = match &config.redis.url {
        Some(url) => Arc::new(
            RedisEventPublisher::new(url, &config.redis.events_channel)
                .await
                .map_err(AppError::InternalError)?,
        ),
        None => {
            tracing::warn!("REDIS_URL not set, identity events are disabled");
            Arc::new(NoopEventPublisher)
        }
    };

    let roles: Arc<dyn RoleResolver> = match &config.authz.service_url {
        Some(url) => Arc::new(
            HttpRoleResolver::new(url, config.authz.timeout_seconds)
                .map_err(AppError::ConfigError)?,
        ),
        None => {
            tracing::warn!("AUTHZ_SERVICE_URL not set, access tokens will carry no roles");
            Arc::new(StaticRoleResolver::new(RoleGrant::default()))
        }
    };

    let collaborators =
        Collaborators::from_store(store, roles, events, Arc::new(LogResetNotifier));
    let (identity_service, token_service, password_service) = build_services(
        &collaborators,
        &config.jwt,
        config.policy.require_verified_email,
    )?;

    let state = AppState {
        identity_service,
        token_service: token_service.clone(),
        password_service,
        credentials: collaborators.credentials.clone(),
        login_rate_limiter: create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
        ),
        password_reset_rate_limiter: create_ip_rate_limiter(
            config.rate_limit.password_reset_attempts,
            config.rate_limit.password_reset_window_seconds,
        ),
        service_name: config.service_name.clone(),
        service_version: config.service_version.clone(),
    };

    let http = HttpSettings {
        allowed_origins: config.security.allowed_origins.clone(),
        request_timeout_seconds: config.request_timeout_seconds,
        docs_enabled: config.environment == Environment::Dev,
    };
    let app = build_router(state, &http);

    let sweeper = tokio::spawn(sweep_expired_tokens(
        token_service,
        Duration::from_secs(config.policy.token_sweep_interval_seconds),
    ));

    let addr = config.common.bind_address();
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    tracing::info!("Service shutdown complete");
    Ok(())
}

/// Periodically delete expired refresh and reset tokens.
async fn sweep_expired_tokens(tokens: TokenService, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        match tokens.sweep_expired().await {
            Ok(report) => tracing::info!(
                refresh_tokens = report.refresh_tokens,
                reset_tokens = report.reset_tokens,
                "Expired tokens swept"
            ),
            Err(e) => tracing::error!(error = %e, "Token sweep failed"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
