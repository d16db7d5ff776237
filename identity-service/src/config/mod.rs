use secrecy::{ExposeSecret, SecretString};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

/// Minimum HS256 secret length accepted in production.
const MIN_PROD_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub authz: AuthzConfig,
    pub policy: PolicyConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Event bus. Events are dropped when no URL is configured.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub events_channel: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: SecretString,
    pub issuer: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
}

/// External role/permission service. Tokens carry no roles when unset.
#[derive(Debug, Clone)]
pub struct AuthzConfig {
    pub service_url: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub require_verified_email: bool,
    pub token_sweep_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub password_reset_attempts: u32,
    pub password_reset_window_seconds: u64,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = IdentityConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("identity-service"), false)?,
            service_version: get_env(
                "SERVICE_VERSION",
                Some(env!("CARGO_PKG_VERSION")),
                false,
            )?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: get_parsed("DATABASE_MAX_CONNECTIONS", "10")?,
                min_connections: get_parsed("DATABASE_MIN_CONNECTIONS", "1")?,
            },
            redis: RedisConfig {
                url: get_optional_env("REDIS_URL"),
                events_channel: get_env("EVENTS_CHANNEL", Some("identity.events"), false)?,
            },
            jwt: JwtConfig {
                secret: SecretString::new(get_env(
                    "JWT_SECRET",
                    Some("dev-only-insecure-secret-change-me"),
                    is_prod,
                )?),
                issuer: get_env("JWT_ISSUER", Some("identity-service"), false)?,
                access_token_expiry_minutes: get_parsed("JWT_ACCESS_TOKEN_EXPIRY_MINUTES", "1440")?,
                refresh_token_expiry_days: get_parsed("JWT_REFRESH_TOKEN_EXPIRY_DAYS", "7")?,
            },
            authz: AuthzConfig {
                service_url: get_optional_env("AUTHZ_SERVICE_URL"),
                timeout_seconds: get_parsed("AUTHZ_TIMEOUT_SECONDS", "5")?,
            },
            policy: PolicyConfig {
                require_verified_email: get_parsed("REQUIRE_VERIFIED_EMAIL", "false")?,
                token_sweep_interval_seconds: get_parsed("TOKEN_SWEEP_INTERVAL_SECONDS", "3600")?,
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            rate_limit: RateLimitConfig {
                login_attempts: get_parsed("RATE_LIMIT_LOGIN_ATTEMPTS", "5")?,
                login_window_seconds: get_parsed("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900")?,
                password_reset_attempts: get_parsed("RATE_LIMIT_PASSWORD_RESET_ATTEMPTS", "3")?,
                password_reset_window_seconds: get_parsed(
                    "RATE_LIMIT_PASSWORD_RESET_WINDOW_SECONDS",
                    "3600",
                )?,
            },
            request_timeout_seconds: get_parsed("REQUEST_TIMEOUT_SECONDS", "30")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.jwt.refresh_token_expiry_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_REFRESH_TOKEN_EXPIRY_DAYS must be positive"
            )));
        }

        if self.policy.token_sweep_interval_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TOKEN_SWEEP_INTERVAL_SECONDS must be positive"
            )));
        }

        if self.environment == Environment::Prod {
            if self.jwt.secret.expose_secret().len() < MIN_PROD_SECRET_LEN {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_SECRET must be at least {} bytes in production",
                    MIN_PROD_SECRET_LEN
                )));
            }

            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.redis.url.is_none() {
                tracing::warn!("REDIS_URL not set, identity events will be dropped");
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_parsed<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(default), false)?;
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value {:?}: {}", key, raw, e))
    })
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> IdentityConfig {
        IdentityConfig {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "identity-service".to_string(),
            service_version: "test".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: "postgres://localhost/identity".to_string(),
                max_connections: 5,
                min_connections: 1,
            },
            redis: RedisConfig {
                url: None,
                events_channel: "identity.events".to_string(),
            },
            jwt: JwtConfig {
                secret: SecretString::new("short".to_string()),
                issuer: "identity-service".to_string(),
                access_token_expiry_minutes: 15,
                refresh_token_expiry_days: 7,
            },
            authz: AuthzConfig {
                service_url: None,
                timeout_seconds: 5,
            },
            policy: PolicyConfig {
                require_verified_email: false,
                token_sweep_interval_seconds: 3600,
            },
            security: SecurityConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            },
            rate_limit: RateLimitConfig {
                login_attempts: 5,
                login_window_seconds: 900,
                password_reset_attempts: 3,
                password_reset_window_seconds: 3600,
            },
            request_timeout_seconds: 30,
        }
    }

    #[test]
    fn dev_accepts_short_secret() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn prod_rejects_short_secret() {
        let mut config = config();
        config.environment = Environment::Prod;
        assert!(config.validate().is_err());

        config.jwt.secret = SecretString::new("x".repeat(MIN_PROD_SECRET_LEN));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn prod_rejects_wildcard_origin() {
        let mut config = config();
        config.environment = Environment::Prod;
        config.jwt.secret = SecretString::new("x".repeat(MIN_PROD_SECRET_LEN));
        config.security.allowed_origins = vec!["*".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_expiry_is_rejected() {
        let mut config = config();
        config.jwt.refresh_token_expiry_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn environment_parses_case_insensitively() {
        assert_eq!("PROD".parse::<Environment>(), Ok(Environment::Prod));
        assert!("staging".parse::<Environment>().is_err());
    }
}
