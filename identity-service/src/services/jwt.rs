use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::services::roles::RoleGrant;

/// JWT service for access token issuance and validation (HS256)
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_token_expiry_minutes: i64,
}

/// Claims for access tokens (short-lived)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (external user ID)
    pub sub: String,
    /// Email
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Issuer
    pub iss: String,
    /// JWT ID
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn user_id(&self) -> Result<Uuid, anyhow::Error> {
        Uuid::parse_str(&self.sub).map_err(|e| anyhow::anyhow!("Invalid subject claim: {}", e))
    }
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        let secret = config.secret.expose_secret();
        if secret.is_empty() {
            return Err(anyhow::anyhow!("JWT secret must not be empty"));
        }
        if config.access_token_expiry_minutes <= 0 {
            return Err(anyhow::anyhow!("Access token expiry must be positive"));
        }

        tracing::info!(issuer = %config.issuer, "JWT service initialized with HS256 secret");

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: config.issuer.clone(),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
        })
    }

    /// Generate an access token for a user with their current role grant
    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        grant: &RoleGrant,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            roles: grant.roles.clone(),
            permissions: grant.permissions.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))
    }

    /// Validate and decode an access token
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, anyhow::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[self.issuer.as_str()]);

        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow::anyhow!("Invalid access token: {}", e))?;

        Ok(token_data.claims)
    }

    /// Get access token expiry in seconds (for client info)
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config(secret: &str) -> JwtConfig {
        JwtConfig {
            secret: SecretString::new(secret.to_string()),
            issuer: "identity-service".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        }
    }

    fn grant() -> RoleGrant {
        RoleGrant {
            roles: vec!["admin".to_string()],
            permissions: vec!["users:read".to_string()],
        }
    }

    #[test]
    fn test_generate_and_validate_access_token() -> Result<(), anyhow::Error> {
        let service = JwtService::new(&config("a-test-secret-that-is-long-enough"))?;
        let user_id = Uuid::new_v4();

        let token = service.generate_access_token(user_id, "test@example.com", &grant())?;
        let claims = service.validate_access_token(&token)?;

        assert_eq!(claims.user_id()?, user_id);
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.roles, vec!["admin".to_string()]);
        assert_eq!(claims.permissions, vec!["users:read".to_string()]);
        assert_eq!(claims.iss, "identity-service");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
        assert!(!claims.jti.is_empty());

        Ok(())
    }

    #[test]
    fn test_each_token_has_unique_jti() -> Result<(), anyhow::Error> {
        let service = JwtService::new(&config("a-test-secret-that-is-long-enough"))?;
        let user_id = Uuid::new_v4();

        let a = service.validate_access_token(&service.generate_access_token(
            user_id,
            "a@x.com",
            &RoleGrant::default(),
        )?)?;
        let b = service.validate_access_token(&service.generate_access_token(
            user_id,
            "a@x.com",
            &RoleGrant::default(),
        )?)?;
        assert_ne!(a.jti, b.jti);

        Ok(())
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() -> Result<(), anyhow::Error> {
        let ours = JwtService::new(&config("a-test-secret-that-is-long-enough"))?;
        let theirs = JwtService::new(&config("a-different-secret-entirely-here"))?;

        let token = theirs.generate_access_token(Uuid::new_v4(), "x@y.z", &grant())?;
        assert!(ours.validate_access_token(&token).is_err());

        Ok(())
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        assert!(JwtService::new(&config("")).is_err());
    }

    #[test]
    fn test_access_token_expiry_seconds() -> Result<(), anyhow::Error> {
        let service = JwtService::new(&config("a-test-secret-that-is-long-enough"))?;
        assert_eq!(service.access_token_expiry_seconds(), 900);
        Ok(())
    }
}
