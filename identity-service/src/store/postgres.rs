//! PostgreSQL implementation of the store traits.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use super::{
    AttemptLedger, CredentialStore, RefreshTokenStore, ResetTokenStore, StoreError, StoreResult,
};
use crate::config::DatabaseConfig;
use crate::models::{Identity, IdentityStatus, LoginAttempt, PasswordResetToken, RefreshToken};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool sized from config.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        tracing::info!("Connecting to PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&config.url)
            .await?;

        tracing::info!("Successfully connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Apply the embedded `migrations/` directory.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(anyhow::anyhow!(err))
}

fn on_insert(err: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict(format!("{} already exists", what));
        }
    }
    backend(err)
}

fn require_row(rows_affected: u64) -> StoreResult<()> {
    if rows_affected == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn find_identity_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<Identity>> {
        sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn find_identity_by_id(&self, id: Uuid) -> StoreResult<Option<Identity>> {
        sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn create_identity(&self, identity: &Identity) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO identities
                (id, user_id, email, password_hash, first_name, last_name, status, email_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(identity.id)
        .bind(identity.user_id)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(identity.status.as_str())
        .bind(identity.email_verified)
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| on_insert(e, "identity"))?;
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: IdentityStatus) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE identities SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(status.as_str())
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(backend)?;
        require_row(result.rows_affected())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE identities SET password_hash = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        require_row(result.rows_affected())
    }

    async fn mark_email_verified(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE identities SET email_verified = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        require_row(result.rows_affected())
    }

    async fn delete_identity(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        require_row(result.rows_affected())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                backend(e)
            })?;
        Ok(())
    }
}

#[async_trait]
impl AttemptLedger for PgStore {
    async fn record_attempt(&self, attempt: &LoginAttempt) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO login_attempts (id, identity_id, email, ip_address, success, attempted_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.identity_id)
        .bind(&attempt.email)
        .bind(&attempt.ip_address)
        .bind(attempt.success)
        .bind(attempt.attempted_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn count_recent_failures(
        &self,
        identity_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM login_attempts
            WHERE identity_id = $1 AND success = FALSE AND attempted_at >= $2
            "#,
        )
        .bind(identity_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(count.max(0) as u64)
    }

    async fn list_recent_attempts(
        &self,
        identity_id: Uuid,
        limit: u32,
    ) -> StoreResult<Vec<LoginAttempt>> {
        sqlx::query_as::<_, LoginAttempt>(
            r#"
            SELECT * FROM login_attempts
            WHERE identity_id = $1
            ORDER BY attempted_at DESC
            LIMIT $2
            "#,
        )
        .bind(identity_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn create_refresh_token(&self, token: &RefreshToken) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens
                (id, identity_id, token_hash, device_info, ip_address, expires_at, created_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token.id)
        .bind(token.identity_id)
        .bind(&token.token_hash)
        .bind(&token.device_info)
        .bind(&token.ip_address)
        .bind(token.expires_at)
        .bind(token.created_at)
        .bind(token.revoked_at)
        .execute(&self.pool)
        .await
        .map_err(|e| on_insert(e, "refresh token"))?;
        Ok(())
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<RefreshToken>> {
        sqlx::query_as::<_, RefreshToken>("SELECT * FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn list_active_refresh_tokens_for(
        &self,
        identity_id: Uuid,
    ) -> StoreResult<Vec<RefreshToken>> {
        sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT * FROM refresh_tokens
            WHERE identity_id = $1 AND revoked_at IS NULL AND expires_at > NOW()
            ORDER BY created_at DESC
            "#,
        )
        .bind(identity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }

    async fn revoke_refresh_token(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = COALESCE(revoked_at, NOW()) WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        require_row(result.rows_affected())
    }

    async fn revoke_all_refresh_tokens_for(&self, identity_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE identity_id = $1 AND revoked_at IS NULL",
        )
        .bind(identity_id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected())
    }

    async fn delete_expired_refresh_tokens(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ResetTokenStore for PgStore {
    async fn create_reset_token(&self, token: &PasswordResetToken) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (id, identity_id, token_hash, expires_at, used_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token.id)
        .bind(token.identity_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.used_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| on_insert(e, "reset token"))?;
        Ok(())
    }

    async fn find_reset_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<PasswordResetToken>> {
        sqlx::query_as::<_, PasswordResetToken>(
            "SELECT * FROM password_reset_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)
    }

    async fn consume_reset_token(&self, id: Uuid, new_password_hash: &str) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // The row lock taken here serialises concurrent redemptions of one token.
        let owner: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE password_reset_tokens
            SET used_at = NOW()
            WHERE id = $1 AND used_at IS NULL AND expires_at > NOW()
            RETURNING identity_id
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        let Some(identity_id) = owner else {
            tx.rollback().await.map_err(backend)?;
            return Ok(false);
        };

        let updated = sqlx::query(
            "UPDATE identities SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(identity_id)
        .bind(new_password_hash)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(backend)?;
            return Ok(false);
        }

        tx.commit().await.map_err(backend)?;
        Ok(true)
    }

    async fn delete_expired_reset_tokens(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected())
    }
}
