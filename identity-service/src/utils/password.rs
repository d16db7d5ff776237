use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Argon2,
};

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Newtype for password hash
#[derive(Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Debug for PasswordHashString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordHashString(***)")
    }
}

/// Hash a password using Argon2
///
/// Uses Argon2id variant with secure default parameters.
/// Salt is automatically generated and included in the hash.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, anyhow::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

/// Verify a password against a hash using constant-time comparison
///
/// Returns Ok(false) on mismatch; Err only when the stored hash is malformed.
pub fn verify_password(
    password: &Password,
    password_hash: &PasswordHashString,
) -> Result<bool, anyhow::Error> {
    let parsed_hash = PasswordHash::new(password_hash.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

    match Argon2::default().verify_password(password.as_str().as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e)),
    }
}

/// Async front for Argon2 that keeps hashing off the runtime worker threads.
///
/// Holds a hash of a throwaway password so that a login for an unknown email
/// pays the same verification cost as a wrong password.
#[derive(Clone)]
pub struct PasswordHasher {
    dummy_hash: PasswordHashString,
}

impl PasswordHasher {
    pub fn new() -> Result<Self, anyhow::Error> {
        let dummy = Password::new(uuid::Uuid::new_v4().to_string());
        Ok(Self {
            dummy_hash: hash_password(&dummy)?,
        })
    }

    pub async fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error> {
        let password = password.clone();
        tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))?
    }

    pub async fn verify(
        &self,
        password: &Password,
        password_hash: &PasswordHashString,
    ) -> Result<bool, anyhow::Error> {
        let password = password.clone();
        let password_hash = password_hash.clone();
        tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
            .await
            .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))?
    }

    /// Burn one verification against the dummy hash. Always reports a mismatch.
    pub async fn verify_dummy(&self, password: &Password) {
        if let Err(e) = self.verify(password, &self.dummy_hash).await {
            tracing::warn!(error = %e, "Dummy password verification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash = hash_password(&password).expect("Failed to hash password");

        assert!(!hash.as_str().is_empty());
        assert!(hash.as_str().starts_with("$argon2"));
    }

    #[test]
    fn test_verify_password_correct() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash = hash_password(&password).expect("Failed to hash password");

        assert!(verify_password(&password, &hash).unwrap());
    }

    #[test]
    fn test_verify_password_incorrect() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash = hash_password(&password).expect("Failed to hash password");

        let wrong_password = Password::new("wrongPassword".to_string());
        assert!(!verify_password(&wrong_password, &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash = PasswordHashString::new("not-a-phc-string".to_string());
        assert!(verify_password(&password, &hash).is_err());
    }

    #[test]
    fn test_different_hashes_for_same_password() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash1 = hash_password(&password).expect("Failed to hash password");
        let hash2 = hash_password(&password).expect("Failed to hash password");

        assert_ne!(hash1.as_str(), hash2.as_str());
    }

    #[test]
    fn debug_output_is_redacted() {
        let password = Password::new("hunter2".to_string());
        assert!(!format!("{:?}", password).contains("hunter2"));
    }

    #[tokio::test]
    async fn hasher_round_trip_on_blocking_pool() {
        let hasher = PasswordHasher::new().unwrap();
        let password = Password::new("correct horse".to_string());
        let hash = hasher.hash(&password).await.unwrap();

        assert!(hasher.verify(&password, &hash).await.unwrap());
        assert!(!hasher
            .verify(&Password::new("battery staple".to_string()), &hash)
            .await
            .unwrap());
    }
}
