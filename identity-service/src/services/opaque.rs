//! Opaque bearer secrets for refresh and reset tokens.
//!
//! The plaintext is handed to the client once; storage only ever sees
//! [`hash_token`] of it.

use rand::RngCore;
use sha2::{Digest, Sha256};

const SECRET_BYTES: usize = 32;

pub struct OpaqueToken;

impl OpaqueToken {
    /// 32 bytes from the OS CSPRNG, hex encoded (64 chars).
    pub fn generate() -> String {
        let mut bytes = [0u8; SECRET_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

/// SHA-256 hex digest used as the lookup key for a stored token
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
