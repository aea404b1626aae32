//! Opaque refresh token secrets.
//!
//! A secret is 32 bytes from the OS RNG, hex-encoded. Only its SHA-256
//! digest is stored; the plaintext goes to the client once and is never
//! persisted or logged.

use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::error::AuthError;

/// Raw entropy per secret, in bytes.
pub const SECRET_BYTES: usize = 32;

/// A newly generated refresh secret and its storage digest.
pub struct RefreshSecret {
    pub plaintext: String,
    pub digest: String,
}

impl RefreshSecret {
    pub fn generate() -> Result<Self, AuthError> {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| AuthError::Entropy(e.to_string()))?;

        let plaintext = hex::encode(bytes);
        let digest = digest(&plaintext);
        Ok(Self { plaintext, digest })
    }
}

impl std::fmt::Debug for RefreshSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshSecret")
            .field("plaintext", &"<redacted>")
            .field("digest", &self.digest)
            .finish()
    }
}

/// Storage lookup key for a presented secret.
pub fn digest(plaintext: &str) -> String {
    hex::encode(openssl::sha::sha256(plaintext.as_bytes()))
}
