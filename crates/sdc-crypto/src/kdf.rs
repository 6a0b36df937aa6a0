//! Symmetric key derivation.
//!
//! Two derivation functions live here:
//!
//! - [`derive_symmetric_key`]: PBKDF2-HMAC-SHA256 over a password or private
//!   key. The round count is stored with every container so the default can
//!   move without stranding older containers.
//! - [`derive_storage_key`]: Argon2id, used only to protect private key files
//!   at rest (see [`crate::key_storage`]).

use argon2::{Algorithm, Argon2, Params, Version};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cipher::try_generate_random;
use crate::error::{CryptoError, CryptoResult};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Default PBKDF2 iteration count for new containers.
pub const DEFAULT_KDF_ROUNDS: u32 = 100_000;

/// Lowest PBKDF2 iteration count accepted for derivation.
pub const MIN_KDF_ROUNDS: u32 = 1_000;

/// Length of PBKDF2 salts in bytes.
pub const SALT_LEN: usize = 32;

/// Argon2id parameters for key file protection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory in KiB (default: 65536 = 64 MiB).
    pub memory_kib: u32,
    /// Time iterations (default: 3).
    pub iterations: u32,
    /// Parallelism degree (default: 4).
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MiB
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Create low-memory parameters (for resource-constrained environments).
    pub fn low_memory() -> Self {
        Self {
            memory_kib: 32768, // 32 MiB
            iterations: 4,
            parallelism: 4,
        }
    }
}

/// 256-bit symmetric key with automatic zeroization on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    key: [u8; 32],
}

impl SymmetricKey {
    /// Create a key from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { key: bytes }
    }

    /// Generate a random data key from the OS RNG.
    pub fn generate() -> CryptoResult<Self> {
        Ok(Self {
            key: try_generate_random()?,
        })
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive a 256-bit key from secret material with PBKDF2-HMAC-SHA256.
///
/// Deterministic: the same secret, salt and round count always yield the
/// same key.
pub fn derive_symmetric_key(
    secret: &[u8],
    rounds: u32,
    salt: &[u8; SALT_LEN],
) -> CryptoResult<SymmetricKey> {
    if secret.is_empty() {
        return Err(CryptoError::KeyDerivation(
            "Secret material must not be empty".to_string(),
        ));
    }
    if rounds < MIN_KDF_ROUNDS {
        return Err(CryptoError::KeyDerivation(format!(
            "At least {} rounds required, got {}",
            MIN_KDF_ROUNDS, rounds
        )));
    }

    let mut key = [0u8; 32];
    pbkdf2::<Hmac<Sha256>>(secret, salt, rounds, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(SymmetricKey { key })
}

/// Derive a 256-bit key from a passphrase using Argon2id.
pub fn derive_storage_key(
    passphrase: &[u8],
    salt: &[u8; SALT_LEN],
    params: &KdfParams,
) -> CryptoResult<SymmetricKey> {
    if passphrase.len() < MIN_PASSWORD_LENGTH {
        return Err(CryptoError::PasswordTooShort(MIN_PASSWORD_LENGTH));
    }

    let argon2_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(passphrase, salt, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(SymmetricKey { key })
}

/// Validate password strength.
pub fn validate_password(password: &str) -> CryptoResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CryptoError::PasswordTooShort(MIN_PASSWORD_LENGTH));
    }
    Ok(())
}
