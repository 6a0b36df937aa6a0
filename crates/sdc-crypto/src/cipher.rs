//! AES-256-GCM cipher operations and integrity checksums.
//!
//! [`encrypt`] produces self-contained ciphertext:
//!
//! ```text
//! ┌──────────────┬──────────────────────────┬───────────────┐
//! │ Nonce (12 B) │ Ciphertext (len of input) │ GCM tag (16 B)│
//! └──────────────┴──────────────────────────┴───────────────┘
//! ```
//!
//! so a holder of the key needs nothing else to decrypt.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::SymmetricKey;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Generate cryptographically secure random bytes.
pub fn generate_random<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Generate random bytes straight from the OS, surfacing RNG failure.
///
/// Used for long-lived key material where a silent panic inside the
/// thread-local generator is not acceptable.
pub fn try_generate_random<const N: usize>() -> CryptoResult<[u8; N]> {
    let mut bytes = [0u8; N];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    Ok(bytes)
}

/// Generate a random salt (32 bytes).
pub fn generate_salt() -> [u8; 32] {
    generate_random()
}

/// Generate a random nonce (12 bytes).
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    generate_random()
}

/// Encrypt plaintext with AES-256-GCM under an explicit nonce.
///
/// Returns ciphertext with appended authentication tag (16 bytes).
pub fn aes_gcm_encrypt(
    key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::Encryption(e.to_string()))?;

    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::Encryption("AES-GCM encryption failed".into()))
}

/// Decrypt ciphertext with AES-256-GCM under an explicit nonce.
///
/// The ciphertext must include the authentication tag (16 bytes) at the end.
pub fn aes_gcm_decrypt(
    key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| CryptoError::Decryption("Invalid key".to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Decryption("AES-GCM authentication failed".to_string()))
}

/// Encrypt with a fresh random nonce and prepend it to the output.
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
    let nonce = generate_nonce();
    let ciphertext = aes_gcm_encrypt(key.as_bytes(), &nonce, plaintext)?;

    let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypt output of [`encrypt`].
///
/// Fails with [`CryptoError::Decryption`] when the input is shorter than a
/// nonce plus tag, the key is wrong, or any byte was altered.
pub fn decrypt(data: &[u8], key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
    if data.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Decryption(format!(
            "Ciphertext too short: {} bytes",
            data.len()
        )));
    }

    let (nonce, ciphertext) = data.split_at(NONCE_LEN);
    let nonce: &[u8; NONCE_LEN] = nonce
        .try_into()
        .map_err(|_| CryptoError::Decryption("Invalid nonce".to_string()))?;

    aes_gcm_decrypt(key.as_bytes(), nonce, ciphertext)
}

/// SHA-256 of raw bytes as lowercase hex.
pub fn checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
