//! Passphrase-protected storage for container private keys.
//!
//! A container's private key is surfaced exactly once, at creation. Callers
//! that want to keep it can seal it into a key file with Argon2id +
//! AES-256-GCM.
//!
//! # Format: SDCKEY01
//!
//! ```text
//! +------------------+
//! | Magic: SDCKEY01  | 8 bytes
//! +------------------+
//! | Header Length    | 4 bytes (little-endian)
//! +------------------+
//! | Header (JSON)    | Variable
//! +------------------+
//! | Encrypted Key    | 48 bytes (32-byte key + 16-byte auth tag)
//! +------------------+
//! ```
//!
//! The header carries the public key so a loaded private key can be checked
//! against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cipher::{aes_gcm_decrypt, aes_gcm_encrypt, generate_nonce, generate_salt, TAG_LEN};
use crate::error::{CryptoError, CryptoResult};
use crate::format::{base64_array, base64_decode_array};
use crate::kdf::{derive_storage_key, KdfParams, SALT_LEN};
use crate::keys::{PrivateKey, PublicKey};

/// Magic bytes for the key file format.
pub const MAGIC_KEYFILE: &[u8; 8] = b"SDCKEY01";

/// Current key file version.
pub const KEYFILE_VERSION: u32 = 1;

const PREFIX_LEN: usize = MAGIC_KEYFILE.len() + 4;
const SEALED_KEY_LEN: usize = 32 + TAG_LEN;

/// Header for sealed private key files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFileHeader {
    /// Format version.
    pub version: u32,
    /// KDF algorithm (always "argon2id").
    pub kdf: String,
    /// KDF parameters.
    pub kdf_params: KdfParams,
    /// Salt for key derivation.
    #[serde(with = "base64_array")]
    pub salt: [u8; SALT_LEN],
    /// Nonce for encryption (base64).
    pub nonce: String,
    /// Public half of the sealed key.
    pub public_key: PublicKey,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Seal a private key under a passphrase.
pub fn seal_private_key(
    key: &PrivateKey,
    passphrase: &str,
    params: &KdfParams,
) -> CryptoResult<Vec<u8>> {
    let salt = generate_salt();
    let nonce = generate_nonce();

    let storage_key = derive_storage_key(passphrase.as_bytes(), &salt, params)?;
    let ciphertext = aes_gcm_encrypt(storage_key.as_bytes(), &nonce, key.as_bytes())?;

    let header = KeyFileHeader {
        version: KEYFILE_VERSION,
        kdf: "argon2id".to_string(),
        kdf_params: params.clone(),
        salt,
        nonce: crate::format::base64_encode(&nonce),
        public_key: key.public_key(),
        created_at: Utc::now(),
    };

    let header_json = serde_json::to_vec(&header)?;
    let header_len = (header_json.len() as u32).to_le_bytes();

    let mut output = Vec::with_capacity(PREFIX_LEN + header_json.len() + ciphertext.len());
    output.extend_from_slice(MAGIC_KEYFILE);
    output.extend_from_slice(&header_len);
    output.extend_from_slice(&header_json);
    output.extend_from_slice(&ciphertext);

    Ok(output)
}

/// Split a sealed key file into header and ciphertext without decrypting.
pub fn parse_key_file(sealed: &[u8]) -> CryptoResult<(KeyFileHeader, &[u8])> {
    if sealed.len() < PREFIX_LEN {
        return Err(CryptoError::MalformedKeyFile("File too short".to_string()));
    }
    if &sealed[..MAGIC_KEYFILE.len()] != MAGIC_KEYFILE {
        return Err(CryptoError::NotAKeyFile);
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&sealed[MAGIC_KEYFILE.len()..PREFIX_LEN]);
    let header_len = u32::from_le_bytes(len_bytes) as usize;

    let header_end = PREFIX_LEN
        .checked_add(header_len)
        .ok_or_else(|| CryptoError::MalformedKeyFile("Header length overflow".to_string()))?;
    if sealed.len() != header_end + SEALED_KEY_LEN {
        return Err(CryptoError::MalformedKeyFile(format!(
            "Expected {} bytes, got {}",
            header_end + SEALED_KEY_LEN,
            sealed.len()
        )));
    }

    let header: KeyFileHeader = serde_json::from_slice(&sealed[PREFIX_LEN..header_end])
        .map_err(|e| CryptoError::MalformedKeyFile(format!("Invalid header: {}", e)))?;

    if header.version != KEYFILE_VERSION {
        return Err(CryptoError::UnsupportedKeyFileVersion(header.version));
    }

    Ok((header, &sealed[header_end..]))
}

/// Open a sealed private key.
///
/// Fails with [`CryptoError::Decryption`] on a wrong passphrase and with
/// [`CryptoError::MalformedKeyFile`] if the recovered key does not match the
/// public key recorded in the header.
pub fn open_private_key(sealed: &[u8], passphrase: &str) -> CryptoResult<PrivateKey> {
    let (header, ciphertext) = parse_key_file(sealed)?;
    let nonce = base64_decode_array(&header.nonce)?;

    let storage_key = derive_storage_key(passphrase.as_bytes(), &header.salt, &header.kdf_params)?;
    let decrypted = aes_gcm_decrypt(storage_key.as_bytes(), &nonce, ciphertext)?;

    let bytes: [u8; 32] = decrypted.try_into().map_err(|v: Vec<u8>| {
        CryptoError::MalformedKeyFile(format!("Invalid key length: {}", v.len()))
    })?;
    let key = PrivateKey::from_bytes(bytes);

    if key.public_key() != header.public_key {
        return Err(CryptoError::MalformedKeyFile(
            "Private key does not match recorded public key".to_string(),
        ));
    }

    Ok(key)
}

/// Seal a private key and write it to `path`.
pub fn save_private_key(
    key: &PrivateKey,
    path: &Path,
    passphrase: &str,
    params: &KdfParams,
) -> CryptoResult<()> {
    let sealed = seal_private_key(key, passphrase, params)?;
    std::fs::write(path, sealed)?;
    Ok(())
}

/// Read and open a sealed private key file.
pub fn load_private_key(path: &Path, passphrase: &str) -> CryptoResult<PrivateKey> {
    let sealed = std::fs::read(path)?;
    open_private_key(&sealed, passphrase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Keypair;
    use tempfile::tempdir;

    fn fast_params() -> KdfParams {
        KdfParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let kp = Keypair::generate().unwrap();
        let sealed = seal_private_key(&kp.private, "secure-passphrase-123", &fast_params()).unwrap();

        assert!(sealed.starts_with(MAGIC_KEYFILE));

        let opened = open_private_key(&sealed, "secure-passphrase-123").unwrap();
        assert_eq!(opened.as_bytes(), kp.private.as_bytes());
    }

    #[test]
    fn test_open_wrong_passphrase() {
        let kp = Keypair::generate().unwrap();
        let sealed = seal_private_key(&kp.private, "correct-passphrase", &fast_params()).unwrap();

        let result = open_private_key(&sealed, "wrong-passphrase!!");
        assert!(matches!(result, Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn test_header_records_public_key() {
        let kp = Keypair::generate().unwrap();
        let sealed = seal_private_key(&kp.private, "secure-passphrase-123", &fast_params()).unwrap();

        let (header, ciphertext) = parse_key_file(&sealed).unwrap();
        assert_eq!(header.public_key, kp.public);
        assert_eq!(header.kdf, "argon2id");
        assert_eq!(ciphertext.len(), SEALED_KEY_LEN);
    }

    #[test]
    fn test_low_memory_params_recorded_and_used() {
        let kp = Keypair::generate().unwrap();
        let params = KdfParams::low_memory();
        let sealed = seal_private_key(&kp.private, "secure-passphrase-123", &params).unwrap();

        let (header, _) = parse_key_file(&sealed).unwrap();
        assert_eq!(header.kdf_params, params);
        assert_eq!(header.kdf_params.memory_kib, 32768);

        let opened = open_private_key(&sealed, "secure-passphrase-123").unwrap();
        assert_eq!(opened.as_bytes(), kp.private.as_bytes());
    }

    #[test]
    fn test_open_rejects_bad_magic() {
        let result = open_private_key(b"NOTAKEY!\x00\x00\x00\x00", "whatever-passphrase");
        assert!(matches!(result, Err(CryptoError::NotAKeyFile)));
    }

    #[test]
    fn test_open_rejects_truncated() {
        let kp = Keypair::generate().unwrap();
        let sealed = seal_private_key(&kp.private, "secure-passphrase-123", &fast_params()).unwrap();

        let result = open_private_key(&sealed[..sealed.len() - 1], "secure-passphrase-123");
        assert!(matches!(result, Err(CryptoError::MalformedKeyFile(_))));
    }

    #[test]
    fn test_seal_rejects_short_passphrase() {
        let kp = Keypair::generate().unwrap();
        let result = seal_private_key(&kp.private, "short", &fast_params());
        assert!(matches!(result, Err(CryptoError::PasswordTooShort(_))));
    }

    #[test]
    fn test_save_load_private_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("container.key");

        let kp = Keypair::generate().unwrap();
        save_private_key(&kp.private, &path, "secure-passphrase-123", &fast_params()).unwrap();

        let loaded = load_private_key(&path, "secure-passphrase-123").unwrap();
        assert_eq!(loaded.as_bytes(), kp.private.as_bytes());
    }
}
