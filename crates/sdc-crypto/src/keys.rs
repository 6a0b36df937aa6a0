//! Ed25519 keypairs and key hashing.
//!
//! Every container gets a fresh keypair. The private key signs the container
//! and doubles as key-derivation input for the private-key slot; it is handed
//! to the caller once and never stored. Containers keep only
//! [`hash_key`] of it for comparison.
//!
//! # Security
//!
//! - Private keys are zeroized on drop
//! - Key generation reads the OS RNG directly and reports failure

use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cipher::try_generate_random;
use crate::error::{CryptoError, CryptoResult};
use crate::format::{base64_decode_array, base64_encode};

/// Ed25519 public (verifying) key, 32 bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Create a public key from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes of the public key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse from standard base64.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        base64_decode_array(encoded.trim())
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Encode as standard base64.
    pub fn to_base64(&self) -> String {
        base64_encode(&self.0)
    }

    /// Convert to the ed25519-dalek verifying key, rejecting invalid points.
    pub(crate) fn to_verifying_key(&self) -> CryptoResult<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0).map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0[..8]))
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

/// Ed25519 private key seed (32 bytes) with automatic zeroization.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; 32]);

impl PrivateKey {
    /// Create a private key from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes of the private key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse from standard base64 (surrounding whitespace ignored).
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        base64_decode_array(encoded.trim())
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Encode as standard base64 for one-time display to the owner.
    pub fn to_base64(&self) -> String {
        base64_encode(&self.0)
    }

    pub(crate) fn to_signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.0)
    }

    /// Derive the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.to_signing_key().verifying_key().to_bytes())
    }
}

impl Clone for PrivateKey {
    fn clone(&self) -> Self {
        Self(self.0)
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Ed25519 keypair.
pub struct Keypair {
    /// The public key (stored in the container).
    pub public: PublicKey,
    /// The private key (returned to the caller once).
    pub private: PrivateKey,
}

impl Keypair {
    /// Generate a new random keypair.
    ///
    /// Fails with [`CryptoError::KeyGeneration`] if the OS RNG is unavailable.
    pub fn generate() -> CryptoResult<Self> {
        let mut seed: [u8; 32] = try_generate_random()?;
        let private = PrivateKey(seed);
        seed.zeroize();

        Ok(Self::from_private(private))
    }

    /// Create a keypair from an existing private key.
    pub fn from_private(private: PrivateKey) -> Self {
        let public = private.public_key();
        Self { public, private }
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public)
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// One-way SHA-256 hash of key material.
pub fn hash_key(key: &[u8]) -> [u8; 32] {
    Sha256::digest(key).into()
}

/// Check `key` against a stored [`hash_key`] digest in constant time.
pub fn hash_key_matches(key: &[u8], expected: &[u8]) -> bool {
    hash_key(key).as_slice().ct_eq(expected).into()
}

/// Public key file format (plaintext JSON).
#[derive(Serialize, Deserialize)]
struct PublicKeyFile {
    version: u8,
    public_key: PublicKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

/// Save a public key to a file (plaintext JSON).
pub fn save_public_key(key: &PublicKey, path: &Path, label: Option<&str>) -> CryptoResult<()> {
    let file = PublicKeyFile {
        version: 1,
        public_key: key.clone(),
        label: label.map(String::from),
    };
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a public key from a file.
///
/// Accepts both the JSON format written by [`save_public_key`] and a bare
/// base64 key.
pub fn load_public_key(path: &Path) -> CryptoResult<PublicKey> {
    let contents = std::fs::read_to_string(path)?;

    if let Ok(file) = serde_json::from_str::<PublicKeyFile>(&contents) {
        return Ok(file.public_key);
    }

    let cleaned: String = contents.chars().filter(|c| !c.is_whitespace()).collect();
    PublicKey::from_base64(&cleaned).map_err(|e| CryptoError::MalformedKeyFile(e.to_string()))
}
