//! Errors raised by the key, cipher and key-file primitives.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    /// The platform RNG or key primitives could not produce a key.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Wrong key, truncated input or a failed GCM tag.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Key material has the wrong length or is not a valid curve point.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Password too short (minimum {0} characters required)")]
    PasswordTooShort(usize),

    /// Bad base64 or a byte field of the wrong length.
    #[error("Malformed encoding: {0}")]
    Encoding(String),

    /// File does not start with the `SDCKEY01` magic.
    #[error("Not an SDC key file")]
    NotAKeyFile,

    #[error("Unsupported key file version: {0}")]
    UnsupportedKeyFileVersion(u32),

    /// Header or body of a key file could not be parsed.
    #[error("Malformed key file: {0}")]
    MalformedKeyFile(String),

    #[error("Key file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Key file JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
