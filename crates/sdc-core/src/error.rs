//! Error types for container operations.
//!
//! Every failure a caller can observe maps to one stable kind here. Crypto
//! primitive failures are folded in via `From<CryptoError>` so platform or
//! library error types never leak past this crate.

use chrono::{DateTime, Utc};
use sdc_crypto::CryptoError;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias using the container Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Why the access policy refused a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenial {
    /// `expires_at` has passed.
    Expired { expires_at: DateTime<Utc> },
    /// `view_count` reached `max_views`.
    ViewLimitReached { max_views: u32, view_count: u32 },
}

impl std::fmt::Display for AccessDenial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessDenial::Expired { expires_at } => {
                write!(f, "container expired at {}", expires_at.to_rfc3339())
            }
            AccessDenial::ViewLimitReached { max_views, .. } => {
                write!(f, "view limit of {} reached", max_views)
            }
        }
    }
}

/// Core error type for container operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Platform RNG or key primitives unavailable.
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// Symmetric key derivation failed.
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    /// Encryption failed.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Wrong key, wrong password, or corrupted ciphertext.
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Signature does not cover the current payload and metadata.
    #[error("Signature invalid: container payload or metadata was modified")]
    SignatureInvalid,

    /// Expiry or view-count restriction violated.
    #[error("Access denied: {0}")]
    AccessDenied(AccessDenial),

    /// Malformed container framing, magic bytes or structure.
    #[error("Format error: {0}")]
    Format(String),

    /// Credentials missing or not applicable to this container.
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    /// Recovered plaintext does not match the recorded checksum.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Container not found in the store.
    #[error("Container not found: {0}")]
    NotFound(Uuid),

    /// Concurrent modification detected (lost view-count update).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage backend failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short stable name of the error kind, for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::KeyGeneration(_) => "key_generation",
            Error::KeyDerivation(_) => "key_derivation",
            Error::Encryption(_) => "encryption",
            Error::Decryption(_) => "decryption",
            Error::SignatureInvalid => "signature_invalid",
            Error::AccessDenied(_) => "access_denied",
            Error::Format(_) => "format",
            Error::AuthenticationRequired(_) => "authentication_required",
            Error::ChecksumMismatch { .. } => "checksum_mismatch",
            Error::InvalidInput(_) => "invalid_input",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::Config(_) => "config",
            Error::Storage(_) => "storage",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
        }
    }
}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::KeyGeneration(msg) => Error::KeyGeneration(msg),
            CryptoError::KeyDerivation(msg) => Error::KeyDerivation(msg),
            CryptoError::Encryption(msg) => Error::Encryption(msg),
            CryptoError::Decryption(msg) => Error::Decryption(msg),
            CryptoError::InvalidKey(msg) => Error::InvalidInput(format!("Invalid key: {}", msg)),
            CryptoError::PasswordTooShort(min) => Error::InvalidInput(format!(
                "Password too short (minimum {} characters required)",
                min
            )),
            CryptoError::NotAKeyFile
            | CryptoError::UnsupportedKeyFileVersion(_)
            | CryptoError::MalformedKeyFile(_)
            | CryptoError::Encoding(_) => Error::Format(e.to_string()),
            CryptoError::Io(io) => Error::Io(io),
            CryptoError::Json(json) => Error::Serialization(json.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
