//! Centralized default constants for secure document containers.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates and the CLI reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// FORMAT
// =============================================================================

/// Metadata format version written into new containers.
pub const FORMAT_VERSION: &str = "1.0";

/// Extension given to container names (`report.pdf` -> `report.sdc`).
pub const CONTAINER_EXTENSION: &str = "sdc";

/// Recorded as `original_format` when the filename has no extension.
pub const UNKNOWN_FORMAT: &str = "bin";

/// Largest plaintext accepted by `create_container` (64 MiB).
pub const MAX_PLAINTEXT_BYTES: usize = 64 * 1024 * 1024;

/// Largest exported container accepted by import. The byte-array encoding
/// costs up to four characters per payload byte.
pub const MAX_ENCODED_BYTES: usize = 5 * MAX_PLAINTEXT_BYTES;

// =============================================================================
// KEY DERIVATION
// =============================================================================

/// PBKDF2 rounds for new containers.
pub const KDF_ROUNDS: u32 = sdc_crypto::DEFAULT_KDF_ROUNDS;

/// Lowest PBKDF2 round count a container may be created with.
pub const MIN_KDF_ROUNDS: u32 = sdc_crypto::MIN_KDF_ROUNDS;

// =============================================================================
// COMPRESSION
// =============================================================================

/// Compression level recorded when the caller does not pick one.
pub const COMPRESSION_LEVEL: u8 = 6;

/// Highest accepted compression level.
pub const MAX_COMPRESSION_LEVEL: u8 = 9;

// =============================================================================
// SHARING / STORAGE / EVENTS
// =============================================================================

/// Scheme prefix of share locators (`sdc:<id>:<fingerprint>`).
pub const SHARE_SCHEME: &str = "sdc";

/// Default directory for the file-backed container store.
pub const STORE_DIR: &str = "./sdc-store";

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;
