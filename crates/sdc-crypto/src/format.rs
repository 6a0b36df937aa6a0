//! Shared encoding utilities.
//!
//! All binary key, salt and signature material leaves this crate as standard
//! (padded) base64. Checksums are lowercase hex.

use base64::Engine;

use crate::error::{CryptoError, CryptoResult};

/// Encode bytes as base64.
pub fn base64_encode(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Decode base64 string to bytes.
pub fn base64_decode(data: &str) -> CryptoResult<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| CryptoError::Encoding(format!("Invalid base64: {}", e)))
}

/// Decode base64 into a fixed-size array, rejecting any other length.
pub fn base64_decode_array<const N: usize>(data: &str) -> CryptoResult<[u8; N]> {
    let bytes = base64_decode(data)?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        CryptoError::Encoding(format!("Expected {} bytes, got {}", N, v.len()))
    })
}

/// Serde helper for base64-encoded fixed-size byte arrays.
///
/// ```rust
/// #[derive(serde::Serialize, serde::Deserialize)]
/// struct Slot {
///     #[serde(with = "sdc_crypto::format::base64_array")]
///     salt: [u8; 32],
/// }
/// ```
pub mod base64_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::base64_encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::base64_decode_array(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde helper for base64-encoded `Vec<u8>`.
pub mod base64_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::base64_encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::base64_decode(&s).map_err(serde::de::Error::custom)
    }
}
