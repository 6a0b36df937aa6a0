//! Container data model.
//!
//! [`SdcFile`] is the persisted container. Its [`Metadata`] travels inside
//! the signature, so everything here that serializes must serialize the same
//! way on every platform: maps are ordered, numbers are finite, and optional
//! fields are omitted rather than written as `null`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sdc_crypto::format::{base64_array, base64_vec};
use sdc_crypto::{PrivateKey, PublicKey, SIGNATURE_LEN};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// CONTAINER
// =============================================================================

/// A secure document container.
#[derive(Clone, PartialEq)]
pub struct SdcFile {
    /// Immutable identifier (UUIDv7).
    pub id: Uuid,
    /// Original filename with the extension replaced by `.sdc`.
    pub name: String,
    /// Lowercase extension of the original file.
    pub original_format: String,
    /// `nonce ‖ ciphertext ‖ tag`, or the raw payload when unencrypted.
    pub encrypted_data: Vec<u8>,
    /// Ed25519 verifying key.
    pub public_key: PublicKey,
    /// SHA-256 of the private key. The key itself is never stored.
    pub private_key_hash: [u8; 32],
    pub metadata: Metadata,
    /// Ed25519 signature over the payload and canonical metadata.
    pub signature: [u8; SIGNATURE_LEN],
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl SdcFile {
    /// Stored payload size in bytes.
    pub fn data_size(&self) -> usize {
        self.encrypted_data.len()
    }

    /// Whether the payload is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.metadata.security.encrypted
    }

    /// Views left before the container is exhausted, if a limit is set.
    pub fn views_remaining(&self) -> Option<u32> {
        self.metadata.access.views_remaining()
    }
}

impl std::fmt::Debug for SdcFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdcFile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("original_format", &self.original_format)
            .field("data_size", &self.encrypted_data.len())
            .field("public_key", &self.public_key)
            .field("metadata", &self.metadata)
            .field("created_at", &self.created_at)
            .field("last_modified", &self.last_modified)
            .finish_non_exhaustive()
    }
}

/// Container name for an original filename: extension swapped for `.sdc`.
///
/// Returns `(name, original_format)`.
pub fn container_name(filename: &str) -> (String, String) {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("document");

    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (
            format!("{}.{}", stem, defaults::CONTAINER_EXTENSION),
            ext.to_ascii_lowercase(),
        ),
        _ => (
            format!("{}.{}", base, defaults::CONTAINER_EXTENSION),
            defaults::UNKNOWN_FORMAT.to_string(),
        ),
    }
}

// =============================================================================
// METADATA
// =============================================================================

/// Descriptive, security and access metadata. Covered by the signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub format_version: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_properties: BTreeMap<String, PropertyValue>,
    pub security: SecurityInfo,
    pub access: AccessRestrictions,
}

/// Closed set of custom property value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    String(String),
    /// Must be finite.
    Number(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl PropertyValue {
    /// Reject values without a stable canonical encoding.
    pub fn validate(&self) -> Result<()> {
        match self {
            PropertyValue::Number(n) if !n.is_finite() => Err(Error::InvalidInput(format!(
                "Custom property number must be finite, got {}",
                n
            ))),
            _ => Ok(()),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        PropertyValue::Timestamp(value)
    }
}

/// Algorithms and key material used to protect the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityInfo {
    pub encrypted: bool,
    pub compression_algorithm: CompressionAlgorithm,
    pub compression_level: u8,
    pub encryption_algorithm: EncryptionAlgorithm,
    pub key_derivation: KeyDerivationAlgorithm,
    pub key_derivation_rounds: u32,
    /// Hex SHA-256 of the original plaintext.
    pub checksum: String,
    /// Data key wrapped once per accepted credential.
    #[serde(default)]
    pub key_slots: Vec<KeySlot>,
}

impl SecurityInfo {
    /// Find the slot for a credential kind.
    pub fn key_slot(&self, kind: KeySlotKind) -> Option<&KeySlot> {
        self.key_slots.iter().find(|slot| slot.kind == kind)
    }
}

/// Payload compression. Only the identity transform is defined; recording it
/// lets a real codec be introduced without breaking existing containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionAlgorithm {
    #[serde(rename = "none")]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyDerivationAlgorithm {
    #[serde(rename = "PBKDF2-HMAC-SHA256")]
    Pbkdf2HmacSha256,
}

/// Which credential unlocks a key slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeySlotKind {
    PrivateKey,
    Password,
}

impl KeySlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySlotKind::PrivateKey => "private_key",
            KeySlotKind::Password => "password",
        }
    }
}

/// The data key encrypted under a key derived from one credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySlot {
    pub kind: KeySlotKind,
    /// Random per-slot PBKDF2 salt.
    #[serde(with = "base64_array")]
    pub salt: [u8; 32],
    /// `nonce ‖ encrypted data key ‖ tag`.
    #[serde(with = "base64_vec")]
    pub wrapped_key: Vec<u8>,
}

/// Expiry and view-count restrictions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRestrictions {
    /// Reads must present a credential. On a signed-only container only the
    /// owner's private key is accepted.
    pub requires_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_views: Option<u32>,
    /// Successful reads so far. The only field that changes after creation.
    #[serde(default)]
    pub view_count: u32,
}

impl AccessRestrictions {
    /// Whether neither an expiry nor a view limit is set.
    pub fn is_unrestricted(&self) -> bool {
        self.expires_at.is_none() && self.max_views.is_none()
    }

    /// Views left before exhaustion, if a limit is set.
    pub fn views_remaining(&self) -> Option<u32> {
        self.max_views
            .map(|max| max.saturating_sub(self.view_count))
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Caller-supplied descriptive metadata for a new container.
#[derive(Debug, Clone, Default)]
pub struct MetadataFields {
    /// Defaults to the original filename when empty.
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub custom_properties: BTreeMap<String, PropertyValue>,
}

/// Options for `create_container`.
#[derive(Clone)]
pub struct CreateOptions {
    /// 0-9; recorded in the metadata.
    pub compression_level: u8,
    pub encryption_enabled: bool,
    /// PBKDF2 rounds; `None` uses the configured default.
    pub key_derivation_rounds: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_views: Option<u32>,
    /// Add a password key slot. Requires `password`.
    pub requires_password: bool,
    pub password: Option<String>,
    /// Return a share locator alongside the container.
    pub generate_share_locator: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            compression_level: defaults::COMPRESSION_LEVEL,
            encryption_enabled: true,
            key_derivation_rounds: None,
            expires_at: None,
            max_views: None,
            requires_password: false,
            password: None,
            generate_share_locator: false,
        }
    }
}

impl std::fmt::Debug for CreateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateOptions")
            .field("compression_level", &self.compression_level)
            .field("encryption_enabled", &self.encryption_enabled)
            .field("key_derivation_rounds", &self.key_derivation_rounds)
            .field("expires_at", &self.expires_at)
            .field("max_views", &self.max_views)
            .field("requires_password", &self.requires_password)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("generate_share_locator", &self.generate_share_locator)
            .finish()
    }
}

/// Credentials presented to read a container.
#[derive(Clone, Default)]
pub enum Credentials {
    #[default]
    None,
    PrivateKey(PrivateKey),
    Password(String),
}

impl Credentials {
    /// Credential kind for logs (never the secret itself).
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::None => "none",
            Credentials::PrivateKey(_) => KeySlotKind::PrivateKey.as_str(),
            Credentials::Password(_) => KeySlotKind::Password.as_str(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::None => f.write_str("Credentials::None"),
            Credentials::PrivateKey(_) => f.write_str("Credentials::PrivateKey([REDACTED])"),
            Credentials::Password(_) => f.write_str("Credentials::Password([REDACTED])"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> Metadata {
        let mut custom_properties = BTreeMap::new();
        custom_properties.insert("pages".to_string(), PropertyValue::Number(12.0));
        custom_properties.insert("draft".to_string(), PropertyValue::Bool(false));

        Metadata {
            title: "Q3 Report".to_string(),
            description: None,
            author: Some("finance".to_string()),
            format_version: defaults::FORMAT_VERSION.to_string(),
            tags: vec!["finance".to_string(), "q3".to_string()],
            custom_properties,
            security: SecurityInfo {
                encrypted: true,
                compression_algorithm: CompressionAlgorithm::None,
                compression_level: 6,
                encryption_algorithm: EncryptionAlgorithm::Aes256Gcm,
                key_derivation: KeyDerivationAlgorithm::Pbkdf2HmacSha256,
                key_derivation_rounds: 100_000,
                checksum: "00".repeat(32),
                key_slots: vec![KeySlot {
                    kind: KeySlotKind::Password,
                    salt: [1u8; 32],
                    wrapped_key: vec![2u8; 60],
                }],
            },
            access: AccessRestrictions {
                requires_key: true,
                expires_at: None,
                max_views: Some(3),
                view_count: 1,
            },
        }
    }

    #[test]
    fn test_container_name_replaces_extension() {
        assert_eq!(
            container_name("Report.PDF"),
            ("Report.sdc".to_string(), "pdf".to_string())
        );
        assert_eq!(
            container_name("archive.tar.gz"),
            ("archive.tar.sdc".to_string(), "gz".to_string())
        );
    }

    #[test]
    fn test_container_name_without_extension() {
        assert_eq!(
            container_name("README"),
            ("README.sdc".to_string(), "bin".to_string())
        );
        assert_eq!(
            container_name(".bashrc"),
            (".bashrc.sdc".to_string(), "bin".to_string())
        );
    }

    #[test]
    fn test_container_name_strips_directories() {
        assert_eq!(container_name("/tmp/docs/plan.txt").0, "plan.sdc");
        assert_eq!(container_name("C:\\docs\\plan.txt").0, "plan.sdc");
        assert_eq!(container_name("").0, "document.sdc");
    }

    #[test]
    fn test_metadata_json_field_names() {
        let json = serde_json::to_string(&sample_metadata()).unwrap();

        assert!(json.contains("\"formatVersion\":\"1.0\""));
        assert!(json.contains("\"compressionAlgorithm\":\"none\""));
        assert!(json.contains("\"encryptionAlgorithm\":\"AES-256-GCM\""));
        assert!(json.contains("\"keyDerivation\":\"PBKDF2-HMAC-SHA256\""));
        assert!(json.contains("\"kind\":\"password\""));
        assert!(json.contains("\"viewCount\":1"));
        assert!(json.contains("\"pages\":{\"type\":\"number\",\"value\":12.0}"));
        assert!(!json.contains("description"));
        assert!(!json.contains("expiresAt"));
    }

    #[test]
    fn test_metadata_roundtrip() {
        let metadata = sample_metadata();
        let json = serde_json::to_vec(&metadata).unwrap();
        let parsed: Metadata = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed, metadata);
    }

    #[test]
    fn test_unknown_compression_rejected() {
        let json = serde_json::to_string(&sample_metadata())
            .unwrap()
            .replace("\"compressionAlgorithm\":\"none\"", "\"compressionAlgorithm\":\"zstd\"");
        assert!(serde_json::from_str::<Metadata>(&json).is_err());
    }

    #[test]
    fn test_property_value_validate() {
        assert!(PropertyValue::Number(1.5).validate().is_ok());
        assert!(PropertyValue::from("text").validate().is_ok());
        assert!(matches!(
            PropertyValue::Number(f64::NAN).validate(),
            Err(Error::InvalidInput(_))
        ));
        assert!(PropertyValue::Number(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_property_value_timestamp_roundtrip() {
        let value = PropertyValue::from(Utc::now());
        let json = serde_json::to_string(&value).unwrap();
        assert!(json.starts_with("{\"type\":\"timestamp\""));
        assert_eq!(serde_json::from_str::<PropertyValue>(&json).unwrap(), value);
    }

    #[test]
    fn test_views_remaining() {
        let mut access = AccessRestrictions {
            max_views: Some(2),
            ..Default::default()
        };
        assert_eq!(access.views_remaining(), Some(2));
        access.view_count = 2;
        assert_eq!(access.views_remaining(), Some(0));
        access.view_count = 5;
        assert_eq!(access.views_remaining(), Some(0));
        access.max_views = None;
        assert_eq!(access.views_remaining(), None);
        assert!(access.is_unrestricted());
    }

    #[test]
    fn test_key_slot_lookup() {
        let metadata = sample_metadata();
        assert!(metadata.security.key_slot(KeySlotKind::Password).is_some());
        assert!(metadata.security.key_slot(KeySlotKind::PrivateKey).is_none());
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let creds = Credentials::Password("correct-horse".to_string());
        let debug = format!("{:?}", creds);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("correct-horse"));
        assert_eq!(creds.kind(), "password");
    }

    #[test]
    fn test_create_options_debug_redacted() {
        let options = CreateOptions {
            password: Some("correct-horse".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", options);
        assert!(!debug.contains("correct-horse"));
        assert!(options.encryption_enabled);
    }
}
