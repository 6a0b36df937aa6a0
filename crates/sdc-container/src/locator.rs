//! Share locators for containers.
//!
//! A locator names a container and pins the public key it must be signed
//! with, so a recipient can reject a swapped container before reading it.
//!
//! # Format
//!
//! ```text
//! sdc:<fileId>:<fingerprint>
//!
//! - Prefix: "sdc:"
//! - fileId: hyphenated UUID
//! - Fingerprint: Base58(version || hash || checksum)
//!   - Version: 1 byte (0x01)
//!   - Hash: 20 bytes of BLAKE3(public_key)
//!   - Checksum: 4 bytes of BLAKE3(version || hash)
//! ```

use std::fmt;
use std::str::FromStr;

use sdc_core::defaults::SHARE_SCHEME;
use sdc_core::{Error, Result};
use sdc_crypto::PublicKey;
use uuid::Uuid;

/// Fingerprint version byte.
const FINGERPRINT_VERSION: u8 = 0x01;

/// Length of the hash portion (truncated BLAKE3).
const HASH_LENGTH: usize = 20;

/// Length of the checksum.
const CHECKSUM_LENGTH: usize = 4;

const PAYLOAD_LENGTH: usize = 1 + HASH_LENGTH + CHECKSUM_LENGTH;

/// Portable reference to a shared container.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ShareLocator {
    file_id: Uuid,
    hash: [u8; HASH_LENGTH],
}

impl ShareLocator {
    /// Build a locator for a container id and its public key.
    pub fn new(file_id: Uuid, public_key: &PublicKey) -> Self {
        Self {
            file_id,
            hash: key_hash(public_key),
        }
    }

    /// Parse `sdc:<fileId>:<fingerprint>`, verifying version and checksum.
    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .trim()
            .strip_prefix(SHARE_SCHEME)
            .and_then(|r| r.strip_prefix(':'))
            .ok_or_else(|| {
                Error::InvalidInput(format!("Share locator must start with '{}:'", SHARE_SCHEME))
            })?;

        let (id, fingerprint) = rest
            .split_once(':')
            .ok_or_else(|| Error::InvalidInput("Share locator is missing fingerprint".into()))?;

        let file_id = Uuid::parse_str(id)
            .map_err(|e| Error::InvalidInput(format!("Invalid container id: {}", e)))?;

        let payload = bs58::decode(fingerprint)
            .into_vec()
            .map_err(|e| Error::InvalidInput(format!("Invalid Base58: {}", e)))?;

        if payload.len() != PAYLOAD_LENGTH {
            return Err(Error::InvalidInput(format!(
                "Invalid fingerprint length: expected {}, got {}",
                PAYLOAD_LENGTH,
                payload.len()
            )));
        }

        let version = payload[0];
        if version != FINGERPRINT_VERSION {
            return Err(Error::InvalidInput(format!(
                "Unsupported fingerprint version: {}",
                version
            )));
        }

        let mut hash = [0u8; HASH_LENGTH];
        hash.copy_from_slice(&payload[1..1 + HASH_LENGTH]);

        if payload[1 + HASH_LENGTH..] != checksum(version, &hash) {
            return Err(Error::InvalidInput(
                "Invalid checksum - share locator may be corrupted".to_string(),
            ));
        }

        Ok(Self { file_id, hash })
    }

    /// Container id this locator points at.
    pub fn file_id(&self) -> Uuid {
        self.file_id
    }

    /// Base58 fingerprint of the pinned public key.
    pub fn fingerprint(&self) -> String {
        let mut payload = Vec::with_capacity(PAYLOAD_LENGTH);
        payload.push(FINGERPRINT_VERSION);
        payload.extend_from_slice(&self.hash);
        payload.extend_from_slice(&checksum(FINGERPRINT_VERSION, &self.hash));
        bs58::encode(payload).into_string()
    }

    /// Whether `public_key` is the key this locator pins.
    pub fn matches_public_key(&self, public_key: &PublicKey) -> bool {
        key_hash(public_key) == self.hash
    }

    /// HTTP(S) link under `base_url`, or the bare locator without one.
    ///
    /// The fingerprint goes in the fragment, e.g.
    /// `https://share.example.com/c/<fileId>#<fingerprint>`.
    pub fn url(&self, base_url: Option<&str>) -> String {
        match base_url {
            Some(base) => format!(
                "{}/c/{}#{}",
                base.trim_end_matches('/'),
                self.file_id,
                self.fingerprint()
            ),
            None => self.to_string(),
        }
    }
}

fn key_hash(public_key: &PublicKey) -> [u8; HASH_LENGTH] {
    let full_hash = blake3::hash(public_key.as_bytes());
    let mut hash = [0u8; HASH_LENGTH];
    hash.copy_from_slice(&full_hash.as_bytes()[..HASH_LENGTH]);
    hash
}

fn checksum(version: u8, hash: &[u8; HASH_LENGTH]) -> [u8; CHECKSUM_LENGTH] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[version]);
    hasher.update(hash);
    let digest = hasher.finalize();
    let mut out = [0u8; CHECKSUM_LENGTH];
    out.copy_from_slice(&digest.as_bytes()[..CHECKSUM_LENGTH]);
    out
}

impl fmt::Display for ShareLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", SHARE_SCHEME, self.file_id, self.fingerprint())
    }
}

impl fmt::Debug for ShareLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShareLocator({})", self)
    }
}

impl FromStr for ShareLocator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl serde::Serialize for ShareLocator {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ShareLocator {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
