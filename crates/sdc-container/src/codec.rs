//! Container wire format.
//!
//! # Format
//!
//! ```text
//! SDC-FILE-BEGIN\n
//! {"magic":[83,68,67,1],"version":"1.0","fileId":"...", ... ,"dataSize":N,"data":[...]}
//! \nSDC-FILE-END
//! ```
//!
//! `magic` is `"SDC"` followed by the format version byte. Binary key,
//! hash and signature fields are base64; the payload is a JSON array of
//! byte values. Decoding is all-or-nothing: any framing, magic, version,
//! JSON or length problem yields `Error::Format` and no partial container.

use chrono::{DateTime, Utc};
use sdc_core::defaults::{FORMAT_VERSION, MAX_ENCODED_BYTES};
use sdc_core::{Error, Metadata, Result, SdcFile};
use sdc_crypto::format::{base64_array, base64_encode};
use sdc_crypto::PublicKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opening sentinel, including its line break.
pub const BEGIN_MARKER: &[u8] = b"SDC-FILE-BEGIN\n";

/// Closing sentinel, including the line break before it.
pub const END_MARKER: &[u8] = b"\nSDC-FILE-END";

/// `"SDC"` followed by the format version byte.
pub const MAGIC: [u8; 4] = [0x53, 0x44, 0x43, 0x01];

/// Compact JSON form of [`MAGIC`], used for cheap probing.
const MAGIC_PROBE: &[u8] = b"\"magic\":[83,68,67,1]";

/// How far into the body the probe looks for the magic field.
const PROBE_WINDOW: usize = 512;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireContainerRef<'a> {
    magic: [u8; 4],
    version: &'a str,
    file_id: Uuid,
    name: &'a str,
    original_format: &'a str,
    metadata: &'a Metadata,
    public_key: &'a PublicKey,
    private_key_hash: String,
    signature: String,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    data_size: usize,
    data: &'a [u8],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireContainer {
    magic: [u8; 4],
    version: String,
    file_id: Uuid,
    name: String,
    original_format: String,
    metadata: Metadata,
    public_key: PublicKey,
    #[serde(with = "base64_array")]
    private_key_hash: [u8; 32],
    #[serde(with = "base64_array")]
    signature: [u8; 64],
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    data_size: usize,
    data: Vec<u8>,
}

/// Serialize a container to its framed text form.
pub fn encode(container: &SdcFile) -> Result<Vec<u8>> {
    let wire = WireContainerRef {
        magic: MAGIC,
        version: FORMAT_VERSION,
        file_id: container.id,
        name: &container.name,
        original_format: &container.original_format,
        metadata: &container.metadata,
        public_key: &container.public_key,
        private_key_hash: base64_encode(&container.private_key_hash),
        signature: base64_encode(&container.signature),
        created_at: container.created_at,
        last_modified: container.last_modified,
        data_size: container.encrypted_data.len(),
        data: &container.encrypted_data,
    };

    let json = serde_json::to_vec(&wire)?;

    let mut out = Vec::with_capacity(BEGIN_MARKER.len() + json.len() + END_MARKER.len());
    out.extend_from_slice(BEGIN_MARKER);
    out.extend_from_slice(&json);
    out.extend_from_slice(END_MARKER);
    Ok(out)
}

/// Parse and validate a framed container.
///
/// A single trailing line break after the closing sentinel is tolerated.
pub fn decode(bytes: &[u8]) -> Result<SdcFile> {
    if bytes.len() > MAX_ENCODED_BYTES {
        return Err(Error::Format(format!(
            "Container exceeds {} bytes",
            MAX_ENCODED_BYTES
        )));
    }

    let body = frame_body(bytes)?;

    let wire: WireContainer = serde_json::from_slice(body)
        .map_err(|e| Error::Format(format!("Invalid container JSON: {}", e)))?;

    if wire.magic[..3] != MAGIC[..3] {
        return Err(Error::Format("Invalid magic bytes".to_string()));
    }
    if wire.magic[3] != MAGIC[3] {
        return Err(Error::Format(format!(
            "Unsupported format version byte: {}",
            wire.magic[3]
        )));
    }
    if wire.version != FORMAT_VERSION {
        return Err(Error::Format(format!(
            "Unsupported format version: {}",
            wire.version
        )));
    }
    if wire.data_size != wire.data.len() {
        return Err(Error::Format(format!(
            "Data size mismatch: header says {}, payload has {}",
            wire.data_size,
            wire.data.len()
        )));
    }

    Ok(SdcFile {
        id: wire.file_id,
        name: wire.name,
        original_format: wire.original_format,
        encrypted_data: wire.data,
        public_key: wire.public_key,
        private_key_hash: wire.private_key_hash,
        metadata: wire.metadata,
        signature: wire.signature,
        created_at: wire.created_at,
        last_modified: wire.last_modified,
    })
}

/// Cheap check for the sentinels and magic bytes, without a full parse.
pub fn looks_like_container(bytes: &[u8]) -> bool {
    match frame_body(bytes) {
        Ok(body) => {
            let window = &body[..body.len().min(PROBE_WINDOW)];
            window
                .windows(MAGIC_PROBE.len())
                .any(|w| w == MAGIC_PROBE)
        }
        Err(_) => false,
    }
}

fn frame_body(bytes: &[u8]) -> Result<&[u8]> {
    let trimmed = bytes
        .strip_suffix(b"\r\n")
        .or_else(|| bytes.strip_suffix(b"\n"))
        .unwrap_or(bytes);

    let after_begin = trimmed
        .strip_prefix(BEGIN_MARKER)
        .ok_or_else(|| Error::Format("Missing SDC-FILE-BEGIN sentinel".to_string()))?;

    after_begin
        .strip_suffix(END_MARKER)
        .ok_or_else(|| Error::Format("Missing SDC-FILE-END sentinel".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_container;

    fn replace_once(haystack: &[u8], from: &str, to: &str) -> Vec<u8> {
        let text = String::from_utf8(haystack.to_vec()).unwrap();
        assert!(text.contains(from), "missing {}", from);
        text.replacen(from, to, 1).into_bytes()
    }

    #[test]
    fn test_encode_framing() {
        let (container, _) = sample_container(b"hello");
        let encoded = encode(&container).unwrap();

        assert!(encoded.starts_with(b"SDC-FILE-BEGIN\n{\"magic\":[83,68,67,1],\"version\":\"1.0\""));
        assert!(encoded.ends_with(b"}\nSDC-FILE-END"));
        assert!(looks_like_container(&encoded));
    }

    #[test]
    fn test_encode_field_names() {
        let (container, _) = sample_container(b"hello");
        let text = String::from_utf8(encode(&container).unwrap()).unwrap();

        for field in [
            "\"fileId\"",
            "\"originalFormat\"",
            "\"publicKey\"",
            "\"privateKeyHash\"",
            "\"signature\"",
            "\"createdAt\"",
            "\"lastModified\"",
            "\"dataSize\":5",
            "\"data\":[104,101,108,108,111]",
        ] {
            assert!(text.contains(field), "missing {}", field);
        }
    }

    #[test]
    fn test_roundtrip_exact() {
        let (container, _) = sample_container(&[0u8, 1, 2, 254, 255]);
        let decoded = decode(&encode(&container).unwrap()).unwrap();
        assert_eq!(decoded, container);
    }

    #[test]
    fn test_decode_tolerates_trailing_newline() {
        let (container, _) = sample_container(b"x");
        let mut encoded = encode(&container).unwrap();
        encoded.push(b'\n');
        assert_eq!(decode(&encoded).unwrap(), container);
    }

    #[test]
    fn test_decode_missing_begin() {
        let (container, _) = sample_container(b"x");
        let encoded = encode(&container).unwrap();
        let result = decode(&encoded[1..]);
        assert!(matches!(result, Err(Error::Format(ref m)) if m.contains("BEGIN")));
    }

    #[test]
    fn test_decode_missing_end() {
        let (container, _) = sample_container(b"x");
        let encoded = encode(&container).unwrap();
        let result = decode(&encoded[..encoded.len() - 1]);
        assert!(matches!(result, Err(Error::Format(ref m)) if m.contains("END")));
        assert!(!looks_like_container(&encoded[..encoded.len() - 1]));
    }

    #[test]
    fn test_decode_flipped_last_byte() {
        let (container, _) = sample_container(b"x");
        let mut encoded = encode(&container).unwrap();
        let last = encoded.len() - 1;
        encoded[last] ^= 0x01;
        assert!(matches!(decode(&encoded), Err(Error::Format(_))));
    }

    #[test]
    fn test_decode_bad_magic() {
        let (container, _) = sample_container(b"x");
        let encoded = encode(&container).unwrap();
        let tampered = replace_once(&encoded, "[83,68,67,1]", "[80,75,3,4]");

        assert!(matches!(decode(&tampered), Err(Error::Format(ref m)) if m.contains("magic")));
        assert!(!looks_like_container(&tampered));
    }

    #[test]
    fn test_decode_unsupported_version_byte() {
        let (container, _) = sample_container(b"x");
        let encoded = encode(&container).unwrap();
        let tampered = replace_once(&encoded, "[83,68,67,1]", "[83,68,67,2]");
        assert!(matches!(decode(&tampered), Err(Error::Format(ref m)) if m.contains("version byte")));
    }

    #[test]
    fn test_decode_unsupported_version_string() {
        let (container, _) = sample_container(b"x");
        let encoded = encode(&container).unwrap();
        let tampered = replace_once(&encoded, "\"version\":\"1.0\"", "\"version\":\"2.0\"");
        assert!(matches!(decode(&tampered), Err(Error::Format(_))));
    }

    #[test]
    fn test_decode_data_size_mismatch() {
        let (container, _) = sample_container(b"hello");
        let encoded = encode(&container).unwrap();
        let tampered = replace_once(&encoded, "\"dataSize\":5", "\"dataSize\":6");
        assert!(matches!(decode(&tampered), Err(Error::Format(ref m)) if m.contains("size")));
    }

    #[test]
    fn test_decode_invalid_base64() {
        let (container, _) = sample_container(b"x");
        let encoded = encode(&container).unwrap();
        let sig = base64_encode(&container.signature);
        let tampered = replace_once(&encoded, &sig, "!!not-base64!!");
        assert!(matches!(decode(&tampered), Err(Error::Format(_))));
    }

    #[test]
    fn test_decode_wrong_length_hash() {
        let (container, _) = sample_container(b"x");
        let encoded = encode(&container).unwrap();
        let hash = base64_encode(&container.private_key_hash);
        let tampered = replace_once(&encoded, &hash, &base64_encode(&[0u8; 16]));
        assert!(matches!(decode(&tampered), Err(Error::Format(_))));
    }

    #[test]
    fn test_decode_invalid_json() {
        let mut framed = BEGIN_MARKER.to_vec();
        framed.extend_from_slice(b"{\"magic\":[83,68,67,1],");
        framed.extend_from_slice(END_MARKER);
        assert!(matches!(decode(&framed), Err(Error::Format(_))));
        assert!(looks_like_container(&framed));
    }

    #[test]
    fn test_decode_unknown_compression() {
        let (container, _) = sample_container(b"x");
        let encoded = encode(&container).unwrap();
        let tampered = replace_once(
            &encoded,
            "\"compressionAlgorithm\":\"none\"",
            "\"compressionAlgorithm\":\"gzip\"",
        );
        assert!(matches!(decode(&tampered), Err(Error::Format(_))));
    }

    #[test]
    fn test_looks_like_container_rejects_other_data() {
        assert!(!looks_like_container(b""));
        assert!(!looks_like_container(b"%PDF-1.7"));
        assert!(!looks_like_container(b"SDC-FILE-BEGIN\n{}\nSDC-FILE-END"));
    }
}
