//! Container signatures.
//!
//! The signed message is `encrypted_data ‖ canonical(metadata)`, where the
//! canonical form is RFC 8785 JSON with `access.view_count` zeroed. Recording
//! a view therefore never invalidates the signature, while every other
//! metadata field stays covered.

use sdc_core::{Metadata, Result, SdcFile};
use sdc_crypto::{PrivateKey, SIGNATURE_LEN};

/// RFC 8785 canonical JSON of `metadata`, with `view_count` zeroed.
pub fn canonical_metadata(metadata: &Metadata) -> Result<String> {
    let mut signed = metadata.clone();
    signed.access.view_count = 0;
    Ok(serde_json_canonicalizer::to_string(&signed)?)
}

/// Bytes covered by the signature.
pub fn signing_message(data: &[u8], metadata: &Metadata) -> Result<Vec<u8>> {
    let canonical = canonical_metadata(metadata)?;
    let mut message = Vec::with_capacity(data.len() + canonical.len());
    message.extend_from_slice(data);
    message.extend_from_slice(canonical.as_bytes());
    Ok(message)
}

/// Sign a payload and its metadata.
pub fn sign_container(
    data: &[u8],
    metadata: &Metadata,
    private_key: &PrivateKey,
) -> Result<[u8; SIGNATURE_LEN]> {
    let message = signing_message(data, metadata)?;
    Ok(sdc_crypto::sign(&message, private_key))
}

/// Whether the container's signature covers its current payload and metadata.
pub fn verify_container(container: &SdcFile) -> bool {
    match signing_message(&container.encrypted_data, &container.metadata) {
        Ok(message) => sdc_crypto::verify(
            &message,
            &container.signature,
            container.public_key.as_bytes(),
        ),
        Err(e) => {
            tracing::warn!(container_id = %container.id, error = %e, "Metadata not canonicalizable");
            false
        }
    }
}
