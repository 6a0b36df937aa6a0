//! Ed25519 signatures over SHA-256 message digests.
//!
//! Messages are hashed with SHA-256 first and the 32-byte digest is signed,
//! so SHA-256 is the signing hash regardless of message size.

use ed25519_dalek::{Signature, Signer};
use sha2::{Digest, Sha256};

use crate::keys::{PrivateKey, PublicKey};

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Sign `message` with `private_key`.
pub fn sign(message: &[u8], private_key: &PrivateKey) -> [u8; SIGNATURE_LEN] {
    let digest = Sha256::digest(message);
    private_key.to_signing_key().sign(&digest).to_bytes()
}

/// Verify `signature` over `message` against raw public key bytes.
///
/// Never errors: a malformed signature, an invalid public key or a mismatch
/// all return `false`.
pub fn verify(message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(verifying_key) = PublicKey::from_bytes(key_bytes).to_verifying_key() else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };

    let digest = Sha256::digest(message);
    verifying_key.verify_strict(&digest, &signature).is_ok()
}
