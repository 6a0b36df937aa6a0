//! # sdc-crypto
//!
//! Cryptographic primitives for secure document containers.
//!
//! This crate knows nothing about containers. It provides the three engines
//! the container pipeline is built from:
//!
//! - **Key management** ([`keys`], [`kdf`]): Ed25519 keypairs, PBKDF2-HMAC-SHA256
//!   key derivation, SHA-256 key hashing
//! - **Cipher** ([`cipher`]): AES-256-GCM with a random 96-bit nonce prepended
//!   to every ciphertext, SHA-256 hex checksums
//! - **Signatures** ([`signature`]): Ed25519 over SHA-256 digests; verification
//!   returns `bool`
//!
//! plus [`key_storage`] for sealing a private key under a passphrase
//! (Argon2id + AES-256-GCM).
//!
//! ## Examples
//!
//! ### Derive a key and encrypt
//!
//! ```rust
//! use sdc_crypto::{cipher, derive_symmetric_key, generate_salt, MIN_KDF_ROUNDS};
//!
//! let salt = generate_salt();
//! let key = derive_symmetric_key(b"correct-horse", MIN_KDF_ROUNDS, &salt).unwrap();
//!
//! let sealed = cipher::encrypt(b"quarterly report", &key).unwrap();
//! assert_eq!(cipher::decrypt(&sealed, &key).unwrap(), b"quarterly report");
//! ```
//!
//! ### Sign and verify
//!
//! ```rust
//! use sdc_crypto::{sign, verify, Keypair};
//!
//! let keypair = Keypair::generate().unwrap();
//! let signature = sign(b"payload", &keypair.private);
//! assert!(verify(b"payload", &signature, keypair.public.as_bytes()));
//! assert!(!verify(b"tampered", &signature, keypair.public.as_bytes()));
//! ```

pub mod cipher;
pub mod error;
pub mod format;
pub mod kdf;
pub mod key_storage;
pub mod keys;
pub mod signature;

// Re-export commonly used types
pub use cipher::{checksum, decrypt, encrypt, generate_salt};
pub use error::{CryptoError, CryptoResult};
pub use format::{base64_decode, base64_encode};
pub use kdf::{
    derive_symmetric_key, validate_password, KdfParams, SymmetricKey, DEFAULT_KDF_ROUNDS,
    MIN_KDF_ROUNDS, MIN_PASSWORD_LENGTH,
};
pub use key_storage::{load_private_key, save_private_key};
pub use keys::{
    hash_key, hash_key_matches, load_public_key, save_public_key, Keypair, PrivateKey, PublicKey,
};
pub use signature::{sign, verify, SIGNATURE_LEN};
