//! Property tests for the cipher and signature engines.
//!
//! These cover the universally quantified guarantees:
//! - encrypt/decrypt round-trips for arbitrary payloads
//! - any single-bit flip is detected by both AES-GCM and the signature
//! - keys derived from different secrets never open each other's data

use proptest::prelude::*;
use sdc_crypto::{
    checksum, decrypt, derive_symmetric_key, encrypt, sign, verify, CryptoError, Keypair,
    SymmetricKey, MIN_KDF_ROUNDS,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_encrypt_decrypt_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..4096), key in any::<[u8; 32]>()) {
        let key = SymmetricKey::from_bytes(key);
        let sealed = encrypt(&plaintext, &key).unwrap();
        prop_assert_eq!(decrypt(&sealed, &key).unwrap(), plaintext);
    }

    #[test]
    fn prop_ciphertext_bit_flip_detected(
        plaintext in proptest::collection::vec(any::<u8>(), 1..512),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let key = SymmetricKey::from_bytes([9u8; 32]);
        let mut sealed = encrypt(&plaintext, &key).unwrap();
        let i = index.index(sealed.len());
        sealed[i] ^= 1 << bit;

        let result = decrypt(&sealed, &key);
        prop_assert!(matches!(result, Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn prop_signature_bit_flip_detected(
        message in proptest::collection::vec(any::<u8>(), 1..512),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let keypair = Keypair::generate().unwrap();
        let signature = sign(&message, &keypair.private);

        let mut tampered = message.clone();
        let i = index.index(tampered.len());
        tampered[i] ^= 1 << bit;

        prop_assert!(verify(&message, &signature, keypair.public.as_bytes()));
        prop_assert!(!verify(&tampered, &signature, keypair.public.as_bytes()));
    }

    #[test]
    fn prop_checksum_is_stable(data in proptest::collection::vec(any::<u8>(), 0..1024)) {
        let digest = checksum(&data);
        prop_assert_eq!(digest.len(), 64);
        prop_assert_eq!(digest, checksum(&data));
    }
}

#[test]
fn test_wrong_password_never_returns_plaintext() {
    let salt = [5u8; 32];
    let right = derive_symmetric_key(b"correct-horse", MIN_KDF_ROUNDS, &salt).unwrap();
    let wrong = derive_symmetric_key(b"correct-horsf", MIN_KDF_ROUNDS, &salt).unwrap();

    let sealed = encrypt(&[0xAB; 1024], &right).unwrap();

    assert!(matches!(
        decrypt(&sealed, &wrong),
        Err(CryptoError::Decryption(_))
    ));
    assert_eq!(decrypt(&sealed, &right).unwrap(), vec![0xAB; 1024]);
}
