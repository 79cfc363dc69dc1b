//! Property-based tests for the primitive layer
//!
//! 1. **Base64 agreement**: the in-house codec matches an independent
//!    unpadded standard engine for every input
//! 2. **Length formulas**: `encoded_length` and `decoded_length` invert each
//!    other, and lengths `1 mod 4` are rejected
//! 3. **In-place equivalence**: the in-place transforms give the same bytes
//!    as the allocating ones
//! 4. **Cipher round-trip and tamper detection**

use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};
use olmkit_crypto::{
    AesSha256Cipher, Cipher, CryptoError, Curve25519KeyPair, Ed25519KeyPair, MAC_LENGTH,
    base64 as codec,
};
use proptest::prelude::*;

const CIPHER: AesSha256Cipher = AesSha256Cipher::new(b"PROPERTY_KEYS");

fn seal(key: &[u8], header: &[u8], plaintext: &[u8]) -> Vec<u8> {
    let length = header.len() + CIPHER.ciphertext_length(plaintext.len()) + MAC_LENGTH;
    let mut output = vec![0u8; length];
    output[..header.len()].copy_from_slice(header);
    CIPHER.encrypt(key, plaintext, &mut output, header.len()).unwrap();
    output
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_encode_matches_reference(input in prop::collection::vec(any::<u8>(), 0..300)) {
        prop_assert_eq!(codec::encode(&input), STANDARD_NO_PAD.encode(&input));
    }

    #[test]
    fn prop_decode_inverts_encode(input in prop::collection::vec(any::<u8>(), 0..300)) {
        let text = codec::encode(&input);
        prop_assert_eq!(codec::decode(text.as_bytes()).unwrap(), input);
    }

    #[test]
    fn prop_length_formulas_invert(n in 0usize..10_000) {
        let encoded = codec::encoded_length(n);
        prop_assert_ne!(encoded % 4, 1);
        prop_assert_eq!(codec::decoded_length(encoded), Some(n));
    }

    #[test]
    fn prop_impossible_lengths_rejected(groups in 0usize..1_000) {
        let length = groups * 4 + 1;
        prop_assert_eq!(codec::decoded_length(length), None);

        let text = vec![b'A'; length];
        prop_assert_eq!(codec::decode(&text), Err(CryptoError::InvalidBase64 { length }));
    }

    #[test]
    fn prop_encode_in_place_matches(input in prop::collection::vec(any::<u8>(), 0..300)) {
        let mut buffer = vec![0u8; codec::encoded_length(input.len())];
        let start = buffer.len() - input.len();
        buffer[start..].copy_from_slice(&input);

        let written = codec::encode_in_place(&mut buffer, input.len()).unwrap();
        let expected = codec::encode(&input);
        prop_assert_eq!(&buffer[..written], expected.as_bytes());
    }

    #[test]
    fn prop_decode_in_place_matches(input in prop::collection::vec(any::<u8>(), 0..300)) {
        let mut buffer = codec::encode(&input).into_bytes();
        let decoded = codec::decode_in_place(&mut buffer).unwrap();
        prop_assert_eq!(&decoded[..], &input[..]);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_cipher_roundtrip(
        key in prop::collection::vec(any::<u8>(), 0..64),
        header in prop::collection::vec(any::<u8>(), 0..40),
        plaintext in prop::collection::vec(any::<u8>(), 0..500),
    ) {
        let sealed = seal(&key, &header, &plaintext);
        let ciphertext = header.len()..sealed.len() - MAC_LENGTH;

        let mut output = vec![0u8; CIPHER.max_plaintext_length(ciphertext.len())];
        let length = CIPHER.decrypt(&key, &sealed, ciphertext, &mut output).unwrap();
        prop_assert_eq!(&output[..length], &plaintext[..]);
    }

    #[test]
    fn prop_cipher_detects_any_bit_flip(
        key in prop::collection::vec(any::<u8>(), 1..64),
        plaintext in prop::collection::vec(any::<u8>(), 0..100),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let header = [0x03u8, 0x10, 0x05];
        let mut sealed = seal(&key, &header, &plaintext);
        let at = position.index(sealed.len());
        sealed[at] ^= 1 << bit;

        let ciphertext = header.len()..sealed.len() - MAC_LENGTH;
        let mut output = vec![0u8; sealed.len()];
        let result = CIPHER.decrypt(&key, &sealed, ciphertext, &mut output);
        prop_assert_eq!(result, Err(CryptoError::BadMac));
    }

    #[test]
    fn prop_ecdh_agrees(alice in any::<[u8; 32]>(), bob in any::<[u8; 32]>()) {
        let alice = Curve25519KeyPair::from_random(&alice);
        let bob = Curve25519KeyPair::from_random(&bob);

        prop_assert_eq!(
            *alice.shared_secret(&bob.public_key),
            *bob.shared_secret(&alice.public_key)
        );
    }

    #[test]
    fn prop_signatures_verify(
        seed in any::<[u8; 32]>(),
        message in prop::collection::vec(any::<u8>(), 0..200),
    ) {
        let pair = Ed25519KeyPair::from_random(&seed);
        let signature = pair.sign(&message);
        prop_assert!(pair.public_key.verify(&message, &signature));
    }
}
