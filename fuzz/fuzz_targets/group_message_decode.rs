//! Fuzz target for the Megolm group message decoder
//!
//! The trailer (MAC then signature) is sized by the caller, so the decoder
//! is driven with the real trailer lengths and with arbitrary ones.
//!
//! # Invariants
//!
//! - The ciphertext range never overlaps the trailer
//! - NEVER panic, whatever trailer sizes are claimed

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use olmkit_crypto::{ED25519_SIGNATURE_LENGTH, MAC_LENGTH};
use olmkit_proto::decode_group_message;

#[derive(Debug, Arbitrary)]
struct Input {
    mac_length: u8,
    signature_length: u8,
    bytes: Vec<u8>,
}

fuzz_target!(|input: Input| {
    for (mac_length, signature_length) in [
        (MAC_LENGTH, ED25519_SIGNATURE_LENGTH),
        (usize::from(input.mac_length), usize::from(input.signature_length)),
    ] {
        let decoded = decode_group_message(&input.bytes, mac_length, signature_length);
        if let Some(range) = decoded.ciphertext {
            assert!(range.start <= range.end);
            assert!(range.end + mac_length + signature_length <= input.bytes.len());
        }
    }
});
