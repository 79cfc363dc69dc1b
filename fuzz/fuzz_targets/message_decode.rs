//! Fuzz target for the Olm message decoder
//!
//! Arbitrary bytes are decoded as a normal Olm message to find:
//! - Panics on truncated or overlong varints
//! - Field slices or ciphertext ranges that escape the input
//! - Length arithmetic that underflows when the MAC does not fit
//!
//! The decoder should NEVER panic. Missing fields come back as `None`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use olmkit_crypto::MAC_LENGTH;
use olmkit_proto::decode_message;

fuzz_target!(|data: &[u8]| {
    let decoded = decode_message(data, MAC_LENGTH);

    if let Some(range) = decoded.ciphertext {
        assert!(range.start <= range.end);
        assert!(range.end + MAC_LENGTH <= data.len());
    }
    if let Some(key) = decoded.ratchet_key {
        assert!(key.len() < data.len());
    }
});
