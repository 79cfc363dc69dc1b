//! Fuzz target for the Olm pre-key message decoder
//!
//! # Invariants
//!
//! - Every decoded field is a sub-slice of the input
//! - An embedded message, when present, decodes without panicking too
//! - NEVER panic on malformed input

#![no_main]

use libfuzzer_sys::fuzz_target;
use olmkit_crypto::MAC_LENGTH;
use olmkit_proto::{decode_message, decode_prekey_message};

fuzz_target!(|data: &[u8]| {
    let decoded = decode_prekey_message(data);

    for field in [decoded.one_time_key, decoded.base_key, decoded.identity_key, decoded.message]
        .into_iter()
        .flatten()
    {
        assert!(field.len() < data.len());
    }

    if let Some(message) = decoded.message {
        let _ = decode_message(message, MAC_LENGTH);
    }
});
