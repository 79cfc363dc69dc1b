//! Fuzz target for the unpadded base64 codec
//!
//! # Invariants
//!
//! - `decoded_length` agrees with what `decode` produces
//! - In-place decoding matches allocating decoding
//! - Anything that decodes re-encodes to a string that decodes to the same
//!   bytes
//! - NEVER panic on arbitrary input

#![no_main]

use libfuzzer_sys::fuzz_target;
use olmkit_crypto::base64;

fuzz_target!(|data: &[u8]| {
    let decoded = base64::decode(data);
    let expected_length = base64::decoded_length(data.len());

    let mut buffer = data.to_vec();
    let in_place = base64::decode_in_place(&mut buffer).map(|bytes| bytes.to_vec());
    assert_eq!(decoded.is_ok(), in_place.is_ok());

    if let Ok(bytes) = decoded {
        assert_eq!(Some(bytes.len()), expected_length);
        assert_eq!(in_place.ok().as_deref(), Some(bytes.as_slice()));

        let encoded = base64::encode(&bytes);
        assert_eq!(encoded.len(), base64::encoded_length(bytes.len()));
        assert_eq!(base64::decode(encoded.as_bytes()).ok(), Some(bytes));
    }
});
