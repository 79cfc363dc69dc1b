//! Olm normal and pre-key message framing
//!
//! Normal message:
//!
//! ```text
//! ┌─────────┬──────────────────┬────────────────┬───────────────────┬─────────┐
//! │ version │ 0x0A ratchet key │ 0x10 counter   │ 0x22 ciphertext   │ MAC     │
//! │ 1 byte  │ len-prefixed     │ varint         │ len-prefixed      │ trailer │
//! └─────────┴──────────────────┴────────────────┴───────────────────┴─────────┘
//! ```
//!
//! Pre-key message (no trailer, the inner normal message carries its own
//! MAC):
//!
//! ```text
//! ┌─────────┬───────────────────┬───────────────┬───────────────────┬──────────────┐
//! │ version │ 0x0A one-time key │ 0x12 base key │ 0x1A identity key │ 0x22 message │
//! └─────────┴───────────────────┴───────────────┴───────────────────┴──────────────┘
//! ```
//!
//! Decoding never fails. Fields may come in any order, unknown varint and
//! length-delimited fields are skipped, and anything malformed simply leaves
//! the affected fields absent. Callers reject messages with missing fields.

use std::ops::Range;

use crate::varint::{
    FieldReader, FieldValue, bytes_field_length, push_bytes_field, push_varint_field,
    varint_field_length,
};

/// Key of the ratchet public key field
pub const RATCHET_KEY_TAG: u8 = 0x0A;
/// Key of the chain index field
pub const COUNTER_TAG: u8 = 0x10;
/// Key of the ciphertext field
pub const CIPHERTEXT_TAG: u8 = 0x22;

/// Key of the one-time key field
pub const ONE_TIME_KEY_TAG: u8 = 0x0A;
/// Key of the base key field
pub const BASE_KEY_TAG: u8 = 0x12;
/// Key of the identity key field
pub const IDENTITY_KEY_TAG: u8 = 0x1A;
/// Key of the inner message field
pub const MESSAGE_TAG: u8 = 0x22;

/// Encoded message with a reserved slot for a payload.
///
/// The slot is filled by the caller after framing, typically by encrypting
/// straight into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedMessage {
    /// Full message buffer, trailer space included
    pub bytes: Vec<u8>,
    /// Range of the reserved payload within `bytes`
    pub payload: Range<usize>,
}

/// Length of a normal message with the given field sizes.
pub const fn message_length(
    ratchet_key_length: usize,
    counter: u32,
    ciphertext_length: usize,
    mac_length: usize,
) -> usize {
    1 + bytes_field_length(ratchet_key_length)
        + varint_field_length(counter as u64)
        + bytes_field_length(ciphertext_length)
        + mac_length
}

/// Frame a normal message, reserving space for the ciphertext and the MAC.
///
/// `payload` is the ciphertext slot. The MAC goes in the `mac_length` bytes
/// that follow it.
pub fn encode_message(
    version: u8,
    ratchet_key: &[u8],
    counter: u32,
    ciphertext_length: usize,
    mac_length: usize,
) -> FramedMessage {
    let length = message_length(ratchet_key.len(), counter, ciphertext_length, mac_length);
    let mut bytes = Vec::with_capacity(length);

    bytes.push(version);
    let key = push_bytes_field(&mut bytes, RATCHET_KEY_TAG, ratchet_key.len());
    bytes[key].copy_from_slice(ratchet_key);
    push_varint_field(&mut bytes, COUNTER_TAG, u64::from(counter));
    let payload = push_bytes_field(&mut bytes, CIPHERTEXT_TAG, ciphertext_length);
    bytes.resize(length, 0);

    FramedMessage { bytes, payload }
}

/// Fields of a decoded normal message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage<'a> {
    input: &'a [u8],
    /// Protocol version byte, `0` for empty input
    pub version: u8,
    /// Sender's ratchet public key
    pub ratchet_key: Option<&'a [u8]>,
    /// Index of the message in the sender's chain
    pub counter: Option<u32>,
    /// Range of the ciphertext within the input
    pub ciphertext: Option<Range<usize>>,
}

impl<'a> DecodedMessage<'a> {
    /// Ciphertext bytes, if present.
    pub fn ciphertext_bytes(&self) -> Option<&'a [u8]> {
        self.ciphertext.clone().map(|range| &self.input[range])
    }
}

/// Decode a normal message whose last `mac_length` bytes are its MAC.
///
/// A counter that does not fit in 32 bits is reported as absent.
pub fn decode_message(input: &[u8], mac_length: usize) -> DecodedMessage<'_> {
    let mut decoded =
        DecodedMessage { input, version: 0, ratchet_key: None, counter: None, ciphertext: None };

    let Some(end) = input.len().checked_sub(mac_length) else {
        return decoded;
    };
    let body = &input[..end];
    let Some(&version) = body.first() else {
        return decoded;
    };
    decoded.version = version;

    for field in FieldReader::new(body, 1) {
        match (field.key, field.value) {
            (key, FieldValue::Bytes(range)) if key == u64::from(RATCHET_KEY_TAG) => {
                decoded.ratchet_key = Some(&input[range]);
            },
            (key, FieldValue::Varint(value)) if key == u64::from(COUNTER_TAG) => {
                decoded.counter = u32::try_from(value).ok();
            },
            (key, FieldValue::Bytes(range)) if key == u64::from(CIPHERTEXT_TAG) => {
                decoded.ciphertext = Some(range);
            },
            _ => {},
        }
    }

    decoded
}

/// Length of a pre-key message with the given field sizes.
pub const fn prekey_message_length(
    one_time_key_length: usize,
    base_key_length: usize,
    identity_key_length: usize,
    message_length: usize,
) -> usize {
    1 + bytes_field_length(one_time_key_length)
        + bytes_field_length(base_key_length)
        + bytes_field_length(identity_key_length)
        + bytes_field_length(message_length)
}

/// Frame a pre-key message, reserving space for the inner message.
pub fn encode_prekey_message(
    version: u8,
    one_time_key: &[u8],
    base_key: &[u8],
    identity_key: &[u8],
    message_length: usize,
) -> FramedMessage {
    let length = prekey_message_length(
        one_time_key.len(),
        base_key.len(),
        identity_key.len(),
        message_length,
    );
    let mut bytes = Vec::with_capacity(length);

    bytes.push(version);
    for (tag, key) in [
        (ONE_TIME_KEY_TAG, one_time_key),
        (BASE_KEY_TAG, base_key),
        (IDENTITY_KEY_TAG, identity_key),
    ] {
        let range = push_bytes_field(&mut bytes, tag, key.len());
        bytes[range].copy_from_slice(key);
    }
    let payload = push_bytes_field(&mut bytes, MESSAGE_TAG, message_length);

    FramedMessage { bytes, payload }
}

/// Fields of a decoded pre-key message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPreKeyMessage<'a> {
    /// Protocol version byte, `0` for empty input
    pub version: u8,
    /// Recipient's one-time public key
    pub one_time_key: Option<&'a [u8]>,
    /// Sender's ephemeral base key
    pub base_key: Option<&'a [u8]>,
    /// Sender's Curve25519 identity key
    pub identity_key: Option<&'a [u8]>,
    /// Inner normal message
    pub message: Option<&'a [u8]>,
}

/// Decode a pre-key message.
pub fn decode_prekey_message(input: &[u8]) -> DecodedPreKeyMessage<'_> {
    let mut decoded = DecodedPreKeyMessage {
        version: 0,
        one_time_key: None,
        base_key: None,
        identity_key: None,
        message: None,
    };

    let Some(&version) = input.first() else {
        return decoded;
    };
    decoded.version = version;

    for field in FieldReader::new(input, 1) {
        let FieldValue::Bytes(range) = field.value else {
            continue;
        };
        let bytes = &input[range];
        match u8::try_from(field.key) {
            Ok(ONE_TIME_KEY_TAG) => decoded.one_time_key = Some(bytes),
            Ok(BASE_KEY_TAG) => decoded.base_key = Some(bytes),
            Ok(IDENTITY_KEY_TAG) => decoded.identity_key = Some(bytes),
            Ok(MESSAGE_TAG) => decoded.message = Some(bytes),
            _ => {},
        }
    }

    decoded
}
