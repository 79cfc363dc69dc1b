//! Megolm group message framing
//!
//! ```text
//! ┌─────────┬──────────────────┬─────────────────┬─────────┬───────────┐
//! │ version │ 0x08 index       │ 0x12 ciphertext │ MAC     │ signature │
//! │ 1 byte  │ varint           │ len-prefixed    │ trailer │ trailer   │
//! └─────────┴──────────────────┴─────────────────┴─────────┴───────────┘
//! ```
//!
//! The MAC covers everything before it; the signature covers everything
//! before it, MAC included.

use std::ops::Range;

use crate::{
    message::FramedMessage,
    varint::{
        FieldReader, FieldValue, bytes_field_length, push_bytes_field, push_varint_field,
        varint_field_length,
    },
};

/// Key of the message index field
pub const MESSAGE_INDEX_TAG: u8 = 0x08;
/// Key of the ciphertext field
pub const GROUP_CIPHERTEXT_TAG: u8 = 0x12;

/// Length of a group message with the given field sizes.
pub const fn group_message_length(
    message_index: u32,
    ciphertext_length: usize,
    mac_length: usize,
    signature_length: usize,
) -> usize {
    1 + varint_field_length(message_index as u64)
        + bytes_field_length(ciphertext_length)
        + mac_length
        + signature_length
}

/// Frame a group message, reserving space for the ciphertext and both
/// trailers.
pub fn encode_group_message(
    version: u8,
    message_index: u32,
    ciphertext_length: usize,
    mac_length: usize,
    signature_length: usize,
) -> FramedMessage {
    let length =
        group_message_length(message_index, ciphertext_length, mac_length, signature_length);
    let mut bytes = Vec::with_capacity(length);

    bytes.push(version);
    push_varint_field(&mut bytes, MESSAGE_INDEX_TAG, u64::from(message_index));
    let payload = push_bytes_field(&mut bytes, GROUP_CIPHERTEXT_TAG, ciphertext_length);
    bytes.resize(length, 0);

    FramedMessage { bytes, payload }
}

/// Fields of a decoded group message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedGroupMessage {
    /// Protocol version byte, `0` for empty input
    pub version: u8,
    /// Megolm ratchet index the message was encrypted at
    pub message_index: Option<u32>,
    /// Range of the ciphertext within the input
    pub ciphertext: Option<Range<usize>>,
}

/// Decode a group message whose last `mac_length + signature_length` bytes
/// are its trailers.
pub fn decode_group_message(
    input: &[u8],
    mac_length: usize,
    signature_length: usize,
) -> DecodedGroupMessage {
    let mut decoded = DecodedGroupMessage { version: 0, message_index: None, ciphertext: None };

    let Some(end) = input.len().checked_sub(mac_length + signature_length) else {
        return decoded;
    };
    let body = &input[..end];
    let Some(&version) = body.first() else {
        return decoded;
    };
    decoded.version = version;

    for field in FieldReader::new(body, 1) {
        match (u8::try_from(field.key), field.value) {
            (Ok(MESSAGE_INDEX_TAG), FieldValue::Varint(value)) => {
                decoded.message_index = u32::try_from(value).ok();
            },
            (Ok(GROUP_CIPHERTEXT_TAG), FieldValue::Bytes(range)) => {
                decoded.ciphertext = Some(range);
            },
            _ => {},
        }
    }

    decoded
}
