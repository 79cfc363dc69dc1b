//! Unpadded base64 (RFC 4648 alphabet, no `=` padding)
//!
//! Three input bytes become four output characters. A trailing group of one
//! or two bytes becomes two or three characters. Text whose length is `1`
//! modulo 4 cannot come from any encoder and is rejected by
//! [`decoded_length`]; individual characters are not validated, so bytes
//! outside the alphabet decode to unspecified bits.
//!
//! # In-place transforms
//!
//! [`encode_in_place`] and [`decode_in_place`] work inside a single buffer.
//! Each group is read into registers before its output is written, and the
//! write cursor never overtakes the read cursor, so the input may share
//! storage with the output. This is what lets pickles and messages be
//! encrypted and wrapped without a second allocation.

use crate::error::CryptoError;

const ENCODE_TABLE: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Marker for bytes outside the alphabet
const INVALID: u8 = 0xFF;

const DECODE_TABLE: [u8; 128] = build_decode_table();

const fn build_decode_table() -> [u8; 128] {
    let mut table = [INVALID; 128];
    let mut i = 0;
    while i < ENCODE_TABLE.len() {
        table[ENCODE_TABLE[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// Length of the encoding of `input_length` bytes.
pub const fn encoded_length(input_length: usize) -> usize {
    4 * ((input_length + 2) / 3) + (input_length + 2) % 3 - 2
}

/// Length of the bytes encoded by `input_length` characters.
///
/// Returns `None` when `input_length % 4 == 1`, which no encoding produces.
pub const fn decoded_length(input_length: usize) -> Option<usize> {
    if input_length % 4 == 1 {
        return None;
    }
    Some(3 * ((input_length + 2) / 4) + (input_length + 2) % 4 - 2)
}

/// Encode `input` into an owned string.
pub fn encode(input: &[u8]) -> String {
    let mut output = vec![0u8; encoded_length(input.len())];
    encode_groups(&mut output, 0, input.len(), Some(input));

    let Ok(text) = String::from_utf8(output) else {
        unreachable!("base64 alphabet is ASCII");
    };
    text
}

/// Encode `input` into the front of `output`.
///
/// Returns the number of characters written.
pub fn encode_into(input: &[u8], output: &mut [u8]) -> Result<usize, CryptoError> {
    let required = encoded_length(input.len());
    if output.len() < required {
        return Err(CryptoError::OutputBufferTooSmall { required, available: output.len() });
    }

    encode_groups(output, 0, input.len(), Some(input));
    Ok(required)
}

/// Encode the last `input_length` bytes of `buffer` into its front.
///
/// The buffer must be at least [`encoded_length`]`(input_length)` long.
/// Returns the number of characters written, starting at index 0.
pub fn encode_in_place(buffer: &mut [u8], input_length: usize) -> Result<usize, CryptoError> {
    let required = encoded_length(input_length);
    if buffer.len() < required {
        return Err(CryptoError::OutputBufferTooSmall { required, available: buffer.len() });
    }

    let input_start = buffer.len() - input_length;
    encode_groups(buffer, input_start, input_length, None);
    Ok(required)
}

/// Decode `input` into an owned byte vector.
pub fn decode(input: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let length = decoded_length(input.len())
        .ok_or(CryptoError::InvalidBase64 { length: input.len() })?;

    let mut output = vec![0u8; length];
    decode_groups(&mut output, input.len(), Some(input));
    Ok(output)
}

/// Decode `input` into the front of `output`.
///
/// Returns the number of bytes written.
pub fn decode_into(input: &[u8], output: &mut [u8]) -> Result<usize, CryptoError> {
    let required = decoded_length(input.len())
        .ok_or(CryptoError::InvalidBase64 { length: input.len() })?;
    if output.len() < required {
        return Err(CryptoError::OutputBufferTooSmall { required, available: output.len() });
    }

    decode_groups(output, input.len(), Some(input));
    Ok(required)
}

/// Decode the whole of `buffer` into its own front and return the decoded
/// prefix.
///
/// On error the buffer is untouched. On success the bytes past the returned
/// prefix still hold leftover text and must not be reused as base64.
pub fn decode_in_place(buffer: &mut [u8]) -> Result<&mut [u8], CryptoError> {
    let length = decoded_length(buffer.len())
        .ok_or(CryptoError::InvalidBase64 { length: buffer.len() })?;

    let input_length = buffer.len();
    decode_groups(buffer, input_length, None);
    Ok(&mut buffer[..length])
}

/// Write the encoding of `input_length` bytes to the front of `output`.
///
/// The bytes come from `input` when given, otherwise from `output` starting
/// at `input_start`.
fn encode_groups(output: &mut [u8], input_start: usize, input_length: usize, input: Option<&[u8]>) {
    let byte_at = |output: &[u8], i: usize| match input {
        Some(input) => input[i],
        None => output[input_start + i],
    };

    let full_groups = input_length / 3;
    for group in 0..full_groups {
        let at = group * 3;
        let value = u32::from(byte_at(output, at)) << 16
            | u32::from(byte_at(output, at + 1)) << 8
            | u32::from(byte_at(output, at + 2));

        let out = group * 4;
        output[out] = ENCODE_TABLE[(value >> 18 & 0x3F) as usize];
        output[out + 1] = ENCODE_TABLE[(value >> 12 & 0x3F) as usize];
        output[out + 2] = ENCODE_TABLE[(value >> 6 & 0x3F) as usize];
        output[out + 3] = ENCODE_TABLE[(value & 0x3F) as usize];
    }

    let at = full_groups * 3;
    let out = full_groups * 4;
    match input_length - at {
        1 => {
            let value = u32::from(byte_at(output, at)) << 16;
            output[out] = ENCODE_TABLE[(value >> 18 & 0x3F) as usize];
            output[out + 1] = ENCODE_TABLE[(value >> 12 & 0x3F) as usize];
        },
        2 => {
            let value =
                u32::from(byte_at(output, at)) << 16 | u32::from(byte_at(output, at + 1)) << 8;
            output[out] = ENCODE_TABLE[(value >> 18 & 0x3F) as usize];
            output[out + 1] = ENCODE_TABLE[(value >> 12 & 0x3F) as usize];
            output[out + 2] = ENCODE_TABLE[(value >> 6 & 0x3F) as usize];
        },
        _ => {},
    }
}

/// Write the decoding of `input_length` characters to the front of
/// `output`.
///
/// The characters come from `input` when given, otherwise from the front of
/// `output` itself.
fn decode_groups(output: &mut [u8], input_length: usize, input: Option<&[u8]>) {
    let sextet_at = |output: &[u8], i: usize| {
        let c = match input {
            Some(input) => input[i],
            None => output[i],
        };
        u32::from(DECODE_TABLE[usize::from(c & 0x7F)])
    };

    let full_groups = input_length / 4;
    for group in 0..full_groups {
        let at = group * 4;
        let value = sextet_at(output, at) << 18
            | sextet_at(output, at + 1) << 12
            | sextet_at(output, at + 2) << 6
            | sextet_at(output, at + 3);

        let out = group * 3;
        output[out] = (value >> 16) as u8;
        output[out + 1] = (value >> 8) as u8;
        output[out + 2] = value as u8;
    }

    let at = full_groups * 4;
    let out = full_groups * 3;
    match input_length - at {
        2 => {
            let value = sextet_at(output, at) << 18 | sextet_at(output, at + 1) << 12;
            output[out] = (value >> 16) as u8;
        },
        3 => {
            let value = sextet_at(output, at) << 18
                | sextet_at(output, at + 1) << 12
                | sextet_at(output, at + 2) << 6;
            output[out] = (value >> 16) as u8;
            output[out + 1] = (value >> 8) as u8;
        },
        _ => {},
    }
}
