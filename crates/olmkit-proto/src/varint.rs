//! Protocol Buffers style varints and tagged fields
//!
//! A field is a varint key followed by its value. The low three bits of the
//! key give the wire type: `0` is a varint value, `2` is a varint length
//! followed by that many bytes. The message formats compare whole keys
//! (`0x0A` is field 1 as bytes, `0x10` is field 2 as a varint), so a known
//! key always implies its wire type.

use std::ops::Range;

/// Wire type of a varint field
const WIRE_VARINT: u64 = 0;
/// Wire type of a length-delimited field
const WIRE_BYTES: u64 = 2;

/// Longest encoding of a `u64`
const MAX_VARINT_LENGTH: usize = 10;

/// Bytes needed to encode `value`.
pub const fn varint_length(mut value: u64) -> usize {
    let mut length = 1;
    while value >= 0x80 {
        value >>= 7;
        length += 1;
    }
    length
}

/// Append the varint encoding of `value`.
pub fn push_varint(output: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        output.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    output.push(value as u8);
}

/// Read a varint from the front of `input`.
///
/// Returns the value and the bytes consumed, or `None` if the encoding runs
/// off the end of `input` or is longer than any `u64` needs.
pub fn read_varint(input: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in input.iter().take(MAX_VARINT_LENGTH).enumerate() {
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Value carried by a tagged field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Varint payload
    Varint(u64),
    /// Byte range of a length-delimited payload within the reader's input
    Bytes(Range<usize>),
}

/// One decoded field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Full field key, wire type included
    pub key: u64,
    /// Field payload
    pub value: FieldValue,
}

/// Iterator over the tagged fields of a buffer.
///
/// Iteration ends at the end of input, at a truncated field, or at a key
/// with a wire type other than varint or bytes. Everything after such a
/// point is ignored, which callers observe as missing fields.
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> FieldReader<'a> {
    /// Read fields from `input[start..]`.
    ///
    /// Byte ranges in the yielded fields index into `input`.
    pub fn new(input: &'a [u8], start: usize) -> Self {
        Self { input, position: start.min(input.len()) }
    }

    fn next_field(&mut self) -> Option<Field> {
        let (key, key_length) = read_varint(&self.input[self.position..])?;
        let mut position = self.position + key_length;

        let value = match key & 0x7 {
            WIRE_VARINT => {
                let (value, length) = read_varint(&self.input[position..])?;
                position += length;
                FieldValue::Varint(value)
            },
            WIRE_BYTES => {
                let (length, prefix) = read_varint(&self.input[position..])?;
                let start = position + prefix;
                let remaining = self.input.len() - start;
                let length = usize::try_from(length).ok().filter(|&l| l <= remaining)?;
                position = start + length;
                FieldValue::Bytes(start..position)
            },
            _ => return None,
        };

        self.position = position;
        Some(Field { key, value })
    }
}

impl Iterator for FieldReader<'_> {
    type Item = Field;

    fn next(&mut self) -> Option<Field> {
        if self.position >= self.input.len() {
            return None;
        }

        let field = self.next_field();
        if field.is_none() {
            self.position = self.input.len();
        }
        field
    }
}

/// Append a length-delimited field and return the range its payload will
/// occupy once the caller has filled it.
///
/// The payload bytes are reserved as zeros.
pub fn push_bytes_field(output: &mut Vec<u8>, key: u8, length: usize) -> Range<usize> {
    output.push(key);
    push_varint(output, length as u64);
    let start = output.len();
    output.resize(start + length, 0);
    start..output.len()
}

/// Append a varint field.
pub fn push_varint_field(output: &mut Vec<u8>, key: u8, value: u64) {
    output.push(key);
    push_varint(output, value);
}

/// Encoded size of a length-delimited field with a one-byte key.
pub const fn bytes_field_length(length: usize) -> usize {
    1 + varint_length(length as u64) + length
}

/// Encoded size of a varint field with a one-byte key.
pub const fn varint_field_length(value: u64) -> usize {
    1 + varint_length(value)
}
