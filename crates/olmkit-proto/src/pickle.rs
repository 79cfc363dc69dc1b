//! Flat binary pickle encoding
//!
//! Values are written back to back with no field tags: `u32` as 4 bytes big
//! endian, `bool` and `u8` as one byte, fixed-size keys as their raw bytes,
//! lists as a `u32` count followed by the entries. Objects start with a
//! `u32` version tag chosen by the object.
//!
//! The raw pickle holds private keys, so both the writer buffer and the
//! reader's source are expected to be zeroized by their owners.

use olmkit_crypto::{
    CURVE25519_KEY_LENGTH, Curve25519KeyPair, Curve25519PrivateKey, Curve25519PublicKey,
    ED25519_PRIVATE_KEY_LENGTH, ED25519_PUBLIC_KEY_LENGTH, Ed25519KeyPair, Ed25519PrivateKey,
    Ed25519PublicKey,
};
use zeroize::Zeroizing;

use crate::error::PickleError;

/// Types that can be appended to a pickle.
pub trait Pickle {
    /// Append the encoding of `self`.
    fn pickle(&self, writer: &mut PickleWriter);
}

/// Types that can be read back from a pickle.
pub trait Unpickle: Sized {
    /// Read one value from the front of the reader.
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError>;
}

/// Growable pickle buffer that is wiped on drop.
#[derive(Default)]
pub struct PickleWriter {
    buffer: Zeroizing<Vec<u8>>,
}

impl PickleWriter {
    /// Empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append any picklable value.
    pub fn write<T: Pickle + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.pickle(self);
        self
    }

    /// Append a big-endian `u32`.
    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append a single byte.
    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    /// Append a boolean as `0` or `1`.
    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.write_u8(u8::from(value))
    }

    /// Append raw bytes with no length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    /// Append a `u32` count followed by every item.
    pub fn write_list<'a, T: Pickle + 'a>(
        &mut self,
        items: impl ExactSizeIterator<Item = &'a T>,
    ) -> &mut Self {
        self.write_u32(items.len() as u32);
        for item in items {
            item.pickle(self);
        }
        self
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Finished pickle.
    pub fn into_bytes(self) -> Zeroizing<Vec<u8>> {
        self.buffer
    }
}

/// Cursor over a raw pickle.
#[derive(Debug)]
pub struct PickleReader<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> PickleReader<'a> {
    /// Read from the start of `input`.
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, position: 0 }
    }

    /// Read any unpicklable value.
    pub fn read<T: Unpickle>(&mut self) -> Result<T, PickleError> {
        T::unpickle(self)
    }

    /// Take the next `length` bytes.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8], PickleError> {
        let remaining = self.remaining();
        if remaining < length {
            return Err(PickleError::Truncated { needed: length, remaining });
        }

        let bytes = &self.input[self.position..self.position + length];
        self.position += length;
        Ok(bytes)
    }

    /// Take the next `N` bytes as an array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], PickleError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.read_bytes(N)?);
        Ok(array)
    }

    /// Read a big-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, PickleError> {
        self.read_array().map(u32::from_be_bytes)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, PickleError> {
        let [byte] = self.read_array()?;
        Ok(byte)
    }

    /// Read a boolean. Only `0` and `1` are accepted.
    pub fn read_bool(&mut self) -> Result<bool, PickleError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(PickleError::InvalidValue { field: "bool" }),
        }
    }

    /// Read a list count, rejecting counts above `max`.
    pub fn read_count(&mut self, max: usize) -> Result<usize, PickleError> {
        let count = self.read_u32()?;
        usize::try_from(count)
            .ok()
            .filter(|&count| count <= max)
            .ok_or(PickleError::ListTooLong { count, max })
    }

    /// Read a counted list of at most `max` items.
    pub fn read_list<T: Unpickle>(&mut self, max: usize) -> Result<Vec<T>, PickleError> {
        let count = self.read_count(max)?;
        (0..count).map(|_| T::unpickle(self)).collect()
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.input.len() - self.position
    }

    /// Require that the whole pickle has been read.
    pub fn finish(&self) -> Result<(), PickleError> {
        match self.remaining() {
            0 => Ok(()),
            count => Err(PickleError::TrailingBytes { count }),
        }
    }
}

impl Pickle for u32 {
    fn pickle(&self, writer: &mut PickleWriter) {
        writer.write_u32(*self);
    }
}

impl Unpickle for u32 {
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError> {
        reader.read_u32()
    }
}

impl Pickle for bool {
    fn pickle(&self, writer: &mut PickleWriter) {
        writer.write_bool(*self);
    }
}

impl Unpickle for bool {
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError> {
        reader.read_bool()
    }
}

impl<const N: usize> Pickle for [u8; N] {
    fn pickle(&self, writer: &mut PickleWriter) {
        writer.write_bytes(self);
    }
}

impl<const N: usize> Unpickle for [u8; N] {
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError> {
        reader.read_array()
    }
}

impl Pickle for Curve25519PublicKey {
    fn pickle(&self, writer: &mut PickleWriter) {
        writer.write_bytes(&self.0);
    }
}

impl Unpickle for Curve25519PublicKey {
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError> {
        reader.read_array::<CURVE25519_KEY_LENGTH>().map(Self)
    }
}

/// Public key followed by private key.
impl Pickle for Curve25519KeyPair {
    fn pickle(&self, writer: &mut PickleWriter) {
        writer.write(&self.public_key).write_bytes(&self.private_key.0);
    }
}

impl Unpickle for Curve25519KeyPair {
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError> {
        let public_key = reader.read()?;
        let private_key = Curve25519PrivateKey(reader.read_array()?);
        Ok(Self { public_key, private_key })
    }
}

impl Pickle for Ed25519PublicKey {
    fn pickle(&self, writer: &mut PickleWriter) {
        writer.write_bytes(&self.0);
    }
}

impl Unpickle for Ed25519PublicKey {
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError> {
        reader.read_array::<ED25519_PUBLIC_KEY_LENGTH>().map(Self)
    }
}

/// Public key followed by the 64-byte private key.
impl Pickle for Ed25519KeyPair {
    fn pickle(&self, writer: &mut PickleWriter) {
        writer.write(&self.public_key).write_bytes(&self.private_key.0);
    }
}

impl Unpickle for Ed25519KeyPair {
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError> {
        let public_key = reader.read()?;
        let private_key = Ed25519PrivateKey(reader.read_array::<ED25519_PRIVATE_KEY_LENGTH>()?);
        Ed25519KeyPair::from_parts(public_key, private_key)
            .ok_or(PickleError::InvalidValue { field: "ed25519 key pair" })
    }
}
