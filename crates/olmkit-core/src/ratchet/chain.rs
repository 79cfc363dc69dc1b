//! Chain keys, message keys and the chains that hold them
//!
//! A chain key at index `i` yields two independent HMAC outputs: the message
//! key for index `i` and the chain key for index `i + 1`. Advancing
//! overwrites the old chain key, so a captured chain key reveals nothing
//! about earlier messages.

use olmkit_crypto::{Curve25519KeyPair, Curve25519PublicKey, digest::hmac_sha256};
use olmkit_proto::{Pickle, PickleError, PickleReader, PickleWriter, Unpickle};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// HMAC input for deriving a message key
const MESSAGE_KEY_SEED: &[u8] = &[0x01];

/// HMAC input for deriving the next chain key
const CHAIN_KEY_SEED: &[u8] = &[0x02];

/// Length of root, chain and message keys
pub const SHARED_KEY_LENGTH: usize = 32;

/// Forward-ratcheting chain key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ChainKey {
    key: [u8; SHARED_KEY_LENGTH],
    #[zeroize(skip)]
    index: u32,
}

impl ChainKey {
    /// Chain key with the given bytes at `index`.
    pub fn new(key: [u8; SHARED_KEY_LENGTH], index: u32) -> Self {
        Self { key, index }
    }

    /// Index of the next message key this chain will produce.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Message key for the current index.
    pub fn message_key(&self) -> MessageKey {
        MessageKey { key: hmac_sha256(&self.key, MESSAGE_KEY_SEED), index: self.index }
    }

    /// Replace this chain key with the one for the next index.
    pub fn advance(&mut self) {
        let mut next = hmac_sha256(&self.key, CHAIN_KEY_SEED);
        self.key.copy_from_slice(&next);
        next.zeroize();
        self.index = self.index.wrapping_add(1);
    }
}

/// Single-use key for one message.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MessageKey {
    key: [u8; SHARED_KEY_LENGTH],
    #[zeroize(skip)]
    index: u32,
}

impl MessageKey {
    /// Key bytes, input to the message cipher.
    pub fn key(&self) -> &[u8; SHARED_KEY_LENGTH] {
        &self.key
    }

    /// Chain index this key belongs to.
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// Our current sending chain and the ratchet key pair it was derived with.
#[derive(Clone)]
pub struct SenderChain {
    /// Ratchet key pair advertised in every message on this chain
    pub ratchet_key: Curve25519KeyPair,
    /// Next chain key
    pub chain_key: ChainKey,
}

/// A chain the other side is sending on.
#[derive(Clone)]
pub struct ReceiverChain {
    /// Their ratchet public key for this chain
    pub ratchet_key: Curve25519PublicKey,
    /// Next chain key we have not consumed
    pub chain_key: ChainKey,
}

/// A message key derived while skipping ahead in a receiver chain.
#[derive(Clone)]
pub struct SkippedMessageKey {
    /// Ratchet key of the chain the key belongs to
    pub ratchet_key: Curve25519PublicKey,
    /// The unused message key
    pub message_key: MessageKey,
}

/// Key bytes followed by the index.
impl Pickle for ChainKey {
    fn pickle(&self, writer: &mut PickleWriter) {
        writer.write_bytes(&self.key).write_u32(self.index);
    }
}

impl Unpickle for ChainKey {
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError> {
        let key = reader.read_array()?;
        let index = reader.read_u32()?;
        Ok(Self { key, index })
    }
}

/// Key bytes followed by the index.
impl Pickle for MessageKey {
    fn pickle(&self, writer: &mut PickleWriter) {
        writer.write_bytes(&self.key).write_u32(self.index);
    }
}

impl Unpickle for MessageKey {
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError> {
        let key = reader.read_array()?;
        let index = reader.read_u32()?;
        Ok(Self { key, index })
    }
}

impl Pickle for SenderChain {
    fn pickle(&self, writer: &mut PickleWriter) {
        writer.write(&self.ratchet_key).write(&self.chain_key);
    }
}

impl Unpickle for SenderChain {
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError> {
        Ok(Self { ratchet_key: reader.read()?, chain_key: reader.read()? })
    }
}

impl Pickle for ReceiverChain {
    fn pickle(&self, writer: &mut PickleWriter) {
        writer.write(&self.ratchet_key).write(&self.chain_key);
    }
}

impl Unpickle for ReceiverChain {
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError> {
        Ok(Self { ratchet_key: reader.read()?, chain_key: reader.read()? })
    }
}

impl Pickle for SkippedMessageKey {
    fn pickle(&self, writer: &mut PickleWriter) {
        writer.write(&self.ratchet_key).write(&self.message_key);
    }
}

impl Unpickle for SkippedMessageKey {
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError> {
        Ok(Self { ratchet_key: reader.read()?, message_key: reader.read()? })
    }
}
