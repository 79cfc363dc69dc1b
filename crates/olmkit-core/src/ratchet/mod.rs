//! Olm double ratchet
//!
//! Combines a Diffie-Hellman ratchet (a new Curve25519 key pair every time
//! the conversation changes direction) with per-chain symmetric ratchets
//! ([`ChainKey`]). Each direction change mixes a fresh shared secret into
//! the root key; each message consumes one message key.
//!
//! # Key Lifecycle
//!
//! ```text
//! triple-DH secret ─HKDF("OLM_ROOT")──► root key ‖ first chain key
//!
//! root key + ECDH(our ratchet, their ratchet)
//!        ─HKDF("OLM_RATCHET")──► next root key ‖ new chain key
//!
//! chain key ─HMAC(0x01)─► message key ─HKDF("OLM_KEYS")─► AES ‖ HMAC ‖ IV
//!           ─HMAC(0x02)─► next chain key
//! ```
//!
//! # States
//!
//! | sender chain | receiver chains | state |
//! |---|---|---|
//! | yes | none | initialised as Alice, nothing received yet |
//! | none | ≥ 1 | initialised as Bob, or received a new chain since last send |
//! | yes | ≥ 1 | established |
//!
//! A ratchet always has at least one chain. A missing sender chain is
//! created lazily on the next [`Ratchet::encrypt`] against the newest
//! receiver chain.
//!
//! # Security
//!
//! - Every decrypt authenticates before any state changes. A failed MAC
//!   leaves the ratchet exactly as it was.
//! - Fast-forwarding within a chain is capped at [`MAX_MESSAGE_GAP`] steps,
//!   and the number of retained chains and skipped keys is bounded, so a
//!   peer cannot make us do or keep unbounded work.

mod chain;

pub use chain::{
    ChainKey, MessageKey, ReceiverChain, SHARED_KEY_LENGTH, SenderChain, SkippedMessageKey,
};
use olmkit_crypto::{
    AesSha256Cipher, CURVE25519_KEY_LENGTH, CURVE25519_RANDOM_LENGTH, Cipher, Curve25519KeyPair,
    Curve25519PublicKey, MAC_LENGTH, digest::hkdf_sha256, memory,
};
use olmkit_proto::{
    Pickle, PickleError, PickleReader, PickleWriter, Unpickle, decode_message, encode_message,
    message_length,
};
use tracing::debug;
use zeroize::Zeroizing;

use crate::{error::OlmError, list::BoundedList};

/// Olm message protocol version
pub const OLM_PROTOCOL_VERSION: u8 = 3;

/// Receiver chains kept to tolerate reordering across ratchet steps
pub const MAX_RECEIVER_CHAINS: usize = 5;

/// Skipped message keys kept for out-of-order messages
pub const MAX_SKIPPED_MESSAGE_KEYS: usize = 40;

/// Largest jump ahead within a chain that decryption will compute
pub const MAX_MESSAGE_GAP: u32 = 2000;

/// HKDF info for the initial root key
const ROOT_KDF_INFO: &[u8] = b"OLM_ROOT";

/// HKDF info for each ratchet step
const RATCHET_KDF_INFO: &[u8] = b"OLM_RATCHET";

/// Cipher for message payloads
pub(crate) const OLM_CIPHER: AesSha256Cipher = AesSha256Cipher::new(b"OLM_KEYS");

type SharedKey = Zeroizing<[u8; SHARED_KEY_LENGTH]>;

/// Double ratchet state for one pairwise session.
pub struct Ratchet {
    root_key: SharedKey,
    sender_chain: Option<SenderChain>,
    receiver_chains: BoundedList<ReceiverChain, MAX_RECEIVER_CHAINS>,
    skipped_message_keys: BoundedList<SkippedMessageKey, MAX_SKIPPED_MESSAGE_KEYS>,
}

/// Split 64 bytes of HKDF output into a root key and a chain key at index 0.
fn split_root_output(derived: &[u8; 2 * SHARED_KEY_LENGTH]) -> (SharedKey, ChainKey) {
    let mut root_key = Zeroizing::new([0u8; SHARED_KEY_LENGTH]);
    root_key.copy_from_slice(&derived[..SHARED_KEY_LENGTH]);

    let mut chain_key = [0u8; SHARED_KEY_LENGTH];
    chain_key.copy_from_slice(&derived[SHARED_KEY_LENGTH..]);
    (root_key, ChainKey::new(chain_key, 0))
}

/// Derive a root key and first chain key from the handshake secret.
fn derive_initial_keys(shared_secret: &[u8]) -> (SharedKey, ChainKey) {
    let mut derived = Zeroizing::new([0u8; 2 * SHARED_KEY_LENGTH]);
    let Ok(()) = hkdf_sha256(shared_secret, &[], ROOT_KDF_INFO, derived.as_mut_slice()) else {
        unreachable!("64 bytes is within the HKDF output limit");
    };
    split_root_output(&derived)
}

/// Take a ratchet step: mix a fresh ECDH secret into the root key.
fn create_chain_key(
    root_key: &[u8; SHARED_KEY_LENGTH],
    our_key: &Curve25519KeyPair,
    their_key: &Curve25519PublicKey,
) -> (SharedKey, ChainKey) {
    let secret = our_key.shared_secret(their_key);
    let mut derived = Zeroizing::new([0u8; 2 * SHARED_KEY_LENGTH]);
    let Ok(()) = hkdf_sha256(secret.as_slice(), root_key, RATCHET_KDF_INFO, derived.as_mut_slice())
    else {
        unreachable!("64 bytes is within the HKDF output limit");
    };
    split_root_output(&derived)
}

/// Authenticate and decrypt a message with a single message key.
fn decrypt_with_key(
    message_key: &MessageKey,
    input: &[u8],
    ciphertext: std::ops::Range<usize>,
) -> Result<Zeroizing<Vec<u8>>, OlmError> {
    let mut plaintext =
        Zeroizing::new(vec![0u8; OLM_CIPHER.max_plaintext_length(ciphertext.len())]);
    let length = OLM_CIPHER
        .decrypt(message_key.key(), input, ciphertext, &mut plaintext)
        .map_err(|_| OlmError::BadMessageMac)?;
    plaintext.truncate(length);
    Ok(plaintext)
}

impl Ratchet {
    /// Ratchet for the session initiator.
    ///
    /// Starts with a single sender chain using `our_ratchet_key`.
    pub fn initialise_as_alice(shared_secret: &[u8], our_ratchet_key: Curve25519KeyPair) -> Self {
        let (root_key, chain_key) = derive_initial_keys(shared_secret);
        Self {
            root_key,
            sender_chain: Some(SenderChain { ratchet_key: our_ratchet_key, chain_key }),
            receiver_chains: BoundedList::new(),
            skipped_message_keys: BoundedList::new(),
        }
    }

    /// Ratchet for the session responder.
    ///
    /// Starts with a single receiver chain for `their_ratchet_key`.
    pub fn initialise_as_bob(shared_secret: &[u8], their_ratchet_key: Curve25519PublicKey) -> Self {
        let (root_key, chain_key) = derive_initial_keys(shared_secret);
        let mut receiver_chains = BoundedList::new();
        receiver_chains.insert_front(ReceiverChain { ratchet_key: their_ratchet_key, chain_key });
        Self {
            root_key,
            sender_chain: None,
            receiver_chains,
            skipped_message_keys: BoundedList::new(),
        }
    }

    /// Current sending chain, if one exists.
    pub fn sender_chain(&self) -> Option<&SenderChain> {
        self.sender_chain.as_ref()
    }

    /// Receiver chains, newest first.
    pub fn receiver_chains(&self) -> &BoundedList<ReceiverChain, MAX_RECEIVER_CHAINS> {
        &self.receiver_chains
    }

    /// Skipped message keys, newest first.
    pub fn skipped_message_keys(
        &self,
    ) -> &BoundedList<SkippedMessageKey, MAX_SKIPPED_MESSAGE_KEYS> {
        &self.skipped_message_keys
    }

    /// Random bytes the next [`encrypt`](Self::encrypt) needs.
    pub fn encrypt_random_length(&self) -> usize {
        if self.sender_chain.is_some() { 0 } else { CURVE25519_RANDOM_LENGTH }
    }

    /// Length of the message [`encrypt`](Self::encrypt) would produce for
    /// `plaintext_length` bytes.
    pub fn encrypt_output_length(&self, plaintext_length: usize) -> usize {
        let counter = self.sender_chain.as_ref().map_or(0, |chain| chain.chain_key.index());
        message_length(
            CURVE25519_KEY_LENGTH,
            counter,
            OLM_CIPHER.ciphertext_length(plaintext_length),
            MAC_LENGTH,
        )
    }

    /// Encrypt `plaintext` into a normal Olm message.
    ///
    /// `random` is only read when a new sender chain has to be created, see
    /// [`encrypt_random_length`](Self::encrypt_random_length).
    ///
    /// # Errors
    ///
    /// - `NotEnoughRandom` if a new chain is needed and `random` is too short
    pub fn encrypt(&mut self, plaintext: &[u8], random: &[u8]) -> Result<Vec<u8>, OlmError> {
        if random.len() < self.encrypt_random_length() {
            return Err(OlmError::NotEnoughRandom);
        }

        if self.sender_chain.is_none() {
            self.start_sender_chain(random)?;
        }
        let Some(sender_chain) = self.sender_chain.as_mut() else {
            unreachable!("sender chain created above");
        };

        let message_key = sender_chain.chain_key.message_key();
        sender_chain.chain_key.advance();

        let mut framed = encode_message(
            OLM_PROTOCOL_VERSION,
            sender_chain.ratchet_key.public_key.as_bytes(),
            message_key.index(),
            OLM_CIPHER.ciphertext_length(plaintext.len()),
            MAC_LENGTH,
        );
        OLM_CIPHER.encrypt(message_key.key(), plaintext, &mut framed.bytes, framed.payload.start)?;

        Ok(framed.bytes)
    }

    fn start_sender_chain(&mut self, random: &[u8]) -> Result<(), OlmError> {
        let random = memory::load_prefix::<CURVE25519_RANDOM_LENGTH>(random)
            .map(Zeroizing::new)
            .ok_or(OlmError::NotEnoughRandom)?;
        let ratchet_key = Curve25519KeyPair::from_random(&random);

        let Some(their_chain) = self.receiver_chains.first() else {
            unreachable!("a ratchet without a sender chain always has a receiver chain");
        };
        let (root_key, chain_key) =
            create_chain_key(&self.root_key, &ratchet_key, &their_chain.ratchet_key);

        debug!(
            receiver_chains = self.receiver_chains.len(),
            "ratchet step: starting new sender chain"
        );
        self.root_key = root_key;
        self.sender_chain = Some(SenderChain { ratchet_key, chain_key });
        Ok(())
    }

    /// Upper bound on the plaintext carried by `input`.
    pub fn decrypt_max_plaintext_length(&self, input: &[u8]) -> Result<usize, OlmError> {
        let decoded = decode_message(input, MAC_LENGTH);
        if decoded.version != OLM_PROTOCOL_VERSION {
            return Err(OlmError::BadMessageVersion);
        }
        let ciphertext = decoded.ciphertext.ok_or(OlmError::BadMessageFormat)?;
        Ok(OLM_CIPHER.max_plaintext_length(ciphertext.len()))
    }

    /// Authenticate and decrypt a normal Olm message.
    ///
    /// # Errors
    ///
    /// - `BadMessageVersion` if the version byte is not
    ///   [`OLM_PROTOCOL_VERSION`]
    /// - `BadMessageFormat` if a field is missing or the ratchet key is not
    ///   32 bytes
    /// - `BadMessageMac` if no key we hold or can derive authenticates the
    ///   message. This covers forgeries, replays of consumed indices,
    ///   indices older than the skipped-key window, gaps larger than
    ///   [`MAX_MESSAGE_GAP`], and new chains before we have ever sent.
    ///
    /// The ratchet is unchanged on every error.
    pub fn decrypt(&mut self, input: &[u8]) -> Result<Zeroizing<Vec<u8>>, OlmError> {
        let decoded = decode_message(input, MAC_LENGTH);
        if decoded.version != OLM_PROTOCOL_VERSION {
            return Err(OlmError::BadMessageVersion);
        }
        let (Some(ratchet_key), Some(counter), Some(ciphertext)) =
            (decoded.ratchet_key, decoded.counter, decoded.ciphertext)
        else {
            return Err(OlmError::BadMessageFormat);
        };
        let their_key =
            Curve25519PublicKey::from_slice(ratchet_key).map_err(|_| OlmError::BadMessageFormat)?;

        let chain_index =
            self.receiver_chains.position(|chain| chain.ratchet_key.ct_eq(&their_key));
        match chain_index {
            None => self.decrypt_for_new_chain(input, their_key, counter, ciphertext),
            Some(index) => {
                let chain_key = match self.receiver_chains.get(index) {
                    Some(chain) => chain.chain_key.clone(),
                    None => unreachable!("index returned by position"),
                };
                if chain_key.index() > counter {
                    self.decrypt_with_skipped_key(input, &their_key, counter, ciphertext)
                } else {
                    let plaintext =
                        Self::decrypt_for_existing_chain(&chain_key, input, counter, ciphertext)
                            .inspect_err(|_| debug!(counter, "decrypt failed on existing chain"))?;
                    self.advance_receiver_chain(index, counter);
                    Ok(plaintext)
                }
            },
        }
    }

    fn decrypt_for_existing_chain(
        chain_key: &ChainKey,
        input: &[u8],
        counter: u32,
        ciphertext: std::ops::Range<usize>,
    ) -> Result<Zeroizing<Vec<u8>>, OlmError> {
        if counter - chain_key.index() > MAX_MESSAGE_GAP {
            return Err(OlmError::BadMessageMac);
        }

        let mut chain_key = chain_key.clone();
        while chain_key.index() < counter {
            chain_key.advance();
        }
        decrypt_with_key(&chain_key.message_key(), input, ciphertext)
    }

    fn decrypt_with_skipped_key(
        &mut self,
        input: &[u8],
        their_key: &Curve25519PublicKey,
        counter: u32,
        ciphertext: std::ops::Range<usize>,
    ) -> Result<Zeroizing<Vec<u8>>, OlmError> {
        let position = self.skipped_message_keys.position(|skipped| {
            skipped.message_key.index() == counter && skipped.ratchet_key.ct_eq(their_key)
        });
        let Some(position) = position else {
            debug!(counter, "decrypt failed: message key already consumed or evicted");
            return Err(OlmError::BadMessageMac);
        };
        let Some(skipped) = self.skipped_message_keys.get(position) else {
            unreachable!("index returned by position");
        };

        let plaintext = decrypt_with_key(&skipped.message_key, input, ciphertext)
            .inspect_err(|_| debug!(counter, "decrypt failed with skipped key"))?;
        self.skipped_message_keys.remove(position);
        Ok(plaintext)
    }

    fn decrypt_for_new_chain(
        &mut self,
        input: &[u8],
        their_key: Curve25519PublicKey,
        counter: u32,
        ciphertext: std::ops::Range<usize>,
    ) -> Result<Zeroizing<Vec<u8>>, OlmError> {
        // They must not start a new chain before we have sent on ours.
        let Some(sender_chain) = self.sender_chain.as_ref() else {
            debug!("decrypt failed: new chain while we have no sender chain");
            return Err(OlmError::BadMessageMac);
        };
        if counter > MAX_MESSAGE_GAP {
            debug!(counter, "decrypt failed: message gap too large on new chain");
            return Err(OlmError::BadMessageMac);
        }

        let (root_key, chain_key) =
            create_chain_key(&self.root_key, &sender_chain.ratchet_key, &their_key);
        let plaintext = Self::decrypt_for_existing_chain(&chain_key, input, counter, ciphertext)
            .inspect_err(|_| debug!(counter, "decrypt failed on new chain"))?;

        debug!(counter, "ratchet step: accepted new receiver chain");
        if self
            .receiver_chains
            .insert_front(ReceiverChain { ratchet_key: their_key, chain_key })
            .is_some()
        {
            debug!("evicted oldest receiver chain");
        }
        self.root_key = root_key;
        self.sender_chain = None;
        self.advance_receiver_chain(0, counter);

        Ok(plaintext)
    }

    /// Move a receiver chain past `counter`, keeping the keys it skips.
    fn advance_receiver_chain(&mut self, index: usize, counter: u32) {
        let Some(chain) = self.receiver_chains.get_mut(index) else {
            unreachable!("receiver chain index is valid");
        };

        let mut evicted = 0usize;
        while chain.chain_key.index() < counter {
            let skipped = SkippedMessageKey {
                ratchet_key: chain.ratchet_key,
                message_key: chain.chain_key.message_key(),
            };
            if self.skipped_message_keys.insert_front(skipped).is_some() {
                evicted += 1;
            }
            chain.chain_key.advance();
        }
        chain.chain_key.advance();

        if evicted > 0 {
            debug!(evicted, "evicted skipped message keys");
        }
    }

    /// One-line summary of chain indices for debugging.
    pub fn describe(&self) -> String {
        use std::fmt::Write;

        let mut description = String::from("sender chain index: ");
        if let Some(chain) = &self.sender_chain {
            let _ = write!(description, "{}", chain.chain_key.index());
        }
        description.push_str(" receiver chain indices:");
        for chain in &self.receiver_chains {
            let _ = write!(description, " {}", chain.chain_key.index());
        }
        description.push_str(" skipped message keys:");
        for skipped in &self.skipped_message_keys {
            let _ = write!(description, " {}", skipped.message_key.index());
        }
        description
    }
}

/// Root key, then the sender chain as a list of zero or one, then the
/// receiver chains and skipped keys.
impl Pickle for Ratchet {
    fn pickle(&self, writer: &mut PickleWriter) {
        writer
            .write_bytes(self.root_key.as_slice())
            .write_list(self.sender_chain.iter())
            .write(&self.receiver_chains)
            .write(&self.skipped_message_keys);
    }
}

impl Unpickle for Ratchet {
    fn unpickle(reader: &mut PickleReader<'_>) -> Result<Self, PickleError> {
        let root_key = Zeroizing::new(reader.read_array()?);
        let sender_chain = reader.read_list::<SenderChain>(1)?.into_iter().next();
        let receiver_chains: BoundedList<ReceiverChain, MAX_RECEIVER_CHAINS> = reader.read()?;
        let skipped_message_keys = reader.read()?;

        if sender_chain.is_none() && receiver_chains.is_empty() {
            return Err(PickleError::InvalidValue { field: "ratchet chains" });
        }

        Ok(Self { root_key, sender_chain, receiver_chains, skipped_message_keys })
    }
}

impl std::fmt::Debug for Ratchet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ratchet").field("state", &self.describe()).finish_non_exhaustive()
    }
}
