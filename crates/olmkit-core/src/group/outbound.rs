//! Sending side of a Megolm session

use olmkit_crypto::{
    Cipher, ED25519_RANDOM_LENGTH, ED25519_SIGNATURE_LENGTH, Ed25519KeyPair, MAC_LENGTH, base64,
    memory,
};
use olmkit_proto::{PickleError, encode_group_message, group_message_length};
use tracing::debug;
use zeroize::Zeroizing;

use super::{MEGOLM_CIPHER, MEGOLM_PROTOCOL_VERSION, session_key::encode_session_key};
use crate::{
    error::OlmError,
    megolm::{MEGOLM_RATCHET_LENGTH, Megolm},
    pickle,
};

/// Current outbound group session pickle version
pub const OUTBOUND_GROUP_PICKLE_VERSION: u32 = 1;

/// Random bytes consumed by [`OutboundGroupSession::new`]: ratchet state
/// then the signing key seed
pub const OUTBOUND_GROUP_SESSION_RANDOM_LENGTH: usize =
    MEGOLM_RATCHET_LENGTH + ED25519_RANDOM_LENGTH;

/// Megolm session we encrypt with.
///
/// # Invariants
///
/// - The ratchet advances after every message, so no index is used twice
pub struct OutboundGroupSession {
    ratchet: Megolm,
    signing_key: Ed25519KeyPair,
}

impl OutboundGroupSession {
    /// New session at index 0.
    ///
    /// # Errors
    ///
    /// - `NotEnoughRandom` if `random` is shorter than
    ///   [`OUTBOUND_GROUP_SESSION_RANDOM_LENGTH`]
    pub fn new(random: &[u8]) -> Result<Self, OlmError> {
        let random = memory::load_prefix::<OUTBOUND_GROUP_SESSION_RANDOM_LENGTH>(random)
            .map(Zeroizing::new)
            .ok_or(OlmError::NotEnoughRandom)?;
        let mut ratchet_random = Zeroizing::new([0u8; MEGOLM_RATCHET_LENGTH]);
        ratchet_random.copy_from_slice(&random[..MEGOLM_RATCHET_LENGTH]);
        let mut signing_random = Zeroizing::new([0u8; ED25519_RANDOM_LENGTH]);
        signing_random.copy_from_slice(&random[MEGOLM_RATCHET_LENGTH..]);

        let session = Self {
            ratchet: Megolm::new(&ratchet_random, 0),
            signing_key: Ed25519KeyPair::from_random(&signing_random),
        };
        debug!(session_id = %session.session_id(), "created outbound group session");
        Ok(session)
    }

    /// Base64 Ed25519 public key identifying the session.
    pub fn session_id(&self) -> String {
        self.signing_key.public_key.to_base64()
    }

    /// Index the next message will be encrypted at.
    pub fn message_index(&self) -> u32 {
        self.ratchet.counter()
    }

    /// Signed base64 session key at the current index, for sharing with
    /// recipients.
    pub fn session_key(&self) -> String {
        encode_session_key(&self.ratchet, &self.signing_key)
    }

    fn raw_message_length(&self, plaintext_length: usize) -> usize {
        group_message_length(
            self.ratchet.counter(),
            MEGOLM_CIPHER.ciphertext_length(plaintext_length),
            MAC_LENGTH,
            ED25519_SIGNATURE_LENGTH,
        )
    }

    /// Length of the base64 message [`encrypt`](Self::encrypt) would
    /// produce.
    pub fn encrypt_message_length(&self, plaintext_length: usize) -> usize {
        base64::encoded_length(self.raw_message_length(plaintext_length))
    }

    /// Encrypt `plaintext` at the current index and advance the ratchet.
    ///
    /// Returns the base64 message.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> String {
        let mut framed = encode_group_message(
            MEGOLM_PROTOCOL_VERSION,
            self.ratchet.counter(),
            MEGOLM_CIPHER.ciphertext_length(plaintext.len()),
            MAC_LENGTH,
            ED25519_SIGNATURE_LENGTH,
        );
        let Ok(mac_end) = MEGOLM_CIPHER.encrypt(
            self.ratchet.data(),
            plaintext,
            &mut framed.bytes,
            framed.payload.start,
        ) else {
            unreachable!("framed message has room for ciphertext and MAC");
        };

        self.ratchet.advance();

        let signature = self.signing_key.sign(&framed.bytes[..mac_end]);
        framed.bytes[mac_end..].copy_from_slice(&signature);
        base64::encode(&framed.bytes)
    }

    /// Encrypted pickle of the session under `key`.
    pub fn pickle(&self, key: &[u8]) -> String {
        pickle::pickle_with(key, |writer| {
            writer
                .write_u32(OUTBOUND_GROUP_PICKLE_VERSION)
                .write(&self.ratchet)
                .write(&self.signing_key);
        })
    }

    /// Restore a session from an encrypted pickle.
    ///
    /// # Errors
    ///
    /// - `InvalidBase64` or `BadAccountKey` if the pickle cannot be decrypted
    /// - `UnknownPickleVersion` for an unsupported version
    /// - `CorruptedPickle` if the content is malformed
    pub fn from_pickle(key: &[u8], pickle: &str) -> Result<Self, OlmError> {
        pickle::unpickle_with(key, pickle, |reader| {
            let version = reader.read_u32()?;
            if version != OUTBOUND_GROUP_PICKLE_VERSION {
                return Err(PickleError::UnknownVersion { version }.into());
            }
            Ok(Self { ratchet: reader.read()?, signing_key: reader.read()? })
        })
    }
}

impl std::fmt::Debug for OutboundGroupSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundGroupSession")
            .field("session_id", &self.session_id())
            .field("message_index", &self.message_index())
            .finish_non_exhaustive()
    }
}
