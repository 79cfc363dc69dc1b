//! Pairwise Olm session
//!
//! A session wraps a [`Ratchet`] with the handshake that seeds it. The
//! initiator ("Alice") claims one of the responder's one-time keys and
//! computes a triple Diffie-Hellman secret:
//!
//! ```text
//! Alice:  DH(I_A, E_B) ‖ DH(B_A, I_B) ‖ DH(B_A, E_B)
//! Bob:    DH(E_B, I_A) ‖ DH(I_B, B_A) ‖ DH(E_B, B_A)
//!
//! I = identity key   B = Alice's ephemeral base key   E = Bob's one-time key
//! ```
//!
//! Until Alice has decrypted something from Bob, every message she sends is
//! wrapped in a pre-key message carrying `E_B`, `B_A` and `I_A`, so Bob can
//! build his side of the session from whichever message reaches him first.

use olmkit_crypto::{
    CURVE25519_KEY_LENGTH, CURVE25519_RANDOM_LENGTH, Curve25519KeyPair, Curve25519PublicKey,
    MAC_LENGTH, base64, digest::sha256, memory,
};
use olmkit_proto::{
    DecodedPreKeyMessage, PickleError, decode_message, decode_prekey_message, encode_prekey_message,
    prekey_message_length,
};
use tracing::debug;
use zeroize::Zeroizing;

use crate::{
    account::Account,
    error::OlmError,
    pickle,
    ratchet::{OLM_PROTOCOL_VERSION, Ratchet},
};

/// Current session pickle version
pub const SESSION_PICKLE_VERSION: u32 = 1;

/// Random bytes consumed by [`Session::new_outbound`]: base key then the
/// first ratchet key
pub const OUTBOUND_SESSION_RANDOM_LENGTH: usize = 2 * CURVE25519_RANDOM_LENGTH;

/// Kind of an Olm message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Handshake-carrying message, sent until the peer has replied
    PreKey = 0,
    /// Plain ratchet message
    Message = 1,
}

impl TryFrom<usize> for MessageType {
    type Error = OlmError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::PreKey),
            1 => Ok(Self::Message),
            _ => Err(OlmError::BadMessageFormat),
        }
    }
}

/// An encrypted Olm message ready for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OlmMessage {
    /// How the receiver has to treat the body
    pub message_type: MessageType,
    /// Unpadded base64 message body
    pub body: String,
}

/// Pairwise Olm session.
///
/// # Invariants
///
/// - The three captured public keys never change, so the session id is
///   stable for the life of the session
/// - `received_message` only ever goes from false to true
pub struct Session {
    received_message: bool,
    alice_identity_key: Curve25519PublicKey,
    alice_base_key: Curve25519PublicKey,
    bob_one_time_key: Curve25519PublicKey,
    ratchet: Ratchet,
}

/// A pre-key message whose key fields are present and 32 bytes long.
struct PreKeyFields<'a> {
    one_time_key: Curve25519PublicKey,
    base_key: Curve25519PublicKey,
    identity_key: Option<Curve25519PublicKey>,
    message: &'a [u8],
}

/// Validate the fields of a decoded pre-key message.
///
/// The identity key may be absent only when the caller already knows it.
fn check_prekey_fields<'a>(
    decoded: &DecodedPreKeyMessage<'a>,
    have_their_identity_key: bool,
) -> Option<PreKeyFields<'a>> {
    let identity_key = match decoded.identity_key {
        Some(key) => Some(Curve25519PublicKey::from_slice(key).ok()?),
        None if have_their_identity_key => None,
        None => return None,
    };
    Some(PreKeyFields {
        one_time_key: Curve25519PublicKey::from_slice(decoded.one_time_key?).ok()?,
        base_key: Curve25519PublicKey::from_slice(decoded.base_key?).ok()?,
        identity_key,
        message: decoded.message?,
    })
}

fn decode_base64(message: &str) -> Result<Zeroizing<Vec<u8>>, OlmError> {
    base64::decode(message.as_bytes()).map(Zeroizing::new).map_err(|_| OlmError::InvalidBase64)
}

impl Session {
    /// Start a session with a peer whose identity key and one-time key we
    /// have fetched.
    ///
    /// `random` supplies [`OUTBOUND_SESSION_RANDOM_LENGTH`] bytes: the
    /// ephemeral base key from the first 32, the first ratchet key from the
    /// next 32.
    ///
    /// # Errors
    ///
    /// - `NotEnoughRandom` if `random` is too short
    pub fn new_outbound(
        account: &Account,
        their_identity_key: &Curve25519PublicKey,
        their_one_time_key: &Curve25519PublicKey,
        random: &[u8],
    ) -> Result<Self, OlmError> {
        let random = memory::load_prefix::<OUTBOUND_SESSION_RANDOM_LENGTH>(random)
            .map(Zeroizing::new)
            .ok_or(OlmError::NotEnoughRandom)?;
        let mut base_random = Zeroizing::new([0u8; CURVE25519_RANDOM_LENGTH]);
        base_random.copy_from_slice(&random[..CURVE25519_RANDOM_LENGTH]);
        let mut ratchet_random = Zeroizing::new([0u8; CURVE25519_RANDOM_LENGTH]);
        ratchet_random.copy_from_slice(&random[CURVE25519_RANDOM_LENGTH..]);

        let base_key = Curve25519KeyPair::from_random(&base_random);
        let ratchet_key = Curve25519KeyPair::from_random(&ratchet_random);
        let identity_key = &account.identity_keys().curve25519;

        let mut secret = Zeroizing::new([0u8; 3 * CURVE25519_KEY_LENGTH]);
        secret[..32].copy_from_slice(identity_key.shared_secret(their_one_time_key).as_slice());
        secret[32..64].copy_from_slice(base_key.shared_secret(their_identity_key).as_slice());
        secret[64..].copy_from_slice(base_key.shared_secret(their_one_time_key).as_slice());

        let session = Self {
            received_message: false,
            alice_identity_key: identity_key.public_key,
            alice_base_key: base_key.public_key,
            bob_one_time_key: *their_one_time_key,
            ratchet: Ratchet::initialise_as_alice(secret.as_slice(), ratchet_key),
        };
        debug!(session_id = %session.session_id(), "created outbound session");
        Ok(session)
    }

    /// Build the responder side of a session from a base64 pre-key message.
    ///
    /// The message is not decrypted; pass it to [`decrypt`](Self::decrypt)
    /// afterwards. The one-time key stays in the account until
    /// [`Account::remove_one_time_keys`] is called.
    ///
    /// # Errors
    ///
    /// - `InvalidBase64` if the message is not base64
    /// - `BadMessageVersion` if the version byte is wrong
    /// - `BadMessageFormat` if a key field is missing or the wrong size
    /// - `BadMessageKeyId` if the one-time key is not in `account`
    pub fn new_inbound(account: &Account, message: &str) -> Result<Self, OlmError> {
        Self::new_inbound_impl(account, None, message)
    }

    /// Like [`new_inbound`](Self::new_inbound), additionally requiring the
    /// message to come from `their_identity_key`.
    ///
    /// # Errors
    ///
    /// As [`new_inbound`](Self::new_inbound), plus `BadMessageKeyId` if the
    /// message names a different sender identity key.
    pub fn new_inbound_from(
        account: &Account,
        their_identity_key: &Curve25519PublicKey,
        message: &str,
    ) -> Result<Self, OlmError> {
        Self::new_inbound_impl(account, Some(their_identity_key), message)
    }

    fn new_inbound_impl(
        account: &Account,
        their_identity_key: Option<&Curve25519PublicKey>,
        message: &str,
    ) -> Result<Self, OlmError> {
        let input = decode_base64(message)?;
        let decoded = decode_prekey_message(&input);
        if decoded.version != OLM_PROTOCOL_VERSION {
            return Err(OlmError::BadMessageVersion);
        }
        let fields = check_prekey_fields(&decoded, their_identity_key.is_some())
            .ok_or(OlmError::BadMessageFormat)?;

        let alice_identity_key = match (fields.identity_key, their_identity_key) {
            (Some(claimed), Some(expected)) if !claimed.ct_eq(expected) => {
                debug!("pre-key message from unexpected identity key");
                return Err(OlmError::BadMessageKeyId);
            },
            (Some(claimed), _) => claimed,
            (None, Some(expected)) => *expected,
            (None, None) => unreachable!("identity key required when the caller has none"),
        };

        let inner = decode_message(fields.message, MAC_LENGTH);
        let their_ratchet_key = inner
            .ratchet_key
            .and_then(|key| Curve25519PublicKey::from_slice(key).ok())
            .ok_or(OlmError::BadMessageFormat)?;

        let Some(one_time_key) = account.lookup_key(&fields.one_time_key) else {
            debug!("pre-key message for unknown one-time key");
            return Err(OlmError::BadMessageKeyId);
        };
        let one_time_key = &one_time_key.key;
        let identity_key = &account.identity_keys().curve25519;

        let mut secret = Zeroizing::new([0u8; 3 * CURVE25519_KEY_LENGTH]);
        secret[..32].copy_from_slice(one_time_key.shared_secret(&alice_identity_key).as_slice());
        secret[32..64].copy_from_slice(identity_key.shared_secret(&fields.base_key).as_slice());
        secret[64..].copy_from_slice(one_time_key.shared_secret(&fields.base_key).as_slice());

        let session = Self {
            received_message: false,
            alice_identity_key,
            alice_base_key: fields.base_key,
            bob_one_time_key: fields.one_time_key,
            ratchet: Ratchet::initialise_as_bob(secret.as_slice(), their_ratchet_key),
        };
        debug!(session_id = %session.session_id(), "created inbound session");
        Ok(session)
    }

    /// Raw session id: SHA-256 over the three handshake public keys.
    pub fn session_id_bytes(&self) -> [u8; 32] {
        let mut input = [0u8; 3 * CURVE25519_KEY_LENGTH];
        input[..32].copy_from_slice(self.alice_identity_key.as_bytes());
        input[32..64].copy_from_slice(self.alice_base_key.as_bytes());
        input[64..].copy_from_slice(self.bob_one_time_key.as_bytes());
        sha256(&input)
    }

    /// Unpadded base64 session id.
    pub fn session_id(&self) -> String {
        base64::encode(&self.session_id_bytes())
    }

    /// Initiator's identity key.
    pub fn alice_identity_key(&self) -> &Curve25519PublicKey {
        &self.alice_identity_key
    }

    /// Initiator's ephemeral base key.
    pub fn alice_base_key(&self) -> &Curve25519PublicKey {
        &self.alice_base_key
    }

    /// Responder's one-time key the session was built on.
    pub fn bob_one_time_key(&self) -> &Curve25519PublicKey {
        &self.bob_one_time_key
    }

    /// Returns true once any message has been decrypted.
    pub fn has_received_message(&self) -> bool {
        self.received_message
    }

    /// Type the next [`encrypt`](Self::encrypt) will produce.
    pub fn encrypt_message_type(&self) -> MessageType {
        if self.received_message { MessageType::Message } else { MessageType::PreKey }
    }

    /// Random bytes the next [`encrypt`](Self::encrypt) needs.
    pub fn encrypt_random_length(&self) -> usize {
        self.ratchet.encrypt_random_length()
    }

    fn raw_message_length(&self, plaintext_length: usize) -> usize {
        let message_length = self.ratchet.encrypt_output_length(plaintext_length);
        if self.received_message {
            message_length
        } else {
            prekey_message_length(
                CURVE25519_KEY_LENGTH,
                CURVE25519_KEY_LENGTH,
                CURVE25519_KEY_LENGTH,
                message_length,
            )
        }
    }

    /// Length of the base64 body [`encrypt`](Self::encrypt) would produce.
    pub fn encrypt_message_length(&self, plaintext_length: usize) -> usize {
        base64::encoded_length(self.raw_message_length(plaintext_length))
    }

    /// Encrypt `plaintext` for the peer.
    ///
    /// # Errors
    ///
    /// - `NotEnoughRandom` if `random` is shorter than
    ///   [`encrypt_random_length`](Self::encrypt_random_length)
    pub fn encrypt(&mut self, plaintext: &[u8], random: &[u8]) -> Result<OlmMessage, OlmError> {
        let message = self.ratchet.encrypt(plaintext, random)?;
        let message_type = self.encrypt_message_type();

        let body = match message_type {
            MessageType::Message => base64::encode(&message),
            MessageType::PreKey => {
                let mut framed = encode_prekey_message(
                    OLM_PROTOCOL_VERSION,
                    self.bob_one_time_key.as_bytes(),
                    self.alice_base_key.as_bytes(),
                    self.alice_identity_key.as_bytes(),
                    message.len(),
                );
                framed.bytes[framed.payload].copy_from_slice(&message);
                base64::encode(&framed.bytes)
            },
        };

        Ok(OlmMessage { message_type, body })
    }

    /// Upper bound on the plaintext carried by a message.
    ///
    /// # Errors
    ///
    /// As [`decrypt`](Self::decrypt), except that no authentication happens.
    pub fn decrypt_max_plaintext_length(
        &self,
        message_type: MessageType,
        message: &str,
    ) -> Result<usize, OlmError> {
        let input = decode_base64(message)?;
        let inner = Self::unwrap_message(message_type, &input)?;
        self.ratchet.decrypt_max_plaintext_length(inner)
    }

    /// Find the ratchet message inside a decoded body.
    fn unwrap_message(message_type: MessageType, input: &[u8]) -> Result<&[u8], OlmError> {
        match message_type {
            MessageType::Message => Ok(input),
            MessageType::PreKey => {
                let decoded = decode_prekey_message(input);
                if decoded.version != OLM_PROTOCOL_VERSION {
                    return Err(OlmError::BadMessageVersion);
                }
                check_prekey_fields(&decoded, false)
                    .map(|fields| fields.message)
                    .ok_or(OlmError::BadMessageFormat)
            },
        }
    }

    /// Authenticate and decrypt a base64 message body.
    ///
    /// # Errors
    ///
    /// - `InvalidBase64` if the body is not base64
    /// - `BadMessageVersion` or `BadMessageFormat` for malformed framing
    /// - `BadMessageMac` if the message does not authenticate
    ///
    /// The session is unchanged on every error.
    pub fn decrypt(
        &mut self,
        message_type: MessageType,
        message: &str,
    ) -> Result<Zeroizing<Vec<u8>>, OlmError> {
        let input = decode_base64(message)?;
        let inner = Self::unwrap_message(message_type, &input)?;

        let plaintext = self.ratchet.decrypt(inner).inspect_err(|err| {
            debug!(session_id = %self.session_id(), error = err.code(), "session decrypt failed");
        })?;
        self.received_message = true;
        Ok(plaintext)
    }

    /// Returns true if the base64 pre-key `message` was sent to establish
    /// this session.
    ///
    /// Malformed messages do not match.
    ///
    /// # Errors
    ///
    /// - `InvalidBase64` if the message is not base64
    pub fn matches_inbound_session(&self, message: &str) -> Result<bool, OlmError> {
        self.matches_impl(None, message)
    }

    /// Like [`matches_inbound_session`](Self::matches_inbound_session),
    /// additionally requiring the session's initiator to be
    /// `their_identity_key`.
    ///
    /// # Errors
    ///
    /// - `InvalidBase64` if the message is not base64
    pub fn matches_inbound_session_from(
        &self,
        their_identity_key: &Curve25519PublicKey,
        message: &str,
    ) -> Result<bool, OlmError> {
        self.matches_impl(Some(their_identity_key), message)
    }

    fn matches_impl(
        &self,
        their_identity_key: Option<&Curve25519PublicKey>,
        message: &str,
    ) -> Result<bool, OlmError> {
        let input = decode_base64(message)?;
        let decoded = decode_prekey_message(&input);
        let Some(fields) = check_prekey_fields(&decoded, their_identity_key.is_some()) else {
            return Ok(false);
        };

        let mut same = true;
        if let Some(claimed) = fields.identity_key {
            same &= claimed.ct_eq(&self.alice_identity_key);
        }
        if let Some(expected) = their_identity_key {
            same &= expected.ct_eq(&self.alice_identity_key);
        }
        same &= fields.base_key.ct_eq(&self.alice_base_key);
        same &= fields.one_time_key.ct_eq(&self.bob_one_time_key);
        Ok(same)
    }

    /// One-line summary of the ratchet's chain indices.
    pub fn describe(&self) -> String {
        self.ratchet.describe()
    }

    /// Encrypted pickle of the session under `key`.
    pub fn pickle(&self, key: &[u8]) -> String {
        pickle::pickle_with(key, |writer| {
            writer
                .write_u32(SESSION_PICKLE_VERSION)
                .write_bool(self.received_message)
                .write(&self.alice_identity_key)
                .write(&self.alice_base_key)
                .write(&self.bob_one_time_key)
                .write(&self.ratchet);
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
            if version != SESSION_PICKLE_VERSION {
                return Err(PickleError::UnknownVersion { version }.into());
            }
            Ok(Self {
                received_message: reader.read_bool()?,
                alice_identity_key: reader.read()?,
                alice_base_key: reader.read()?,
                bob_one_time_key: reader.read()?,
                ratchet: reader.read()?,
            })
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id())
            .field("received_message", &self.received_message)
            .field("ratchet", &self.ratchet)
            .finish()
    }
}
