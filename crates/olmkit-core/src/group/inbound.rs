//! Receiving side of a Megolm session
//!
//! Two ratchet snapshots are kept. `initial_ratchet` is the earliest state
//! we were given and never moves; `latest_ratchet` follows the newest index
//! decrypted so far. In-order messages fast-forward `latest_ratchet`;
//! late messages are decrypted with a throwaway copy of `initial_ratchet`.

use olmkit_crypto::{Cipher, ED25519_SIGNATURE_LENGTH, Ed25519PublicKey, MAC_LENGTH, base64};
use olmkit_proto::{PickleError, decode_group_message};
use tracing::debug;
use zeroize::Zeroizing;

use super::{
    MEGOLM_CIPHER, MEGOLM_PROTOCOL_VERSION,
    session_key::{SharedSession, decode_session_export, decode_session_key, encode_session_export},
};
use crate::{error::OlmError, megolm::Megolm, pickle};

/// Current inbound group session pickle version
pub const INBOUND_GROUP_PICKLE_VERSION: u32 = 2;

/// Indices within this distance ahead of a ratchet count as "after" it
const HALF_RANGE: u32 = 1 << 31;

/// Megolm session we decrypt with.
///
/// # Invariants
///
/// - `initial_ratchet` never changes after construction
/// - `latest_ratchet` is never behind `initial_ratchet`
pub struct InboundGroupSession {
    initial_ratchet: Megolm,
    latest_ratchet: Megolm,
    signing_key: Ed25519PublicKey,
    verified: bool,
}

impl InboundGroupSession {
    fn from_shared(shared: SharedSession, verified: bool) -> Self {
        let session = Self {
            initial_ratchet: shared.ratchet.clone(),
            latest_ratchet: shared.ratchet,
            signing_key: shared.signing_key,
            verified,
        };
        debug!(
            session_id = %session.session_id(),
            first_known_index = session.first_known_index(),
            verified,
            "created inbound group session"
        );
        session
    }

    /// Session from a signed session key.
    ///
    /// The self-signature makes the session verified immediately.
    ///
    /// # Errors
    ///
    /// - `InvalidBase64` if the key is not base64
    /// - `BadSessionKey` for a wrong length or version
    /// - `BadSignature` if the self-signature does not verify
    pub fn new(session_key: &str) -> Result<Self, OlmError> {
        decode_session_key(session_key).map(|shared| Self::from_shared(shared, true))
    }

    /// Session from an unsigned export.
    ///
    /// The session is unverified until a message decrypts successfully.
    ///
    /// # Errors
    ///
    /// - `InvalidBase64` if the export is not base64
    /// - `BadSessionKey` for a wrong length or version
    pub fn import(exported: &str) -> Result<Self, OlmError> {
        decode_session_export(exported).map(|shared| Self::from_shared(shared, false))
    }

    /// Base64 Ed25519 public key identifying the session.
    pub fn session_id(&self) -> String {
        self.signing_key.to_base64()
    }

    /// Earliest index this session can decrypt.
    pub fn first_known_index(&self) -> u32 {
        self.initial_ratchet.counter()
    }

    /// Returns true once the session is known to belong to its signing key.
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Unsigned base64 export of the ratchet at `message_index`.
    ///
    /// # Errors
    ///
    /// - `UnknownMessageIndex` if `message_index` precedes
    ///   [`first_known_index`](Self::first_known_index)
    pub fn export(&self, message_index: u32) -> Result<String, OlmError> {
        let ratchet = self.ratchet_for(message_index)?;
        Ok(encode_session_export(&ratchet, &self.signing_key))
    }

    /// Copy of the initial ratchet moved to `message_index`.
    fn ratchet_for(&self, message_index: u32) -> Result<Megolm, OlmError> {
        if message_index.wrapping_sub(self.initial_ratchet.counter()) >= HALF_RANGE {
            return Err(OlmError::UnknownMessageIndex);
        }
        let mut ratchet = self.initial_ratchet.clone();
        ratchet.advance_to(message_index);
        Ok(ratchet)
    }

    /// Upper bound on the plaintext carried by `message`.
    ///
    /// # Errors
    ///
    /// - `InvalidBase64`, `BadMessageVersion` or `BadMessageFormat` for
    ///   malformed input
    pub fn decrypt_max_plaintext_length(&self, message: &str) -> Result<usize, OlmError> {
        let raw = decode_base64(message)?;
        let decoded = decode_group_message(&raw, MAC_LENGTH, ED25519_SIGNATURE_LENGTH);
        if decoded.version != MEGOLM_PROTOCOL_VERSION {
            return Err(OlmError::BadMessageVersion);
        }
        let ciphertext = decoded.ciphertext.ok_or(OlmError::BadMessageFormat)?;
        Ok(MEGOLM_CIPHER.max_plaintext_length(ciphertext.len()))
    }

    /// Verify and decrypt a base64 group message.
    ///
    /// Returns the plaintext and the index it was sent at.
    ///
    /// # Errors
    ///
    /// - `InvalidBase64` if the message is not base64
    /// - `BadMessageVersion` or `BadMessageFormat` for malformed framing
    /// - `BadSignature` if the signature does not verify
    /// - `UnknownMessageIndex` if the index precedes the first known index
    /// - `BadMessageMac` if the MAC does not verify
    pub fn decrypt(&mut self, message: &str) -> Result<(Zeroizing<Vec<u8>>, u32), OlmError> {
        let raw = decode_base64(message)?;
        let decoded = decode_group_message(&raw, MAC_LENGTH, ED25519_SIGNATURE_LENGTH);
        if decoded.version != MEGOLM_PROTOCOL_VERSION {
            return Err(OlmError::BadMessageVersion);
        }
        let (Some(message_index), Some(ciphertext)) = (decoded.message_index, decoded.ciphertext)
        else {
            return Err(OlmError::BadMessageFormat);
        };

        let (signed, signature) = raw.split_at(raw.len() - ED25519_SIGNATURE_LENGTH);
        if !self.signing_key.verify(signed, signature) {
            debug!(message_index, "group message signature failed");
            return Err(OlmError::BadSignature);
        }

        // Either fast-forward the latest ratchet in place, or work on a copy
        // of the initial one for a message older than the latest.
        let in_order = message_index.wrapping_sub(self.latest_ratchet.counter()) < HALF_RANGE;
        let copy;
        let ratchet = if in_order {
            if self.latest_ratchet.counter() != message_index {
                debug!(
                    from = self.latest_ratchet.counter(),
                    to = message_index,
                    "fast-forwarding latest ratchet"
                );
            }
            self.latest_ratchet.advance_to(message_index);
            &self.latest_ratchet
        } else {
            copy = self.ratchet_for(message_index).inspect_err(|_| {
                debug!(
                    message_index,
                    first_known_index = self.first_known_index(),
                    "group message precedes first known index"
                );
            })?;
            &copy
        };

        let mut plaintext =
            Zeroizing::new(vec![0u8; MEGOLM_CIPHER.max_plaintext_length(ciphertext.len())]);
        let length = MEGOLM_CIPHER
            .decrypt(ratchet.data(), signed, ciphertext, &mut plaintext)
            .map_err(|_| OlmError::BadMessageMac)
            .inspect_err(|_| debug!(message_index, "group message MAC failed"))?;
        plaintext.truncate(length);

        self.verified = true;
        Ok((plaintext, message_index))
    }

    /// Encrypted pickle of the session under `key`.
    pub fn pickle(&self, key: &[u8]) -> String {
        pickle::pickle_with(key, |writer| {
            writer
                .write_u32(INBOUND_GROUP_PICKLE_VERSION)
                .write(&self.initial_ratchet)
                .write(&self.latest_ratchet)
                .write(&self.signing_key)
                .write_bool(self.verified);
        })
    }

    /// Restore a session from an encrypted pickle.
    ///
    /// Version 1 pickles predate the verified flag and restore as
    /// verified.
    ///
    /// # Errors
    ///
    /// - `InvalidBase64` or `BadAccountKey` if the pickle cannot be decrypted
    /// - `UnknownPickleVersion` for an unsupported version
    /// - `CorruptedPickle` if the content is malformed
    pub fn from_pickle(key: &[u8], pickle: &str) -> Result<Self, OlmError> {
        pickle::unpickle_with(key, pickle, |reader| {
            let version = reader.read_u32()?;
            if !(1..=INBOUND_GROUP_PICKLE_VERSION).contains(&version) {
                return Err(PickleError::UnknownVersion { version }.into());
            }
            let initial_ratchet = reader.read()?;
            let latest_ratchet = reader.read()?;
            let signing_key = reader.read()?;
            let verified = if version >= 2 { reader.read_bool()? } else { true };

            Ok(Self { initial_ratchet, latest_ratchet, signing_key, verified })
        })
    }
}

fn decode_base64(message: &str) -> Result<Zeroizing<Vec<u8>>, OlmError> {
    base64::decode(message.as_bytes()).map(Zeroizing::new).map_err(|_| OlmError::InvalidBase64)
}

impl std::fmt::Debug for InboundGroupSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundGroupSession")
            .field("session_id", &self.session_id())
            .field("first_known_index", &self.first_known_index())
            .field("latest_index", &self.latest_ratchet.counter())
            .field("verified", &self.verified)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::OutboundGroupSession;

    fn outbound() -> OutboundGroupSession {
        OutboundGroupSession::new(&[0x42; 160]).unwrap()
    }

    #[test]
    fn decrypts_in_order() {
        let mut outbound = outbound();
        let mut inbound = InboundGroupSession::new(&outbound.session_key()).unwrap();
        assert!(inbound.is_verified());
        assert_eq!(inbound.session_id(), outbound.session_id());

        for i in 0..3u32 {
            let message = outbound.encrypt(format!("message {i}").as_bytes());
            let (plaintext, index) = inbound.decrypt(&message).unwrap();
            assert_eq!(index, i);
            assert_eq!(&plaintext[..], format!("message {i}").as_bytes());
        }
    }

    #[test]
    fn late_message_uses_initial_ratchet() {
        let mut outbound = outbound();
        let mut inbound = InboundGroupSession::new(&outbound.session_key()).unwrap();
        let first = outbound.encrypt(b"first");
        let second = outbound.encrypt(b"second");

        assert_eq!(inbound.decrypt(&second).unwrap().1, 1);
        assert_eq!(&inbound.decrypt(&first).unwrap().0[..], b"first");
        // Replays decrypt again; deduplication is the caller's job.
        assert_eq!(&inbound.decrypt(&second).unwrap().0[..], b"second");
    }

    #[test]
    fn index_before_session_key_is_unknown() {
        let mut outbound = outbound();
        let early = outbound.encrypt(b"early");
        let mut inbound = InboundGroupSession::new(&outbound.session_key()).unwrap();

        assert_eq!(inbound.first_known_index(), 1);
        assert_eq!(inbound.decrypt(&early).err(), Some(OlmError::UnknownMessageIndex));
        assert_eq!(inbound.export(0).err(), Some(OlmError::UnknownMessageIndex));
    }

    #[test]
    fn imported_session_is_verified_by_decrypt() {
        let mut outbound = outbound();
        let inbound = InboundGroupSession::new(&outbound.session_key()).unwrap();
        let mut imported = InboundGroupSession::import(&inbound.export(0).unwrap()).unwrap();
        assert!(!imported.is_verified());

        let message = outbound.encrypt(b"hello");
        assert_eq!(&imported.decrypt(&message).unwrap().0[..], b"hello");
        assert!(imported.is_verified());
    }

    #[test]
    fn export_at_later_index() {
        let mut outbound = outbound();
        let inbound = InboundGroupSession::new(&outbound.session_key()).unwrap();
        let _skipped = outbound.encrypt(b"zero");
        let message = outbound.encrypt(b"one");

        let mut imported = InboundGroupSession::import(&inbound.export(1).unwrap()).unwrap();
        assert_eq!(imported.first_known_index(), 1);
        assert_eq!(&imported.decrypt(&message).unwrap().0[..], b"one");
    }

    #[test]
    fn bad_signature_is_rejected_before_mac() {
        let mut outbound = outbound();
        let mut inbound = InboundGroupSession::new(&outbound.session_key()).unwrap();
        let mut raw = base64::decode(outbound.encrypt(b"hello").as_bytes()).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;

        assert_eq!(inbound.decrypt(&base64::encode(&raw)).err(), Some(OlmError::BadSignature));
    }

    #[test]
    fn malformed_messages() {
        let mut inbound = InboundGroupSession::new(&outbound().session_key()).unwrap();
        assert_eq!(inbound.decrypt("A").err(), Some(OlmError::InvalidBase64));

        let mut raw = vec![2u8];
        raw.extend_from_slice(&[0u8; 80]);
        assert_eq!(inbound.decrypt(&base64::encode(&raw)).err(), Some(OlmError::BadMessageVersion));

        let mut raw = vec![MEGOLM_PROTOCOL_VERSION];
        raw.extend_from_slice(&[0u8; 80]);
        assert_eq!(inbound.decrypt(&base64::encode(&raw)).err(), Some(OlmError::BadMessageFormat));
    }

    #[test]
    fn max_plaintext_length_bounds_plaintext() {
        let mut outbound = outbound();
        let mut inbound = InboundGroupSession::new(&outbound.session_key()).unwrap();
        let message = outbound.encrypt(b"twenty bytes of text");

        let bound = inbound.decrypt_max_plaintext_length(&message).unwrap();
        assert!(bound >= 20);
        assert_eq!(inbound.decrypt(&message).unwrap().0.len(), 20);
    }

    #[test]
    fn pickle_roundtrip() {
        let mut outbound = outbound();
        let mut inbound = InboundGroupSession::import(
            &InboundGroupSession::new(&outbound.session_key()).unwrap().export(0).unwrap(),
        )
        .unwrap();
        let first = outbound.encrypt(b"first");
        let second = outbound.encrypt(b"second");
        inbound.decrypt(&second).unwrap();

        let mut restored =
            InboundGroupSession::from_pickle(b"key", &inbound.pickle(b"key")).unwrap();
        assert!(restored.is_verified());
        assert_eq!(restored.first_known_index(), 0);
        assert_eq!(&restored.decrypt(&first).unwrap().0[..], b"first");
    }

    #[test]
    fn version_one_pickle_reads_as_verified() {
        let inbound = InboundGroupSession::import(
            &InboundGroupSession::new(&outbound().session_key()).unwrap().export(0).unwrap(),
        )
        .unwrap();

        let pickle = pickle::pickle_with(b"key", |writer| {
            writer
                .write_u32(1)
                .write(&inbound.initial_ratchet)
                .write(&inbound.latest_ratchet)
                .write(&inbound.signing_key);
        });
        let restored = InboundGroupSession::from_pickle(b"key", &pickle).unwrap();
        assert!(restored.is_verified());
    }
}
