//! Session key and session export formats
//!
//! ```text
//! session key (v2):  version ‖ u32 BE index ‖ ratchet(128) ‖ ed25519 pub(32) ‖ signature(64)
//! export (v1):       version ‖ u32 BE index ‖ ratchet(128) ‖ ed25519 pub(32)
//! ```
//!
//! The session key is signed by the session's own Ed25519 key over every
//! byte before the signature. The export is unsigned and is only trusted as
//! far as the channel it arrived on.

use olmkit_crypto::{
    ED25519_PUBLIC_KEY_LENGTH, ED25519_SIGNATURE_LENGTH, Ed25519KeyPair, Ed25519PublicKey, base64,
};
use zeroize::Zeroizing;

use crate::{
    error::OlmError,
    megolm::{MEGOLM_RATCHET_LENGTH, Megolm},
};

/// Version byte of a signed session key
pub const SESSION_KEY_VERSION: u8 = 2;

/// Version byte of an unsigned session export
pub const SESSION_EXPORT_VERSION: u8 = 1;

/// Raw length of an unsigned session export
pub const SESSION_EXPORT_LENGTH: usize = 1 + 4 + MEGOLM_RATCHET_LENGTH + ED25519_PUBLIC_KEY_LENGTH;

/// Raw length of a signed session key
pub const SESSION_KEY_LENGTH: usize = SESSION_EXPORT_LENGTH + ED25519_SIGNATURE_LENGTH;

const INDEX_OFFSET: usize = 1;
const RATCHET_OFFSET: usize = INDEX_OFFSET + 4;
const SIGNING_KEY_OFFSET: usize = RATCHET_OFFSET + MEGOLM_RATCHET_LENGTH;

/// Ratchet state and signing key carried by a session key or export.
pub(crate) struct SharedSession {
    pub ratchet: Megolm,
    pub signing_key: Ed25519PublicKey,
}

fn write_unsigned(
    buffer: &mut [u8],
    version: u8,
    ratchet: &Megolm,
    signing_key: &Ed25519PublicKey,
) {
    buffer[0] = version;
    buffer[INDEX_OFFSET..RATCHET_OFFSET].copy_from_slice(&ratchet.counter().to_be_bytes());
    buffer[RATCHET_OFFSET..SIGNING_KEY_OFFSET].copy_from_slice(ratchet.data());
    buffer[SIGNING_KEY_OFFSET..SESSION_EXPORT_LENGTH].copy_from_slice(signing_key.as_bytes());
}

fn read_unsigned(raw: &[u8]) -> SharedSession {
    let mut index = [0u8; 4];
    index.copy_from_slice(&raw[INDEX_OFFSET..RATCHET_OFFSET]);
    let mut data = Zeroizing::new([0u8; MEGOLM_RATCHET_LENGTH]);
    data.copy_from_slice(&raw[RATCHET_OFFSET..SIGNING_KEY_OFFSET]);
    let mut signing_key = [0u8; ED25519_PUBLIC_KEY_LENGTH];
    signing_key.copy_from_slice(&raw[SIGNING_KEY_OFFSET..SESSION_EXPORT_LENGTH]);

    SharedSession {
        ratchet: Megolm::new(&data, u32::from_be_bytes(index)),
        signing_key: Ed25519PublicKey(signing_key),
    }
}

fn decode_raw(text: &str, expected_length: usize) -> Result<Zeroizing<Vec<u8>>, OlmError> {
    let raw =
        base64::decode(text.as_bytes()).map(Zeroizing::new).map_err(|_| OlmError::InvalidBase64)?;
    if raw.len() != expected_length {
        return Err(OlmError::BadSessionKey);
    }
    Ok(raw)
}

/// Signed base64 session key for `ratchet`.
pub(crate) fn encode_session_key(ratchet: &Megolm, signing_key: &Ed25519KeyPair) -> String {
    let mut raw = Zeroizing::new([0u8; SESSION_KEY_LENGTH]);
    write_unsigned(raw.as_mut_slice(), SESSION_KEY_VERSION, ratchet, &signing_key.public_key);
    let signature = signing_key.sign(&raw[..SESSION_EXPORT_LENGTH]);
    raw[SESSION_EXPORT_LENGTH..].copy_from_slice(&signature);
    base64::encode(raw.as_slice())
}

/// Parse and verify a base64 session key.
///
/// # Errors
///
/// - `InvalidBase64` if `text` is not base64
/// - `BadSessionKey` for a wrong length or version
/// - `BadSignature` if the self-signature does not verify
pub(crate) fn decode_session_key(text: &str) -> Result<SharedSession, OlmError> {
    let raw = decode_raw(text, SESSION_KEY_LENGTH)?;
    if raw[0] != SESSION_KEY_VERSION {
        return Err(OlmError::BadSessionKey);
    }

    let shared = read_unsigned(&raw);
    if !shared.signing_key.verify(&raw[..SESSION_EXPORT_LENGTH], &raw[SESSION_EXPORT_LENGTH..]) {
        return Err(OlmError::BadSignature);
    }
    Ok(shared)
}

/// Unsigned base64 export of `ratchet`.
pub(crate) fn encode_session_export(ratchet: &Megolm, signing_key: &Ed25519PublicKey) -> String {
    let mut raw = Zeroizing::new([0u8; SESSION_EXPORT_LENGTH]);
    write_unsigned(raw.as_mut_slice(), SESSION_EXPORT_VERSION, ratchet, signing_key);
    base64::encode(raw.as_slice())
}

/// Parse a base64 session export.
///
/// # Errors
///
/// - `InvalidBase64` if `text` is not base64
/// - `BadSessionKey` for a wrong length or version
pub(crate) fn decode_session_export(text: &str) -> Result<SharedSession, OlmError> {
    let raw = decode_raw(text, SESSION_EXPORT_LENGTH)?;
    if raw[0] != SESSION_EXPORT_VERSION {
        return Err(OlmError::BadSessionKey);
    }
    Ok(read_unsigned(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratchet() -> Megolm {
        Megolm::new(&[0x5A; MEGOLM_RATCHET_LENGTH], 0x0102_0304)
    }

    #[test]
    fn session_key_layout() {
        let signing_key = Ed25519KeyPair::from_random(&[1u8; 32]);
        let text = encode_session_key(&ratchet(), &signing_key);
        let raw = base64::decode(text.as_bytes()).unwrap();

        assert_eq!(raw.len(), 229);
        assert_eq!(&raw[..5], &[2, 1, 2, 3, 4]);
        assert_eq!(&raw[5..133], &[0x5A; 128][..]);
        assert_eq!(&raw[133..165], signing_key.public_key.as_bytes());
    }

    #[test]
    fn session_key_roundtrip() {
        let signing_key = Ed25519KeyPair::from_random(&[1u8; 32]);
        let shared = decode_session_key(&encode_session_key(&ratchet(), &signing_key)).unwrap();

        assert_eq!(shared.ratchet, ratchet());
        assert_eq!(shared.signing_key, signing_key.public_key);
    }

    #[test]
    fn tampered_session_key_fails_signature() {
        let signing_key = Ed25519KeyPair::from_random(&[1u8; 32]);
        let key = encode_session_key(&ratchet(), &signing_key);
        let mut raw = base64::decode(key.as_bytes()).unwrap();
        raw[10] ^= 0x01;

        let result = decode_session_key(&base64::encode(&raw));
        assert_eq!(result.err(), Some(OlmError::BadSignature));
    }

    #[test]
    fn wrong_length_and_version() {
        assert_eq!(
            decode_session_key(&base64::encode(&[2u8; 100])).err(),
            Some(OlmError::BadSessionKey)
        );
        assert_eq!(
            decode_session_export(&base64::encode(&[2u8; SESSION_EXPORT_LENGTH])).err(),
            Some(OlmError::BadSessionKey)
        );
        assert_eq!(decode_session_key("A").err(), Some(OlmError::InvalidBase64));
    }

    #[test]
    fn export_roundtrip() {
        let signing_key = Ed25519PublicKey([9u8; 32]);
        let text = encode_session_export(&ratchet(), &signing_key);
        assert_eq!(base64::decode(text.as_bytes()).unwrap().len(), 165);

        let shared = decode_session_export(&text).unwrap();
        assert_eq!(shared.ratchet, ratchet());
        assert_eq!(shared.signing_key, signing_key);
    }
}
