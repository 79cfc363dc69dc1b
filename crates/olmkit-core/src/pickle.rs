//! Encrypted pickles
//!
//! A pickle is an object's raw serialized state (see [`olmkit_proto::pickle`])
//! encrypted under a caller-chosen key and wrapped in unpadded base64:
//!
//! ```text
//! base64( AES-256-CBC(raw pickle) ‖ MAC )     keys from HKDF(key, "Pickle")
//! ```
//!
//! Encryption happens at the tail of the output buffer and the base64
//! encoding is done in place, so the raw and encrypted forms never need a
//! second buffer.

use olmkit_crypto::{AesSha256Cipher, Cipher, MAC_LENGTH, base64};
use olmkit_proto::{PickleReader, PickleWriter};
use zeroize::Zeroizing;

use crate::error::OlmError;

/// Cipher for pickles
const PICKLE_CIPHER: AesSha256Cipher = AesSha256Cipher::new(b"Pickle");

/// Length of the base64 text produced for a raw pickle of `raw_length`
/// bytes.
pub fn pickle_length(raw_length: usize) -> usize {
    base64::encoded_length(PICKLE_CIPHER.ciphertext_length(raw_length) + MAC_LENGTH)
}

/// Encrypt and base64-encode a raw pickle.
pub fn encrypt_pickle(key: &[u8], raw: &[u8]) -> String {
    let sealed_length = PICKLE_CIPHER.ciphertext_length(raw.len()) + MAC_LENGTH;
    let mut buffer = vec![0u8; base64::encoded_length(sealed_length)];

    let start = buffer.len() - sealed_length;
    let Ok(_) = PICKLE_CIPHER.encrypt(key, raw, &mut buffer[start..], 0) else {
        unreachable!("buffer sized for ciphertext and MAC");
    };
    let Ok(_) = base64::encode_in_place(&mut buffer, sealed_length) else {
        unreachable!("buffer sized for the encoding");
    };

    let Ok(text) = String::from_utf8(buffer) else {
        unreachable!("base64 alphabet is ASCII");
    };
    text
}

/// Decode and decrypt a pickle back to its raw bytes.
///
/// # Errors
///
/// - `InvalidBase64` if `pickle` has a length no base64 encoding produces
/// - `BadAccountKey` if the MAC does not verify under `key` (wrong key or
///   tampered pickle)
pub fn decrypt_pickle(key: &[u8], pickle: &str) -> Result<Zeroizing<Vec<u8>>, OlmError> {
    let mut buffer = Zeroizing::new(pickle.as_bytes().to_vec());
    let sealed = base64::decode_in_place(&mut buffer).map_err(|_| OlmError::InvalidBase64)?;

    let Some(ciphertext_length) = sealed.len().checked_sub(MAC_LENGTH) else {
        return Err(OlmError::BadAccountKey);
    };
    let mut raw = Zeroizing::new(vec![0u8; PICKLE_CIPHER.max_plaintext_length(ciphertext_length)]);
    let length = PICKLE_CIPHER
        .decrypt(key, sealed, 0..ciphertext_length, &mut raw)
        .map_err(|_| OlmError::BadAccountKey)?;
    raw.truncate(length);
    Ok(raw)
}

/// Serialize with `write` and encrypt the result.
pub(crate) fn pickle_with(key: &[u8], write: impl FnOnce(&mut PickleWriter)) -> String {
    let mut writer = PickleWriter::new();
    write(&mut writer);
    encrypt_pickle(key, &writer.into_bytes())
}

/// Decrypt a pickle and deserialize it with `read`, which must consume the
/// whole raw pickle.
pub(crate) fn unpickle_with<T>(
    key: &[u8],
    pickle: &str,
    read: impl FnOnce(&mut PickleReader<'_>) -> Result<T, OlmError>,
) -> Result<T, OlmError> {
    let raw = decrypt_pickle(key, pickle)?;
    let mut reader = PickleReader::new(&raw);
    let value = read(&mut reader)?;
    reader.finish()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let pickle = encrypt_pickle(b"secret key", b"raw state bytes");
        assert_eq!(pickle.len(), pickle_length(15));
        assert_eq!(&decrypt_pickle(b"secret key", &pickle).unwrap()[..], b"raw state bytes");
    }

    #[test]
    fn empty_key_and_empty_pickle() {
        let pickle = encrypt_pickle(b"", b"");
        assert_eq!(&decrypt_pickle(b"", &pickle).unwrap()[..], b"");
    }

    #[test]
    fn wrong_key_is_bad_account_key() {
        let pickle = encrypt_pickle(b"secret key", b"raw state bytes");
        assert_eq!(decrypt_pickle(b"other key", &pickle), Err(OlmError::BadAccountKey));
    }

    #[test]
    fn tampered_pickle_is_bad_account_key() {
        let mut pickle = encrypt_pickle(b"key", b"raw state bytes").into_bytes();
        pickle[3] = if pickle[3] == b'A' { b'B' } else { b'A' };
        let pickle = String::from_utf8(pickle).unwrap();
        assert_eq!(decrypt_pickle(b"key", &pickle), Err(OlmError::BadAccountKey));
    }

    #[test]
    fn impossible_base64_length() {
        assert_eq!(decrypt_pickle(b"key", "AAAAA"), Err(OlmError::InvalidBase64));
    }

    #[test]
    fn too_short_for_mac() {
        assert_eq!(decrypt_pickle(b"key", "AAAA"), Err(OlmError::BadAccountKey));
    }

    #[test]
    fn unpickle_rejects_trailing_bytes() {
        let pickle = pickle_with(b"key", |writer| {
            writer.write_u32(1).write_u8(0);
        });
        let result = unpickle_with(b"key", &pickle, |reader| Ok(reader.read_u32()?));
        assert_eq!(result, Err(OlmError::CorruptedPickle));
    }
}
