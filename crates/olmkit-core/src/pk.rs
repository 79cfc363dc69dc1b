//! Public-key encryption and standalone signing
//!
//! One-shot encryption to a Curve25519 public key, used for server-side
//! key backup: the sender generates an ephemeral key pair, agrees a secret
//! with the recipient key, and encrypts with the authenticated cipher keyed
//! directly by that secret.
//!
//! ```text
//! secret = ECDH(ephemeral, recipient)
//! ciphertext ‖ mac = AesSha256Cipher("")(secret, plaintext)
//! ```
//!
//! The MAC is the cipher's truncated HMAC over the ciphertext.

use olmkit_crypto::{
    AesSha256Cipher, CURVE25519_KEY_LENGTH, CURVE25519_RANDOM_LENGTH, Cipher, Curve25519KeyPair,
    Curve25519PrivateKey, Curve25519PublicKey, ED25519_RANDOM_LENGTH, Ed25519KeyPair, MAC_LENGTH,
    base64, memory,
};
use olmkit_proto::PickleError;
use zeroize::Zeroizing;

use crate::{error::OlmError, pickle};

/// Cipher for PK messages: keys are derived with an empty info string
const PK_CIPHER: AesSha256Cipher = AesSha256Cipher::new(b"");

/// Current PK decryption pickle version
pub const PK_DECRYPTION_PICKLE_VERSION: u32 = 1;

/// An encrypted PK message. Every field is unpadded base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkMessage {
    /// AES-256-CBC ciphertext
    pub ciphertext: String,
    /// Truncated HMAC over the ciphertext
    pub mac: String,
    /// Sender's ephemeral Curve25519 public key
    pub ephemeral_key: String,
}

/// Encrypts messages to a fixed recipient key.
#[derive(Debug, Clone)]
pub struct PkEncryption {
    recipient_key: Curve25519PublicKey,
}

impl PkEncryption {
    /// Encryptor for the base64 Curve25519 `recipient_key`.
    ///
    /// # Errors
    ///
    /// - `InvalidBase64` if the key is not 32 bytes of base64
    pub fn new(recipient_key: &str) -> Result<Self, OlmError> {
        Ok(Self { recipient_key: Curve25519PublicKey::from_base64(recipient_key)? })
    }

    /// Random bytes consumed by [`encrypt`](Self::encrypt).
    pub fn encrypt_random_length() -> usize {
        CURVE25519_RANDOM_LENGTH
    }

    /// Encrypt `plaintext` with a fresh ephemeral key from `random`.
    ///
    /// The MAC covers the ciphertext. libolm's PK encryption computes its MAC
    /// over an empty input instead, so messages do not interoperate with it.
    ///
    /// # Errors
    ///
    /// - `NotEnoughRandom` if `random` is shorter than 32 bytes
    pub fn encrypt(&self, plaintext: &[u8], random: &[u8]) -> Result<PkMessage, OlmError> {
        let random = memory::load_prefix::<CURVE25519_RANDOM_LENGTH>(random)
            .map(Zeroizing::new)
            .ok_or(OlmError::NotEnoughRandom)?;
        let ephemeral = Curve25519KeyPair::from_random(&random);
        let secret = ephemeral.shared_secret(&self.recipient_key);

        let ciphertext_length = PK_CIPHER.ciphertext_length(plaintext.len());
        let mut output = vec![0u8; ciphertext_length + MAC_LENGTH];
        PK_CIPHER.encrypt(secret.as_slice(), plaintext, &mut output, 0)?;

        let (ciphertext, mac) = output.split_at(ciphertext_length);
        Ok(PkMessage {
            ciphertext: base64::encode(ciphertext),
            mac: base64::encode(mac),
            ephemeral_key: ephemeral.public_key.to_base64(),
        })
    }
}

/// Holds the private key PK messages are encrypted to.
pub struct PkDecryption {
    key_pair: Curve25519KeyPair,
}

impl PkDecryption {
    /// Random bytes consumed by [`new`](Self::new).
    pub fn new_random_length() -> usize {
        CURVE25519_RANDOM_LENGTH
    }

    /// Fresh key pair from `random`.
    ///
    /// # Errors
    ///
    /// - `NotEnoughRandom` if `random` is shorter than 32 bytes
    pub fn new(random: &[u8]) -> Result<Self, OlmError> {
        let random = memory::load_prefix::<CURVE25519_RANDOM_LENGTH>(random)
            .map(Zeroizing::new)
            .ok_or(OlmError::NotEnoughRandom)?;
        Ok(Self { key_pair: Curve25519KeyPair::from_random(&random) })
    }

    /// Rebuild from a previously exported private key.
    ///
    /// # Errors
    ///
    /// - `InputBufferTooSmall` if `private_key` is shorter than 32 bytes
    pub fn from_private_key(private_key: &[u8]) -> Result<Self, OlmError> {
        let private_key = memory::load_prefix::<CURVE25519_KEY_LENGTH>(private_key)
            .ok_or(OlmError::InputBufferTooSmall)?;
        Ok(Self {
            key_pair: Curve25519KeyPair::from_private_key(Curve25519PrivateKey(private_key)),
        })
    }

    /// Base64 public key to encrypt to.
    pub fn public_key(&self) -> String {
        self.key_pair.public_key.to_base64()
    }

    /// Raw private key.
    pub fn private_key(&self) -> &[u8; CURVE25519_KEY_LENGTH] {
        &self.key_pair.private_key.0
    }

    /// Authenticate and decrypt a PK message.
    ///
    /// # Errors
    ///
    /// - `InvalidBase64` if any field is not base64, or the ephemeral key is
    ///   not 32 bytes
    /// - `BadMessageMac` if the MAC does not verify
    pub fn decrypt(&self, message: &PkMessage) -> Result<Zeroizing<Vec<u8>>, OlmError> {
        let ephemeral = Curve25519PublicKey::from_base64(&message.ephemeral_key)?;
        let mac = base64::decode(message.mac.as_bytes()).map_err(|_| OlmError::InvalidBase64)?;
        let mut input =
            base64::decode(message.ciphertext.as_bytes()).map_err(|_| OlmError::InvalidBase64)?;
        if mac.len() != MAC_LENGTH {
            return Err(OlmError::BadMessageMac);
        }

        let ciphertext_length = input.len();
        input.extend_from_slice(&mac);

        let secret = self.key_pair.shared_secret(&ephemeral);
        let mut plaintext =
            Zeroizing::new(vec![0u8; PK_CIPHER.max_plaintext_length(ciphertext_length)]);
        let length = PK_CIPHER
            .decrypt(secret.as_slice(), &input, 0..ciphertext_length, &mut plaintext)
            .map_err(|_| OlmError::BadMessageMac)?;
        plaintext.truncate(length);
        Ok(plaintext)
    }

    /// Encrypted pickle under `key`.
    pub fn pickle(&self, key: &[u8]) -> String {
        pickle::pickle_with(key, |writer| {
            writer.write_u32(PK_DECRYPTION_PICKLE_VERSION).write(&self.key_pair);
        })
    }

    /// Restore from an encrypted pickle.
    ///
    /// # Errors
    ///
    /// - `InvalidBase64` or `BadAccountKey` if the pickle cannot be decrypted
    /// - `UnknownPickleVersion` for an unsupported version
    /// - `CorruptedPickle` if the content is malformed
    pub fn from_pickle(key: &[u8], pickle: &str) -> Result<Self, OlmError> {
        pickle::unpickle_with(key, pickle, |reader| {
            let version = reader.read_u32()?;
            if version != PK_DECRYPTION_PICKLE_VERSION {
                return Err(PickleError::UnknownVersion { version }.into());
            }
            Ok(Self { key_pair: reader.read()? })
        })
    }
}

impl std::fmt::Debug for PkDecryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkDecryption")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Standalone Ed25519 signer seeded by the caller.
pub struct PkSigning {
    key_pair: Ed25519KeyPair,
}

impl PkSigning {
    /// Signer from a 32-byte seed.
    ///
    /// # Errors
    ///
    /// - `InputBufferTooSmall` if `seed` is shorter than 32 bytes
    pub fn new(seed: &[u8]) -> Result<Self, OlmError> {
        let seed = memory::load_prefix::<ED25519_RANDOM_LENGTH>(seed)
            .map(Zeroizing::new)
            .ok_or(OlmError::InputBufferTooSmall)?;
        Ok(Self { key_pair: Ed25519KeyPair::from_random(&seed) })
    }

    /// Base64 public key.
    pub fn public_key(&self) -> String {
        self.key_pair.public_key.to_base64()
    }

    /// Base64 signature over `message`.
    pub fn sign(&self, message: &[u8]) -> String {
        base64::encode(&self.key_pair.sign(message))
    }
}

impl std::fmt::Debug for PkSigning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkSigning").field("public_key", &self.public_key()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use olmkit_crypto::{
        Ed25519PublicKey,
        digest::{hkdf_sha256, hmac_sha256},
    };

    use super::*;

    fn roundtrip_pair() -> (PkEncryption, PkDecryption) {
        let decryption = PkDecryption::new(&[0x31; 32]).unwrap();
        let encryption = PkEncryption::new(&decryption.public_key()).unwrap();
        (encryption, decryption)
    }

    #[test]
    fn encrypt_decrypt() {
        let (encryption, decryption) = roundtrip_pair();
        let message = encryption.encrypt(b"backup key", &[0x32; 32]).unwrap();
        assert_eq!(&decryption.decrypt(&message).unwrap()[..], b"backup key");
    }

    #[test]
    fn mac_covers_ciphertext() {
        let (encryption, decryption) = roundtrip_pair();
        let message = encryption.encrypt(b"backup key", &[0x32; 32]).unwrap();

        let mut ciphertext = base64::decode(message.ciphertext.as_bytes()).unwrap();
        ciphertext[0] ^= 0x01;
        let tampered = PkMessage { ciphertext: base64::encode(&ciphertext), ..message };
        assert_eq!(decryption.decrypt(&tampered), Err(OlmError::BadMessageMac));
    }

    #[test]
    fn mac_is_over_ciphertext_not_empty_input() {
        let (encryption, decryption) = roundtrip_pair();
        let message = encryption.encrypt(b"backup key", &[0x32; 32]).unwrap();

        let ephemeral = Curve25519PublicKey::from_base64(&message.ephemeral_key).unwrap();
        let secret = decryption.key_pair.shared_secret(&ephemeral);
        let mut derived = [0u8; 80];
        hkdf_sha256(secret.as_slice(), &[], b"", &mut derived).unwrap();
        let mac_key = &derived[32..64];

        let ciphertext = base64::decode(message.ciphertext.as_bytes()).unwrap();
        let over_ciphertext = hmac_sha256(mac_key, &ciphertext);
        assert_eq!(message.mac, base64::encode(&over_ciphertext[..MAC_LENGTH]));

        let over_empty = hmac_sha256(mac_key, &[]);
        let empty_input = PkMessage { mac: base64::encode(&over_empty[..MAC_LENGTH]), ..message };
        assert_eq!(decryption.decrypt(&empty_input), Err(OlmError::BadMessageMac));
    }

    #[test]
    fn wrong_recipient_fails_mac() {
        let (encryption, _) = roundtrip_pair();
        let other = PkDecryption::new(&[0x33; 32]).unwrap();
        let message = encryption.encrypt(b"secret", &[0x32; 32]).unwrap();
        assert_eq!(other.decrypt(&message), Err(OlmError::BadMessageMac));
    }

    #[test]
    fn bad_inputs() {
        assert_eq!(PkEncryption::new("short").err(), Some(OlmError::InvalidBase64));
        assert_eq!(PkDecryption::new(&[0u8; 31]).err(), Some(OlmError::NotEnoughRandom));
        assert_eq!(
            PkDecryption::from_private_key(&[0u8; 31]).err(),
            Some(OlmError::InputBufferTooSmall)
        );

        let (encryption, _) = roundtrip_pair();
        assert_eq!(encryption.encrypt(b"", &[0u8; 31]), Err(OlmError::NotEnoughRandom));
    }

    #[test]
    fn private_key_export_restores() {
        let decryption = PkDecryption::new(&[0x31; 32]).unwrap();
        let restored = PkDecryption::from_private_key(decryption.private_key()).unwrap();
        assert_eq!(restored.public_key(), decryption.public_key());
    }

    #[test]
    fn pickle_roundtrip() {
        let (encryption, decryption) = roundtrip_pair();
        let restored = PkDecryption::from_pickle(b"key", &decryption.pickle(b"key")).unwrap();

        let message = encryption.encrypt(b"after restore", &[0x34; 32]).unwrap();
        assert_eq!(&restored.decrypt(&message).unwrap()[..], b"after restore");
    }

    #[test]
    fn signing() {
        let signing = PkSigning::new(&[0x35; 32]).unwrap();
        let signature = base64::decode(signing.sign(b"cross-signing").as_bytes()).unwrap();
        let key = Ed25519PublicKey::from_base64(&signing.public_key()).unwrap();
        assert!(key.verify(b"cross-signing", &signature));
        assert_eq!(PkSigning::new(&[0u8; 16]).err(), Some(OlmError::InputBufferTooSmall));
    }
}
