//! Short Authentication String key agreement
//!
//! Two devices exchange ephemeral Curve25519 keys over an untrusted channel,
//! then compare a few bytes derived from the shared secret (shown as emoji
//! or numbers) out of band. MACs keyed from the same secret later bind the
//! devices' long-term keys to the verified exchange.

use olmkit_crypto::{
    CURVE25519_RANDOM_LENGTH, Curve25519KeyPair, Curve25519PublicKey, base64,
    curve25519::CURVE25519_SHARED_SECRET_LENGTH,
    digest::{SHA256_OUTPUT_LENGTH, hkdf_sha256, hmac_sha256},
    memory,
};
use zeroize::Zeroizing;

use crate::error::OlmError;

type SharedSecret = Zeroizing<[u8; CURVE25519_SHARED_SECRET_LENGTH]>;

/// One side of a SAS exchange.
pub struct Sas {
    key_pair: Curve25519KeyPair,
    shared_secret: Option<SharedSecret>,
}

impl Sas {
    /// Random bytes consumed by [`new`](Self::new).
    pub fn new_random_length() -> usize {
        CURVE25519_RANDOM_LENGTH
    }

    /// Start an exchange with an ephemeral key from `random`.
    ///
    /// # Errors
    ///
    /// - `NotEnoughRandom` if `random` is shorter than 32 bytes
    pub fn new(random: &[u8]) -> Result<Self, OlmError> {
        let random = memory::load_prefix::<CURVE25519_RANDOM_LENGTH>(random)
            .map(Zeroizing::new)
            .ok_or(OlmError::NotEnoughRandom)?;
        Ok(Self { key_pair: Curve25519KeyPair::from_random(&random), shared_secret: None })
    }

    /// Base64 ephemeral public key to send to the other device.
    pub fn public_key(&self) -> String {
        self.key_pair.public_key.to_base64()
    }

    /// Returns true once [`set_their_key`](Self::set_their_key) succeeded.
    pub fn has_their_key(&self) -> bool {
        self.shared_secret.is_some()
    }

    /// Complete the agreement with the other device's base64 key.
    ///
    /// # Errors
    ///
    /// - `InvalidBase64` if the key is not 32 bytes of base64
    pub fn set_their_key(&mut self, their_key: &str) -> Result<(), OlmError> {
        let their_key = Curve25519PublicKey::from_base64(their_key)?;
        self.shared_secret = Some(self.key_pair.shared_secret(&their_key));
        Ok(())
    }

    fn shared_secret(&self) -> Result<&SharedSecret, OlmError> {
        self.shared_secret.as_ref().ok_or(OlmError::SasTheirKeyNotSet)
    }

    /// `length` bytes derived from the shared secret with `info`, for
    /// display.
    ///
    /// # Errors
    ///
    /// - `SasTheirKeyNotSet` before the other key is set
    /// - `OutputBufferTooSmall` if `length` exceeds what HKDF can produce
    pub fn generate_bytes(&self, info: &[u8], length: usize) -> Result<Vec<u8>, OlmError> {
        let secret = self.shared_secret()?;
        let mut output = vec![0u8; length];
        hkdf_sha256(secret.as_slice(), &[], info, &mut output)?;
        Ok(output)
    }

    /// Base64 HMAC-SHA-256 of `input` under a key derived with `info`.
    ///
    /// # Errors
    ///
    /// - `SasTheirKeyNotSet` before the other key is set
    pub fn calculate_mac(&self, input: &[u8], info: &[u8]) -> Result<String, OlmError> {
        let secret = self.shared_secret()?;
        let mut mac_key = Zeroizing::new([0u8; SHA256_OUTPUT_LENGTH]);
        let Ok(()) = hkdf_sha256(secret.as_slice(), &[], info, mac_key.as_mut_slice()) else {
            unreachable!("32 bytes is within the HKDF output limit");
        };
        Ok(base64::encode(&hmac_sha256(mac_key.as_slice(), input)))
    }
}

impl std::fmt::Debug for Sas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sas")
            .field("public_key", &self.public_key())
            .field("has_their_key", &self.has_their_key())
            .finish_non_exhaustive()
    }
}
