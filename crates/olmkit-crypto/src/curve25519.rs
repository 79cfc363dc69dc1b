//! Curve25519 key pairs and Diffie-Hellman

use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{base64, error::CryptoError, memory};

/// Curve25519 public and private key length
pub const CURVE25519_KEY_LENGTH: usize = 32;

/// Random bytes consumed by [`Curve25519KeyPair::from_random`]
pub const CURVE25519_RANDOM_LENGTH: usize = CURVE25519_KEY_LENGTH;

/// Length of a Diffie-Hellman shared secret
pub const CURVE25519_SHARED_SECRET_LENGTH: usize = 32;

/// Curve25519 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Curve25519PublicKey(pub [u8; CURVE25519_KEY_LENGTH]);

impl Curve25519PublicKey {
    /// Parse a public key from exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        memory::load_array(bytes).map(Self).ok_or(CryptoError::InvalidKeyLength {
            expected: CURVE25519_KEY_LENGTH,
            actual: bytes.len(),
        })
    }

    /// Parse a public key from unpadded base64.
    ///
    /// Text that does not decode to exactly 32 bytes is `InvalidBase64`.
    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        let invalid = CryptoError::InvalidBase64 { length: text.len() };
        if base64::decoded_length(text.len()) != Some(CURVE25519_KEY_LENGTH) {
            return Err(invalid);
        }

        let mut key = [0u8; CURVE25519_KEY_LENGTH];
        base64::decode_into(text.as_bytes(), &mut key)?;
        Ok(Self(key))
    }

    /// Unpadded base64 rendering of the key.
    pub fn to_base64(&self) -> String {
        base64::encode(&self.0)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; CURVE25519_KEY_LENGTH] {
        &self.0
    }

    /// Constant-time equality.
    pub fn ct_eq(&self, other: &Self) -> bool {
        memory::is_equal(&self.0, &other.0)
    }
}

/// Curve25519 private key as supplied by the caller's randomness.
///
/// The bytes are stored unclamped; clamping happens inside every scalar
/// multiplication.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Curve25519PrivateKey(pub [u8; CURVE25519_KEY_LENGTH]);

/// Curve25519 key pair.
#[derive(Clone)]
pub struct Curve25519KeyPair {
    /// Public half
    pub public_key: Curve25519PublicKey,
    /// Private half
    pub private_key: Curve25519PrivateKey,
}

impl Curve25519KeyPair {
    /// Derive a key pair from 32 random bytes.
    pub fn from_random(random: &[u8; CURVE25519_RANDOM_LENGTH]) -> Self {
        Self::from_private_key(Curve25519PrivateKey(*random))
    }

    /// Rebuild a key pair from its private half.
    pub fn from_private_key(private_key: Curve25519PrivateKey) -> Self {
        let secret = StaticSecret::from(private_key.0);
        let public_key = Curve25519PublicKey(PublicKey::from(&secret).to_bytes());
        Self { public_key, private_key }
    }

    /// Diffie-Hellman agreement between our private key and `their_key`.
    pub fn shared_secret(
        &self,
        their_key: &Curve25519PublicKey,
    ) -> Zeroizing<[u8; CURVE25519_SHARED_SECRET_LENGTH]> {
        let secret = StaticSecret::from(self.private_key.0);
        let shared = secret.diffie_hellman(&PublicKey::from(their_key.0));
        Zeroizing::new(shared.to_bytes())
    }
}

impl std::fmt::Debug for Curve25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Curve25519KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}
