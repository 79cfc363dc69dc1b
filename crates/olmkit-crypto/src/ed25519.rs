//! Ed25519 key pairs, detached signatures and verification

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{base64, error::CryptoError, memory};

/// Ed25519 public key length
pub const ED25519_PUBLIC_KEY_LENGTH: usize = 32;

/// Stored private key length: the 32-byte seed followed by the public key
pub const ED25519_PRIVATE_KEY_LENGTH: usize = 64;

/// Detached signature length
pub const ED25519_SIGNATURE_LENGTH: usize = 64;

/// Random bytes consumed by [`Ed25519KeyPair::from_random`]
pub const ED25519_RANDOM_LENGTH: usize = 32;

/// Ed25519 public (verification) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ed25519PublicKey(pub [u8; ED25519_PUBLIC_KEY_LENGTH]);

impl Ed25519PublicKey {
    /// Parse a public key from exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        memory::load_array(bytes).map(Self).ok_or(CryptoError::InvalidKeyLength {
            expected: ED25519_PUBLIC_KEY_LENGTH,
            actual: bytes.len(),
        })
    }

    /// Parse a public key from unpadded base64.
    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        if base64::decoded_length(text.len()) != Some(ED25519_PUBLIC_KEY_LENGTH) {
            return Err(CryptoError::InvalidBase64 { length: text.len() });
        }

        let mut key = [0u8; ED25519_PUBLIC_KEY_LENGTH];
        base64::decode_into(text.as_bytes(), &mut key)?;
        Ok(Self(key))
    }

    /// Unpadded base64 rendering of the key.
    pub fn to_base64(&self) -> String {
        base64::encode(&self.0)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; ED25519_PUBLIC_KEY_LENGTH] {
        &self.0
    }

    /// Verify a detached signature over `message`.
    ///
    /// Returns false for malformed keys, signatures of the wrong length,
    /// and signatures that do not verify. Comparisons inside the curve
    /// arithmetic are constant time.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        verifying_key.verify(message, &signature).is_ok()
    }
}

/// Ed25519 private key: seed followed by the matching public key.
///
/// Only the seed is secret; the public half is kept alongside it so the
/// stored form has a fixed 64-byte layout.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Ed25519PrivateKey(pub [u8; ED25519_PRIVATE_KEY_LENGTH]);

/// Ed25519 key pair.
#[derive(Clone)]
pub struct Ed25519KeyPair {
    /// Public half
    pub public_key: Ed25519PublicKey,
    /// Private half
    pub private_key: Ed25519PrivateKey,
}

impl Ed25519KeyPair {
    /// Derive a key pair from a 32-byte seed.
    pub fn from_random(random: &[u8; ED25519_RANDOM_LENGTH]) -> Self {
        let signing_key = SigningKey::from_bytes(random);
        let public_key = Ed25519PublicKey(signing_key.verifying_key().to_bytes());

        let mut private_key = Ed25519PrivateKey([0u8; ED25519_PRIVATE_KEY_LENGTH]);
        private_key.0[..ED25519_RANDOM_LENGTH].copy_from_slice(random);
        private_key.0[ED25519_RANDOM_LENGTH..].copy_from_slice(&public_key.0);

        Self { public_key, private_key }
    }

    /// Rebuild a key pair from its stored halves.
    ///
    /// Returns `None` if the private key does not belong to `public_key`.
    pub fn from_parts(
        public_key: Ed25519PublicKey,
        private_key: Ed25519PrivateKey,
    ) -> Option<Self> {
        let rebuilt = Self::from_random(&*seed(&private_key));
        let consistent = memory::is_equal(&rebuilt.public_key.0, &public_key.0)
            && memory::is_equal(&rebuilt.private_key.0, &private_key.0);

        consistent.then_some(rebuilt)
    }

    /// Detached signature over `message`.
    pub fn sign(&self, message: &[u8]) -> [u8; ED25519_SIGNATURE_LENGTH] {
        let signing_key = SigningKey::from_bytes(&*seed(&self.private_key));
        signing_key.sign(message).to_bytes()
    }
}

fn seed(private_key: &Ed25519PrivateKey) -> Zeroizing<[u8; ED25519_RANDOM_LENGTH]> {
    let mut seed = Zeroizing::new([0u8; ED25519_RANDOM_LENGTH]);
    seed.copy_from_slice(&private_key.0[..ED25519_RANDOM_LENGTH]);
    seed
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}
