//! Olmkit Cryptographic Primitives
//!
//! Leaf building blocks for the Olm and Megolm ratchets. Pure functions with
//! deterministic outputs: callers provide every random byte, so the same
//! inputs always give the same keys, ciphertexts and signatures.
//!
//! # Key Lifecycle
//!
//! Every message and pickle key in the protocol ends up in the same
//! authenticated cipher. The layers above only differ in how they produce
//! the input key material and which HKDF info string they pass:
//!
//! ```text
//! Curve25519 ECDH / Megolm ratchet / pickle passphrase
//!        │
//!        ▼
//! HKDF-SHA-256(info) → AES key ‖ HMAC key ‖ IV
//!        │
//!        ▼
//! AES-256-CBC + truncated HMAC-SHA-256 → ciphertext ‖ MAC
//! ```
//!
//! # Security
//!
//! Secret erasure:
//! - Private keys and derived cipher keys derive `ZeroizeOnDrop`
//! - Temporaries holding secrets are wrapped in `Zeroizing`
//!
//! Authenticity:
//! - MACs and signatures are checked before any decryption happens
//! - Tag comparison is constant time ([`memory::is_equal`])
//! - Padding failures are indistinguishable from MAC failures

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aes_cbc;
pub mod base64;
pub mod cipher;
pub mod curve25519;
pub mod digest;
pub mod ed25519;
pub mod error;
pub mod memory;

pub use cipher::{AesSha256Cipher, Cipher, MAC_LENGTH};
pub use curve25519::{
    CURVE25519_KEY_LENGTH, CURVE25519_RANDOM_LENGTH, Curve25519KeyPair, Curve25519PrivateKey,
    Curve25519PublicKey,
};
pub use ed25519::{
    ED25519_PRIVATE_KEY_LENGTH, ED25519_PUBLIC_KEY_LENGTH, ED25519_RANDOM_LENGTH,
    ED25519_SIGNATURE_LENGTH, Ed25519KeyPair, Ed25519PrivateKey, Ed25519PublicKey,
};
pub use error::CryptoError;
