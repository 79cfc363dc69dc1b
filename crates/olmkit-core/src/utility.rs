//! Stateless helpers: hashing and signature verification

use olmkit_crypto::{Ed25519PublicKey, base64, digest};

use crate::error::OlmError;

/// Unpadded base64 SHA-256 digest of `input`.
pub fn sha256(input: &[u8]) -> String {
    base64::encode(&digest::sha256(input))
}

/// Verify a base64 Ed25519 `signature` over `message` by the base64 `key`.
///
/// # Errors
///
/// - `InvalidBase64` if the key or signature is not base64, or the key is
///   not 32 bytes
/// - `BadSignature` if the signature does not verify
pub fn ed25519_verify(key: &str, message: &[u8], signature: &str) -> Result<(), OlmError> {
    let key = Ed25519PublicKey::from_base64(key)?;
    let signature = base64::decode(signature.as_bytes()).map_err(|_| OlmError::InvalidBase64)?;
    if key.verify(message, &signature) { Ok(()) } else { Err(OlmError::BadSignature) }
}
