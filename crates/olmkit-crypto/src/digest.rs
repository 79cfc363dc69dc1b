//! SHA-256, HMAC-SHA-256 and HKDF-SHA-256

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Length of a SHA-256 digest and of an HMAC-SHA-256 tag
pub const SHA256_OUTPUT_LENGTH: usize = 32;

/// SHA-256 digest of `input`.
pub fn sha256(input: &[u8]) -> [u8; SHA256_OUTPUT_LENGTH] {
    Sha256::digest(input).into()
}

/// HMAC-SHA-256 of `input` under `key`.
///
/// Keys of any length are accepted.
pub fn hmac_sha256(key: &[u8], input: &[u8]) -> [u8; SHA256_OUTPUT_LENGTH] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(input);
    mac.finalize().into_bytes().into()
}

/// HKDF-SHA-256 (RFC 5869) filling `output`.
///
/// An empty `salt` means "no salt", which HKDF treats as 32 zero bytes.
///
/// # Errors
///
/// - `OutputBufferTooSmall` if `output` is longer than 255 hash blocks,
///   the most a single-byte expansion counter can address
pub fn hkdf_sha256(
    input: &[u8],
    salt: &[u8],
    info: &[u8],
    output: &mut [u8],
) -> Result<(), CryptoError> {
    let salt = (!salt.is_empty()).then_some(salt);
    let hkdf = Hkdf::<Sha256>::new(salt, input);

    hkdf.expand(info, output).map_err(|_| CryptoError::OutputBufferTooSmall {
        required: output.len(),
        available: 255 * SHA256_OUTPUT_LENGTH,
    })
}
