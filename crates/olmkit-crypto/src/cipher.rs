//! Authenticated encryption used by messages, group messages and pickles
//!
//! [`AesSha256Cipher`] derives an AES-256 key, an HMAC key and a CBC IV from
//! the caller's key material with one HKDF call, encrypts with AES-256-CBC,
//! and appends a truncated HMAC-SHA-256 tag.
//!
//! # Framing
//!
//! The MAC covers the whole output buffer up to the tag, not only the
//! ciphertext. Callers write their header into the front of the buffer and
//! pass its length as `ciphertext_offset`, so the header is authenticated
//! along with the ciphertext that follows it:
//!
//! ```text
//! ┌──────────────┬──────────────────────┬─────────┐
//! │ header bytes │ AES-256-CBC(payload) │ MAC (8) │
//! └──────────────┴──────────────────────┴─────────┘
//! └──────────── HMAC-SHA-256 input ─────┘
//! ```
//!
//! # Security
//!
//! Decryption verifies the tag in constant time before touching the
//! ciphertext. A bad tag and a bad PKCS#7 padding block are both reported
//! as [`CryptoError::BadMac`].

use std::ops::Range;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{
    aes_cbc::{
        AES_IV_LENGTH, AES_KEY_LENGTH, Aes256Iv, Aes256Key, aes_cbc_decrypt, aes_cbc_encrypt,
        aes_cbc_encrypt_length,
    },
    digest::{SHA256_OUTPUT_LENGTH, hkdf_sha256, hmac_sha256},
    error::CryptoError,
    memory,
};

/// Length of the truncated HMAC tag
pub const MAC_LENGTH: usize = 8;

const HMAC_KEY_LENGTH: usize = SHA256_OUTPUT_LENGTH;
const DERIVED_LENGTH: usize = AES_KEY_LENGTH + HMAC_KEY_LENGTH + AES_IV_LENGTH;

/// Authenticated cipher operations.
///
/// The protocol uses one concrete cipher, but sessions and pickles are
/// written against this trait so the construction is stated in one place.
pub trait Cipher {
    /// Length of the authentication tag appended after the ciphertext.
    fn mac_length(&self) -> usize;

    /// Ciphertext length (without tag) for a plaintext of the given length.
    fn ciphertext_length(&self, plaintext_length: usize) -> usize;

    /// Encrypt `plaintext` into `output` after the first `ciphertext_offset`
    /// bytes, then append the tag.
    ///
    /// `output[..ciphertext_offset]` must already hold the header to be
    /// authenticated. Returns the total length written, header included.
    fn encrypt(
        &self,
        key: &[u8],
        plaintext: &[u8],
        output: &mut [u8],
        ciphertext_offset: usize,
    ) -> Result<usize, CryptoError>;

    /// Upper bound on the plaintext a ciphertext of this length can hold.
    fn max_plaintext_length(&self, ciphertext_length: usize) -> usize;

    /// Verify the tag at the end of `input` and decrypt
    /// `input[ciphertext]` into `plaintext`.
    ///
    /// The tag covers `input` up to the tag itself. Returns the plaintext
    /// length. Nothing is written to `plaintext` when the tag is wrong.
    fn decrypt(
        &self,
        key: &[u8],
        input: &[u8],
        ciphertext: Range<usize>,
        plaintext: &mut [u8],
    ) -> Result<usize, CryptoError>;
}

/// AES-256-CBC with an HMAC-SHA-256 tag truncated to [`MAC_LENGTH`] bytes.
///
/// `kdf_info` separates the keys derived for different uses of the same
/// key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AesSha256Cipher {
    kdf_info: &'static [u8],
}

impl AesSha256Cipher {
    /// Cipher whose keys are derived with the given HKDF info string.
    pub const fn new(kdf_info: &'static [u8]) -> Self {
        Self { kdf_info }
    }

    /// HKDF info string this cipher derives its keys with.
    pub const fn kdf_info(&self) -> &'static [u8] {
        self.kdf_info
    }

    fn derive_keys(&self, key: &[u8]) -> Result<DerivedKeys, CryptoError> {
        let mut derived = Zeroizing::new([0u8; DERIVED_LENGTH]);
        hkdf_sha256(key, &[], self.kdf_info, derived.as_mut_slice())?;

        let mut keys = DerivedKeys {
            aes_key: Aes256Key([0u8; AES_KEY_LENGTH]),
            mac_key: [0u8; HMAC_KEY_LENGTH],
            aes_iv: Aes256Iv([0u8; AES_IV_LENGTH]),
        };
        keys.aes_key.0.copy_from_slice(&derived[..AES_KEY_LENGTH]);
        keys.mac_key.copy_from_slice(&derived[AES_KEY_LENGTH..AES_KEY_LENGTH + HMAC_KEY_LENGTH]);
        keys.aes_iv.0.copy_from_slice(&derived[AES_KEY_LENGTH + HMAC_KEY_LENGTH..]);
        Ok(keys)
    }
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct DerivedKeys {
    aes_key: Aes256Key,
    mac_key: [u8; HMAC_KEY_LENGTH],
    aes_iv: Aes256Iv,
}

impl DerivedKeys {
    fn mac(&self, input: &[u8]) -> [u8; MAC_LENGTH] {
        let full = Zeroizing::new(hmac_sha256(&self.mac_key, input));
        let mut tag = [0u8; MAC_LENGTH];
        tag.copy_from_slice(&full[..MAC_LENGTH]);
        tag
    }
}

impl Cipher for AesSha256Cipher {
    fn mac_length(&self) -> usize {
        MAC_LENGTH
    }

    fn ciphertext_length(&self, plaintext_length: usize) -> usize {
        aes_cbc_encrypt_length(plaintext_length)
    }

    fn encrypt(
        &self,
        key: &[u8],
        plaintext: &[u8],
        output: &mut [u8],
        ciphertext_offset: usize,
    ) -> Result<usize, CryptoError> {
        let ciphertext_length = self.ciphertext_length(plaintext.len());
        let mac_start = ciphertext_offset + ciphertext_length;
        let required = mac_start + MAC_LENGTH;
        if output.len() < required {
            return Err(CryptoError::OutputBufferTooSmall { required, available: output.len() });
        }

        let keys = self.derive_keys(key)?;
        aes_cbc_encrypt(
            &keys.aes_key,
            &keys.aes_iv,
            plaintext,
            &mut output[ciphertext_offset..mac_start],
        )?;

        let tag = keys.mac(&output[..mac_start]);
        output[mac_start..required].copy_from_slice(&tag);
        Ok(required)
    }

    fn max_plaintext_length(&self, ciphertext_length: usize) -> usize {
        ciphertext_length
    }

    fn decrypt(
        &self,
        key: &[u8],
        input: &[u8],
        ciphertext: Range<usize>,
        plaintext: &mut [u8],
    ) -> Result<usize, CryptoError> {
        if input.len() < MAC_LENGTH {
            return Err(CryptoError::InputBufferTooSmall {
                required: MAC_LENGTH,
                actual: input.len(),
            });
        }

        let mac_start = input.len() - MAC_LENGTH;
        if ciphertext.start > ciphertext.end || ciphertext.end > mac_start {
            return Err(CryptoError::InputBufferTooSmall {
                required: ciphertext.end + MAC_LENGTH,
                actual: input.len(),
            });
        }

        let keys = self.derive_keys(key)?;
        let expected = keys.mac(&input[..mac_start]);
        if !memory::is_equal(&expected, &input[mac_start..]) {
            return Err(CryptoError::BadMac);
        }

        // Decrypt into scratch so a padding failure leaves `plaintext` clean.
        let ciphertext = &input[ciphertext];
        let mut scratch = Zeroizing::new(vec![0u8; ciphertext.len()]);
        let length = aes_cbc_decrypt(&keys.aes_key, &keys.aes_iv, ciphertext, &mut scratch)?;

        if plaintext.len() < length {
            return Err(CryptoError::OutputBufferTooSmall {
                required: length,
                available: plaintext.len(),
            });
        }
        plaintext[..length].copy_from_slice(&scratch[..length]);
        Ok(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CIPHER: AesSha256Cipher = AesSha256Cipher::new(b"TEST_KEYS");

    fn seal(key: &[u8], header: &[u8], plaintext: &[u8]) -> Vec<u8> {
        let length = header.len() + CIPHER.ciphertext_length(plaintext.len()) + MAC_LENGTH;
        let mut output = vec![0u8; length];
        output[..header.len()].copy_from_slice(header);
        let written = CIPHER.encrypt(key, plaintext, &mut output, header.len()).unwrap();
        assert_eq!(written, length);
        output
    }

    fn open(key: &[u8], sealed: &[u8], header_length: usize) -> Result<Vec<u8>, CryptoError> {
        let ciphertext = header_length..sealed.len() - MAC_LENGTH;
        let mut plaintext = vec![0u8; CIPHER.max_plaintext_length(ciphertext.len())];
        let length = CIPHER.decrypt(key, sealed, ciphertext, &mut plaintext)?;
        plaintext.truncate(length);
        Ok(plaintext)
    }

    #[test]
    fn roundtrip_with_header() {
        let sealed = seal(b"key material", b"\x03header", b"hello world");
        assert_eq!(&sealed[..7], b"\x03header");
        assert_eq!(open(b"key material", &sealed, 7).unwrap(), b"hello world");
    }

    #[test]
    fn roundtrip_empty_plaintext() {
        let sealed = seal(b"k", b"", b"");
        assert_eq!(sealed.len(), 16 + MAC_LENGTH);
        assert_eq!(open(b"k", &sealed, 0).unwrap(), b"");
    }

    #[test]
    fn header_is_authenticated() {
        let mut sealed = seal(b"key", b"\x03\x0a", b"payload");
        sealed[1] ^= 0x01;
        assert_eq!(open(b"key", &sealed, 2), Err(CryptoError::BadMac));
    }

    #[test]
    fn ciphertext_is_authenticated() {
        let mut sealed = seal(b"key", b"", b"payload");
        sealed[3] ^= 0x80;
        assert_eq!(open(b"key", &sealed, 0), Err(CryptoError::BadMac));
    }

    #[test]
    fn mac_is_checked() {
        let mut sealed = seal(b"key", b"", b"payload");
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert_eq!(open(b"key", &sealed, 0), Err(CryptoError::BadMac));
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = seal(b"key", b"", b"payload");
        assert_eq!(open(b"other key", &sealed, 0), Err(CryptoError::BadMac));
    }

    #[test]
    fn kdf_info_separates_keys() {
        let sealed = seal(b"key", b"", b"payload");

        let other = AesSha256Cipher::new(b"OTHER_KEYS");
        let ciphertext = 0..sealed.len() - MAC_LENGTH;
        let mut plaintext = vec![0u8; sealed.len()];
        let result = other.decrypt(b"key", &sealed, ciphertext, &mut plaintext);
        assert_eq!(result, Err(CryptoError::BadMac));
    }

    #[test]
    fn bad_padding_under_valid_mac_is_bad_mac() {
        // Authentic tag over a ciphertext whose padding is invalid: drop
        // the final block, then re-tag what is left.
        let key = b"key";
        let sealed = seal(key, b"", &[0x42u8; 16]);
        let keys = CIPHER.derive_keys(key).unwrap();

        let mut forged = sealed[..16].to_vec();
        let tag = keys.mac(&forged);
        forged.extend_from_slice(&tag);

        assert_eq!(open(key, &forged, 0), Err(CryptoError::BadMac));
    }

    #[test]
    fn failed_decrypt_leaves_output_untouched() {
        let mut sealed = seal(b"key", b"", b"payload");
        sealed[0] ^= 0x01;

        let mut plaintext = [0xAAu8; 32];
        let result = CIPHER.decrypt(b"key", &sealed, 0..16, &mut plaintext);
        assert!(result.is_err());
        assert_eq!(plaintext, [0xAAu8; 32]);
    }

    #[test]
    fn encrypt_checks_output_length() {
        let mut output = [0u8; 23];
        let result = CIPHER.encrypt(b"key", b"payload", &mut output, 0);
        assert_eq!(result, Err(CryptoError::OutputBufferTooSmall { required: 24, available: 23 }));
    }

    #[test]
    fn decrypt_rejects_input_shorter_than_mac() {
        let mut plaintext = [0u8; 16];
        let result = CIPHER.decrypt(b"key", &[0u8; 7], 0..0, &mut plaintext);
        assert_eq!(result, Err(CryptoError::InputBufferTooSmall { required: 8, actual: 7 }));
    }

    #[test]
    fn decrypt_rejects_ciphertext_overlapping_mac() {
        let sealed = seal(b"key", b"", b"payload");
        let mut plaintext = [0u8; 32];
        let result = CIPHER.decrypt(b"key", &sealed, 0..sealed.len(), &mut plaintext);
        assert!(matches!(result, Err(CryptoError::InputBufferTooSmall { .. })));
    }
}
