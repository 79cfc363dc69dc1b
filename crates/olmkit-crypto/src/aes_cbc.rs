//! AES-256-CBC with PKCS#7 padding

use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size
pub const AES_BLOCK_LENGTH: usize = 16;

/// AES-256 key length
pub const AES_KEY_LENGTH: usize = 32;

/// CBC initialisation vector length
pub const AES_IV_LENGTH: usize = 16;

/// AES-256 key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Aes256Key(pub [u8; AES_KEY_LENGTH]);

/// AES-CBC initialisation vector.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Aes256Iv(pub [u8; AES_IV_LENGTH]);

/// Ciphertext length for a plaintext of `plaintext_length` bytes.
///
/// PKCS#7 always adds between 1 and 16 bytes, so an exact multiple of the
/// block size gains a whole padding block.
pub const fn aes_cbc_encrypt_length(plaintext_length: usize) -> usize {
    plaintext_length + AES_BLOCK_LENGTH - plaintext_length % AES_BLOCK_LENGTH
}

/// Encrypt `plaintext` into the front of `output`.
///
/// Returns the ciphertext length.
pub fn aes_cbc_encrypt(
    key: &Aes256Key,
    iv: &Aes256Iv,
    plaintext: &[u8],
    output: &mut [u8],
) -> Result<usize, CryptoError> {
    let required = aes_cbc_encrypt_length(plaintext.len());
    if output.len() < required {
        return Err(CryptoError::OutputBufferTooSmall { required, available: output.len() });
    }

    let available = output.len();
    let encryptor = Aes256CbcEnc::new(&key.0.into(), &iv.0.into());
    encryptor
        .encrypt_padded_b2b_mut::<Pkcs7>(plaintext, &mut output[..required])
        .map(<[u8]>::len)
        .map_err(|_| CryptoError::OutputBufferTooSmall { required, available })
}

/// Decrypt `ciphertext` into the front of `output` and strip the padding.
///
/// Returns the plaintext length.
///
/// # Errors
///
/// - `OutputBufferTooSmall` if `output` is shorter than `ciphertext`
/// - `BadMac` if the ciphertext is not a whole number of blocks or the
///   padding is malformed. The padding failure is reported as an
///   authentication failure so it is indistinguishable from a MAC mismatch.
pub fn aes_cbc_decrypt(
    key: &Aes256Key,
    iv: &Aes256Iv,
    ciphertext: &[u8],
    output: &mut [u8],
) -> Result<usize, CryptoError> {
    if output.len() < ciphertext.len() {
        return Err(CryptoError::OutputBufferTooSmall {
            required: ciphertext.len(),
            available: output.len(),
        });
    }

    let decryptor = Aes256CbcDec::new(&key.0.into(), &iv.0.into());
    decryptor
        .decrypt_padded_b2b_mut::<Pkcs7>(ciphertext, output)
        .map(<[u8]>::len)
        .map_err(|_| CryptoError::BadMac)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector_key() -> Aes256Key {
        let key = hex::decode("4e22eb16d964779994222e82192ce9f747da72dc4abe49dfdeeb71d0ffe3796e")
            .unwrap();
        Aes256Key(key.try_into().unwrap())
    }

    fn vector_iv() -> Aes256Iv {
        let iv = hex::decode("6f8a557ddc0a140c878063a6d5f31d3d").unwrap();
        Aes256Iv(iv.try_into().unwrap())
    }

    #[test]
    fn encrypt_known_vector() {
        let plaintext = hex::decode("30736294a124482a4159").unwrap();
        let mut output = [0u8; 16];

        let written =
            aes_cbc_encrypt(&vector_key(), &vector_iv(), &plaintext, &mut output).unwrap();

        assert_eq!(written, 16);
        assert_eq!(hex::encode(output), "dd3f573ab4508b9ed0e45e0baf5608f3");
    }

    #[test]
    fn decrypt_known_vector() {
        let ciphertext = hex::decode("dd3f573ab4508b9ed0e45e0baf5608f3").unwrap();
        let mut output = [0u8; 16];

        let written =
            aes_cbc_decrypt(&vector_key(), &vector_iv(), &ciphertext, &mut output).unwrap();

        assert_eq!(hex::encode(&output[..written]), "30736294a124482a4159");
    }

    #[test]
    fn block_aligned_plaintext_gains_full_padding_block() {
        assert_eq!(aes_cbc_encrypt_length(0), 16);
        assert_eq!(aes_cbc_encrypt_length(15), 16);
        assert_eq!(aes_cbc_encrypt_length(16), 32);
        assert_eq!(aes_cbc_encrypt_length(17), 32);
    }

    #[test]
    fn rejects_partial_block() {
        let mut output = [0u8; 32];
        let result = aes_cbc_decrypt(&vector_key(), &vector_iv(), &[0u8; 15], &mut output);
        assert_eq!(result, Err(CryptoError::BadMac));
    }

    #[test]
    fn rejects_empty_ciphertext() {
        let mut output = [0u8; 16];
        let result = aes_cbc_decrypt(&vector_key(), &vector_iv(), &[], &mut output);
        assert_eq!(result, Err(CryptoError::BadMac));
    }

    #[test]
    fn rejects_bad_padding() {
        // The first block alone decrypts to 0x42 bytes, and 0x42 is not a
        // valid padding length.
        let plaintext = [0x42u8; 16];
        let mut ciphertext = [0u8; 32];
        aes_cbc_encrypt(&vector_key(), &vector_iv(), &plaintext, &mut ciphertext).unwrap();

        let mut output = [0u8; 16];
        let result = aes_cbc_decrypt(&vector_key(), &vector_iv(), &ciphertext[..16], &mut output);
        assert_eq!(result, Err(CryptoError::BadMac));
    }

    #[test]
    fn encrypt_checks_output_length() {
        let mut output = [0u8; 15];
        let result = aes_cbc_encrypt(&vector_key(), &vector_iv(), b"short", &mut output);
        assert_eq!(result, Err(CryptoError::OutputBufferTooSmall { required: 16, available: 15 }));
    }
}
