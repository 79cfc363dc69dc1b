//! Error types for the primitive layer

use thiserror::Error;

/// Errors from primitive and codec operations.
///
/// Authentication failures are deliberately coarse: a MAC mismatch and a
/// malformed PKCS#7 padding block produce the same [`CryptoError::BadMac`]
/// so callers cannot be used as a padding oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Caller-provided output buffer cannot hold the result
    #[error("output buffer too small: need {required} bytes, have {available}")]
    OutputBufferTooSmall {
        /// Bytes the operation needs to write
        required: usize,
        /// Bytes the caller provided
        available: usize,
    },

    /// Input is shorter than the fixed framing it must contain
    #[error("input buffer too small: need {required} bytes, have {actual}")]
    InputBufferTooSmall {
        /// Minimum input length
        required: usize,
        /// Actual input length
        actual: usize,
    },

    /// Base64 text has a length no encoder can produce
    #[error("invalid base64 length: {length}")]
    InvalidBase64 {
        /// Length of the rejected text
        length: usize,
    },

    /// Authentication failed (MAC mismatch or invalid padding)
    #[error("message authentication failed")]
    BadMac,

    /// Key material has the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },
}

impl CryptoError {
    /// Returns true if this error is an authentication failure.
    ///
    /// Authentication failures mean the input was tampered with or the key
    /// is wrong. Every other variant is a caller bug or malformed framing.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::BadMac)
    }
}
