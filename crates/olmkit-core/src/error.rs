//! Error taxonomy shared by every protocol object
//!
//! One flat enum covers all failures visible to callers. Lower layers have
//! their own error types ([`CryptoError`], [`PickleError`]) that are
//! translated here, at the boundary of the object that called them.

use olmkit_crypto::CryptoError;
use olmkit_proto::PickleError;
use thiserror::Error;

/// Errors returned by accounts, sessions, group sessions and helpers.
///
/// The variants and their [`code`](Self::code) strings are stable and match
/// the names used by other implementations of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum OlmError {
    /// Caller supplied fewer random bytes than the operation needs
    #[error("not enough random bytes")]
    NotEnoughRandom,

    /// Output buffer cannot hold the result
    #[error("output buffer too small")]
    OutputBufferTooSmall,

    /// Input is too short to contain the required framing
    #[error("input buffer too small")]
    InputBufferTooSmall,

    /// Message carries a protocol version this build does not speak
    #[error("unsupported message version")]
    BadMessageVersion,

    /// Message is missing fields or has fields of the wrong size
    #[error("malformed message")]
    BadMessageFormat,

    /// Message failed authentication
    #[error("message authentication failed")]
    BadMessageMac,

    /// Message refers to a key we do not have
    #[error("message refers to an unknown key")]
    BadMessageKeyId,

    /// Text is not valid unpadded base64
    #[error("invalid base64")]
    InvalidBase64,

    /// Pickle could not be decrypted with the supplied key
    #[error("wrong pickle key")]
    BadAccountKey,

    /// Pickle version is not supported
    #[error("unknown pickle version")]
    UnknownPickleVersion,

    /// Pickle decrypted but its content is malformed
    #[error("corrupted pickle")]
    CorruptedPickle,

    /// Exported group session key is malformed
    #[error("invalid session key")]
    BadSessionKey,

    /// Group message index precedes the earliest index we can decrypt
    #[error("unknown message index")]
    UnknownMessageIndex,

    /// Account pickle uses an insecure legacy format
    #[error("legacy account pickle is not supported")]
    BadLegacyAccountPickle,

    /// Signature did not verify
    #[error("bad signature")]
    BadSignature,

    /// SAS operation attempted before the other party's key was set
    #[error("the other party's SAS key has not been set")]
    SasTheirKeyNotSet,
}

impl OlmError {
    /// Stable upper-snake-case name of the error.
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotEnoughRandom => "NOT_ENOUGH_RANDOM",
            Self::OutputBufferTooSmall => "OUTPUT_BUFFER_TOO_SMALL",
            Self::InputBufferTooSmall => "INPUT_BUFFER_TOO_SMALL",
            Self::BadMessageVersion => "BAD_MESSAGE_VERSION",
            Self::BadMessageFormat => "BAD_MESSAGE_FORMAT",
            Self::BadMessageMac => "BAD_MESSAGE_MAC",
            Self::BadMessageKeyId => "BAD_MESSAGE_KEY_ID",
            Self::InvalidBase64 => "INVALID_BASE64",
            Self::BadAccountKey => "BAD_ACCOUNT_KEY",
            Self::UnknownPickleVersion => "UNKNOWN_PICKLE_VERSION",
            Self::CorruptedPickle => "CORRUPTED_PICKLE",
            Self::BadSessionKey => "BAD_SESSION_KEY",
            Self::UnknownMessageIndex => "UNKNOWN_MESSAGE_INDEX",
            Self::BadLegacyAccountPickle => "BAD_LEGACY_ACCOUNT_PICKLE",
            Self::BadSignature => "BAD_SIGNATURE",
            Self::SasTheirKeyNotSet => "SAS_THEIR_KEY_NOT_SET",
        }
    }

    /// Returns true if the input was forged, tampered with, or
    /// authenticated under a different key.
    pub fn is_authentication_failure(self) -> bool {
        matches!(self, Self::BadMessageMac | Self::BadSignature)
    }
}

/// Primitive failures seen while processing a message.
///
/// Objects that call the cipher for something other than messages (pickles)
/// map [`CryptoError::BadMac`] themselves before this conversion applies.
impl From<CryptoError> for OlmError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::BadMac => Self::BadMessageMac,
            CryptoError::OutputBufferTooSmall { .. } => Self::OutputBufferTooSmall,
            CryptoError::InputBufferTooSmall { .. } => Self::InputBufferTooSmall,
            CryptoError::InvalidBase64 { .. } => Self::InvalidBase64,
            CryptoError::InvalidKeyLength { .. } => Self::BadMessageFormat,
        }
    }
}

impl From<PickleError> for OlmError {
    fn from(err: PickleError) -> Self {
        if err.is_corruption() { Self::CorruptedPickle } else { Self::UnknownPickleVersion }
    }
}
