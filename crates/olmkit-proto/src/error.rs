//! Error types for pickle decoding

use thiserror::Error;

/// Errors from reading a decrypted pickle.
///
/// Message decoding has no error type: malformed messages decode with
/// missing fields instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PickleError {
    /// Pickle ended in the middle of a value
    #[error("pickle truncated: need {needed} more bytes, have {remaining}")]
    Truncated {
        /// Bytes the next value needs
        needed: usize,
        /// Bytes left in the pickle
        remaining: usize,
    },

    /// A list length exceeds the list's capacity
    #[error("pickled list of {count} entries exceeds capacity {max}")]
    ListTooLong {
        /// Count read from the pickle
        count: u32,
        /// Capacity of the list
        max: usize,
    },

    /// Bytes remain after the last value
    #[error("{count} unexpected bytes after pickle")]
    TrailingBytes {
        /// Number of unread bytes
        count: usize,
    },

    /// Pickle version tag is not one this build reads
    #[error("unknown pickle version: {version}")]
    UnknownVersion {
        /// Version read from the pickle
        version: u32,
    },

    /// A value decoded but is not valid for its field
    #[error("invalid pickled value: {field}")]
    InvalidValue {
        /// Name of the offending field
        field: &'static str,
    },
}

impl PickleError {
    /// Returns true if the pickle is structurally damaged.
    ///
    /// An unknown version is the only failure that can come from a valid
    /// pickle written by another build.
    pub fn is_corruption(&self) -> bool {
        !matches!(self, Self::UnknownVersion { .. })
    }
}
