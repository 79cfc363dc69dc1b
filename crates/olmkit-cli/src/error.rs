//! CLI error types.

use olmkit_core::OlmError;

/// Errors a command can fail with.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Protocol operation failed.
    ///
    /// Wraps the stable error code so scripts can match on it.
    #[error("{code}: {0}", code = .0.code())]
    Olm(#[from] OlmError),

    /// The OS random number generator failed.
    #[error("OS randomness unavailable: {0}")]
    Random(getrandom::Error),

    /// Writing output failed.
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}
