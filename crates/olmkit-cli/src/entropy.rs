//! Entropy sources for commands.
//!
//! Commands never generate randomness themselves: they ask an [`Entropy`]
//! source for exactly as many bytes as the protocol object reports needing.
//! [`OsEntropy`] is the production source; tests substitute a seeded one.

use crate::error::CliError;

/// Source of random bytes.
pub trait Entropy {
    /// Fill `buffer` with random bytes.
    fn fill(&mut self, buffer: &mut [u8]) -> Result<(), CliError>;

    /// `length` fresh random bytes.
    fn bytes(&mut self, length: usize) -> Result<Vec<u8>, CliError> {
        let mut buffer = vec![0u8; length];
        self.fill(&mut buffer)?;
        Ok(buffer)
    }
}

/// OS cryptographic RNG via getrandom.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl Entropy for OsEntropy {
    fn fill(&mut self, buffer: &mut [u8]) -> Result<(), CliError> {
        getrandom::fill(buffer).map_err(CliError::Random)
    }
}
