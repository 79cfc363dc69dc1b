//! Olmkit command-line front end.
//!
//! Thin wrapper over [`olmkit_core`]: every command takes its entropy from
//! an [`Entropy`] source, pickles state under a caller passphrase and writes
//! its results as plain text lines.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cli;
pub mod commands;
pub mod entropy;
pub mod error;

pub use cli::{AccountCommand, Cli, Command, GroupCommand, UtilityCommand};
pub use commands::run;
pub use entropy::{Entropy, OsEntropy};
pub use error::CliError;
