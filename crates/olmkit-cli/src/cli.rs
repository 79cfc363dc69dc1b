//! Command-line arguments.

use clap::{Parser, Subcommand};
use olmkit_core::MAX_ONE_TIME_KEYS;

/// Upper bound for `--count`, the one-time key capacity of an account
#[allow(clippy::cast_possible_wrap)]
const MAX_KEY_COUNT: i64 = MAX_ONE_TIME_KEYS as i64;

/// Olm and Megolm key management from the command line
#[derive(Parser, Debug)]
#[command(name = "olmkit")]
#[command(about = "Create and inspect Olm accounts and Megolm sessions")]
#[command(version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error), overridden by `RUST_LOG`
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level command groups.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Device accounts
    #[command(subcommand)]
    Account(AccountCommand),

    /// Megolm group sessions
    #[command(subcommand)]
    Group(GroupCommand),

    /// Hashing and signature checks
    #[command(subcommand)]
    Utility(UtilityCommand),
}

/// Account commands.
#[derive(Subcommand, Debug)]
pub enum AccountCommand {
    /// Create a new account and print its pickle
    Create {
        /// Key the pickle is encrypted under
        #[arg(long)]
        pickle_key: String,
    },

    /// Print the identity keys of a pickled account
    IdentityKeys {
        /// Key the pickle is encrypted under
        #[arg(long)]
        pickle_key: String,

        /// Pickled account
        #[arg(long)]
        pickle: String,
    },

    /// Generate one-time keys, printing the new pickle and the unpublished
    /// keys
    GenerateOneTimeKeys {
        /// Key the pickle is encrypted under
        #[arg(long)]
        pickle_key: String,

        /// Pickled account
        #[arg(long)]
        pickle: String,

        /// Number of keys to generate, at most the number an account holds
        #[arg(
            long,
            default_value = "1",
            value_parser = clap::value_parser!(u16).range(1..=MAX_KEY_COUNT)
        )]
        count: u16,
    },
}

/// Group session commands.
#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    /// Create an outbound group session, printing its pickle and session key
    Create {
        /// Key the pickle is encrypted under
        #[arg(long)]
        pickle_key: String,
    },
}

/// Utility commands.
#[derive(Subcommand, Debug)]
pub enum UtilityCommand {
    /// Base64 SHA-256 of the given text
    Sha256 {
        /// Text to hash
        text: String,
    },

    /// Check an Ed25519 signature
    VerifyEd25519 {
        /// Base64 public key
        #[arg(long)]
        key: String,

        /// Signed message
        #[arg(long)]
        message: String,

        /// Base64 signature
        #[arg(long)]
        signature: String,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_nested_subcommand() {
        let cli = Cli::try_parse_from([
            "olmkit",
            "account",
            "generate-one-time-keys",
            "--pickle-key",
            "secret",
            "--pickle",
            "abc",
            "--count",
            "5",
        ])
        .unwrap();

        match cli.command {
            Command::Account(AccountCommand::GenerateOneTimeKeys {
                pickle_key,
                pickle,
                count,
            }) => {
                assert_eq!(pickle_key, "secret");
                assert_eq!(pickle, "abc");
                assert_eq!(count, 5);
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    fn parse_count(count: &str) -> Result<u16, clap::Error> {
        let cli = Cli::try_parse_from([
            "olmkit",
            "account",
            "generate-one-time-keys",
            "--pickle-key",
            "k",
            "--pickle",
            "p",
            "--count",
            count,
        ])?;
        match cli.command {
            Command::Account(AccountCommand::GenerateOneTimeKeys { count, .. }) => Ok(count),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn count_is_bounded_by_key_capacity() {
        assert_eq!(parse_count("1").unwrap(), 1);
        assert_eq!(parse_count("100").unwrap(), 100);
        assert!(parse_count("0").is_err());
        assert!(parse_count("101").is_err());
        assert!(parse_count("100000").is_err());
    }

    #[test]
    fn pickle_key_is_required() {
        assert!(Cli::try_parse_from(["olmkit", "account", "create"]).is_err());
    }
}
