//! Command implementations.
//!
//! Each command writes one result per line to `out`. Pickles are always
//! re-emitted after a mutation, since the caller holds the only copy of the
//! state.

use std::io::Write;

use olmkit_core::{
    Account, OutboundGroupSession, account::ACCOUNT_RANDOM_LENGTH,
    group::OUTBOUND_GROUP_SESSION_RANDOM_LENGTH, utility,
};
use tracing::{debug, info};

use crate::{
    cli::{AccountCommand, Command, GroupCommand, UtilityCommand},
    entropy::Entropy,
    error::CliError,
};

/// Run `command`, drawing randomness from `entropy` and writing results to
/// `out`.
pub fn run(
    command: Command,
    entropy: &mut impl Entropy,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Command::Account(command) => run_account(command, entropy, out),
        Command::Group(command) => run_group(command, entropy, out),
        Command::Utility(command) => run_utility(command, out),
    }
}

fn run_account(
    command: AccountCommand,
    entropy: &mut impl Entropy,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        AccountCommand::Create { pickle_key } => {
            let account = Account::new(&entropy.bytes(ACCOUNT_RANDOM_LENGTH)?)?;
            info!(identity = %account.curve25519_key().to_base64(), "created account");
            writeln!(out, "{}", account.pickle(pickle_key.as_bytes()))?;
        },
        AccountCommand::IdentityKeys { pickle_key, pickle } => {
            let account = Account::from_pickle(pickle_key.as_bytes(), &pickle)?;
            writeln!(out, "{}", account.identity_keys_json())?;
        },
        AccountCommand::GenerateOneTimeKeys { pickle_key, pickle, count } => {
            let count = usize::from(count);
            let mut account = Account::from_pickle(pickle_key.as_bytes(), &pickle)?;
            let random = entropy.bytes(Account::generate_one_time_keys_random_length(count))?;
            account.generate_one_time_keys(count, &random)?;
            debug!(count, held = account.one_time_keys().len(), "generated one-time keys");

            writeln!(out, "{}", account.pickle(pickle_key.as_bytes()))?;
            writeln!(out, "{}", account.one_time_keys_json())?;
        },
    }
    Ok(())
}

fn run_group(
    command: GroupCommand,
    entropy: &mut impl Entropy,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        GroupCommand::Create { pickle_key } => {
            let session =
                OutboundGroupSession::new(&entropy.bytes(OUTBOUND_GROUP_SESSION_RANDOM_LENGTH)?)?;
            info!(session_id = %session.session_id(), "created group session");
            writeln!(out, "{}", session.pickle(pickle_key.as_bytes()))?;
            writeln!(out, "{}", session.session_key())?;
        },
    }
    Ok(())
}

fn run_utility(command: UtilityCommand, out: &mut impl Write) -> Result<(), CliError> {
    match command {
        UtilityCommand::Sha256 { text } => {
            writeln!(out, "{}", utility::sha256(text.as_bytes()))?;
        },
        UtilityCommand::VerifyEd25519 { key, message, signature } => {
            utility::ed25519_verify(&key, message.as_bytes(), &signature)?;
            writeln!(out, "valid")?;
        },
    }
    Ok(())
}
