//! Olmkit command-line tool.
//!
//! # Usage
//!
//! ```bash
//! # Create an account and list its identity keys
//! PICKLE=$(olmkit account create --pickle-key secret)
//! olmkit account identity-keys --pickle-key secret --pickle "$PICKLE"
//!
//! # Start a group session and share its key
//! olmkit group create --pickle-key secret
//! ```

use std::io::Write;

use clap::Parser;
use olmkit_cli::{Cli, OsEntropy, run};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut stdout = std::io::stdout().lock();
    run(cli.command, &mut OsEntropy, &mut stdout)?;
    stdout.flush()?;

    Ok(())
}
