//! bkd - browse and edit object storage as a drive
//!
//! Containers show up as top-level directories, key prefixes as nested
//! directories and objects as files on a named drive.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use bucketdrive::commands::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; --debug raises the default from warn to debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.debug { "debug" } else { "warn" })
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let exit_code = commands::execute(cli).await;

    std::process::exit(exit_code.as_i32());
}
