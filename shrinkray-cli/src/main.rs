//! Shrinkray CLI - Command-line interface
//!
//! Re-compresses a remote media catalog in place: every accepted asset
//! is replaced by a smaller re-encoded copy carrying the original's
//! metadata and relationships.

mod commands;

use clap::Parser;
use shrinkray_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "shrinkray")]
#[command(about = "Re-compresses a media catalog in place")]
struct Cli {
    /// Console log level
    #[arg(long, global = true, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_level.as_tracing_level(), None) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    if let Err(e) = commands::handle_command(cli.command).await {
        tracing::error!("{e}");
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
}
