//! Garnet: local telemetry agent CLI.
//!
//! # Usage
//!
//! ```text
//! garnet run [--socket <path>] [--config-dir <dir>] [--log-json]
//! garnet collectors [--config-dir <dir>] [--json]
//! garnet send <payload> [--socket <path>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{collectors::CollectorsArgs, run::RunArgs, send::SendArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "garnet",
    version,
    about = "Run external metric collectors and aggregate what they report",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the agent in the foreground until SIGINT or SIGTERM.
    Run(RunArgs),

    /// List the collectors defined in the config directory.
    Collectors(CollectorsArgs),

    /// Write one payload to a running agent's socket.
    Send(SendArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Collectors(args) => args.run(),
        Commands::Send(args) => args.run(),
    }
}
