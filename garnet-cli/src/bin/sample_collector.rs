//! Reference collector: reports one counter to the socket named by its only argument.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use garnet_daemon::send_payload;

const SAMPLE_PAYLOAD: &[u8] = b"application.prog.counters|1c";

#[derive(Parser, Debug)]
#[command(
    name = "garnet-sample-collector",
    version,
    about = "Report a sample counter to a Garnet agent"
)]
struct Cli {
    /// Aggregation socket passed in by the agent.
    socket: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    send_payload(&cli.socket, SAMPLE_PAYLOAD)
        .with_context(|| format!("failed to write to the Unix socket {}", cli.socket.display()))
}
