//! `garnet send`: hand-deliver one payload, as a collector would.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use garnet_daemon::paths::DEFAULT_SOCKET;
use garnet_daemon::send_payload;

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Payload line, e.g. `application.prog.counters|1c`.
    pub payload: String,

    /// Unix domain socket of the running agent.
    #[arg(long, default_value = DEFAULT_SOCKET)]
    pub socket: PathBuf,
}

impl SendArgs {
    pub fn run(self) -> Result<()> {
        send_payload(&self.socket, self.payload.as_bytes())
            .with_context(|| format!("failed to send payload to {}", self.socket.display()))
    }
}
