//! `garnet run`: the agent in the foreground.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use garnet_daemon::paths::{DEFAULT_CONFIG_DIR, DEFAULT_SOCKET};
use garnet_daemon::{start_blocking, AgentOptions};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Unix domain socket collectors report to.
    #[arg(long, default_value = DEFAULT_SOCKET)]
    pub socket: PathBuf,

    /// Directory of `*.json` collector definitions.
    #[arg(long, default_value = DEFAULT_CONFIG_DIR)]
    pub config_dir: PathBuf,

    /// Emit log lines as JSON.
    #[arg(long)]
    pub log_json: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let options = AgentOptions {
            socket: self.socket,
            config_dir: self.config_dir,
            log_json: self.log_json,
        };
        start_blocking(&options).context("agent exited with error")
    }
}
