use std::path::PathBuf;
use std::process::ExitStatus;

use garnet_core::{CollectorName, ConfigError};
use thiserror::Error;

/// Error surface for the agent runtime, listener, and shutdown path.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("aggregation socket already in use: {socket}")]
    SocketInUse { socket: PathBuf },

    #[error("agent is not running (socket missing: {socket})")]
    AgentNotRunning { socket: PathBuf },

    #[error("collector '{name}' failed to start: {source}")]
    CollectorSpawn {
        name: CollectorName,
        #[source]
        source: std::io::Error,
    },

    #[error("collector '{name}' exited with {status}")]
    CollectorExit {
        name: CollectorName,
        status: ExitStatus,
    },

    /// The self-dial could not be opened; the listener would stay blocked in accept.
    #[error("failed to open the final client connection to {socket}: {source}")]
    Unblock {
        socket: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("signal handler error: {0}")]
    Signal(#[source] std::io::Error),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },
}

/// Per-connection failures on the aggregation listener. Never fatal.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to accept a connection: {0}")]
    Accept(#[source] std::io::Error),

    #[error("received no data from client connection")]
    NoData,

    #[error("failed to read from the socket into the buffer: {0}")]
    Read(#[source] std::io::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
