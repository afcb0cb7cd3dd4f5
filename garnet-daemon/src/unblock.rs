//! Releasing the listener's pending accept during shutdown.

use std::future::Future;
use std::path::PathBuf;

use tokio::net::UnixStream;

use crate::error::DaemonError;

/// Causes one pending accept on the aggregation listener to return.
///
/// Only called after the listener's stop notice is set.
pub trait Unblocker {
    fn unblock(&self) -> impl Future<Output = Result<(), DaemonError>> + Send;
}

/// Opens a throwaway client connection to the socket and closes it unused.
#[derive(Debug, Clone)]
pub struct SelfDial {
    socket: PathBuf,
}

impl SelfDial {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }
}

impl Unblocker for SelfDial {
    async fn unblock(&self) -> Result<(), DaemonError> {
        tracing::info!(
            socket = %self.socket.display(),
            "creating a final client connection to release the listener",
        );
        let stream = UnixStream::connect(&self.socket)
            .await
            .map_err(|source| DaemonError::Unblock {
                socket: self.socket.clone(),
                source,
            })?;
        drop(stream);
        Ok(())
    }
}
