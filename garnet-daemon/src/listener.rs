//! The aggregation listener: one connection at a time, one bounded read each.
//!
//! The accept call is never raced against the stop notice. Shutdown sets the
//! notice first and then dials the socket itself (see [`crate::unblock`]), so
//! the pending accept returns and the loop observes the notice. Any
//! connection accepted after the notice is set is closed unread.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::UnixListener;
use tokio::sync::{mpsc, oneshot};

use crate::error::{io_err, ConnectionError, DaemonError};
use crate::paths::PAYLOAD_LIMIT;
use crate::protocol::Payload;

/// Pause after a failed accept so a persistent error does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Write-once stop notice, checked before and after every accept.
///
/// A dropped sender counts as set: nobody is left to drive the shutdown.
#[derive(Debug)]
pub struct StopNotice {
    rx: oneshot::Receiver<()>,
    set: bool,
}

impl StopNotice {
    pub fn new(rx: oneshot::Receiver<()>) -> Self {
        Self { rx, set: false }
    }

    pub fn channel() -> (oneshot::Sender<()>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self::new(rx))
    }

    /// Non-blocking check.
    pub fn is_set(&mut self) -> bool {
        if !self.set {
            match self.rx.try_recv() {
                Ok(()) | Err(oneshot::error::TryRecvError::Closed) => self.set = true,
                Err(oneshot::error::TryRecvError::Empty) => {}
            }
        }
        self.set
    }
}

/// Where received payloads go once they are off the socket.
pub trait PayloadSink: Send + 'static {
    fn deliver(&mut self, payload: Payload);
}

/// Logs each payload at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl PayloadSink for LogSink {
    fn deliver(&mut self, payload: Payload) {
        tracing::info!(
            bytes = payload.len(),
            received_at = %payload.received_at().to_rfc3339(),
            payload = %payload,
            "received collector payload",
        );
    }
}

impl PayloadSink for mpsc::UnboundedSender<Payload> {
    fn deliver(&mut self, payload: Payload) {
        if self.send(payload).is_err() {
            tracing::debug!("payload receiver dropped, discarding payload");
        }
    }
}

impl<S: PayloadSink + ?Sized> PayloadSink for Box<S> {
    fn deliver(&mut self, payload: Payload) {
        (**self).deliver(payload)
    }
}

/// Owns the Unix domain socket for the agent's lifetime.
#[derive(Debug)]
pub struct AggregationListener {
    listener: UnixListener,
    socket: PathBuf,
}

impl AggregationListener {
    /// Bind the socket exclusively. A stale socket file left by a dead agent
    /// is removed; a socket another agent still answers on is refused.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(socket: &Path) -> Result<Self, DaemonError> {
        if let Some(parent) = socket.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
        }
        prepare_socket_for_bind(socket)?;

        let listener = UnixListener::bind(socket).map_err(|e| io_err(socket, e))?;
        set_socket_permissions(socket)?;
        Ok(Self {
            listener,
            socket: socket.to_path_buf(),
        })
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Accept and read connections until `stop` is observed, then fire `done`.
    ///
    /// The listener is handed back still bound: a self-dial that arrives after
    /// `done` queues in the backlog instead of being refused. Dropping it
    /// closes the socket.
    pub async fn run<S: PayloadSink>(
        self,
        mut stop: StopNotice,
        done: oneshot::Sender<()>,
        mut sink: S,
    ) -> Self {
        loop {
            if stop.is_set() {
                break;
            }

            tracing::debug!("accepting a collector connection");
            let stream = match self.listener.accept().await {
                Ok((stream, _)) => stream,
                Err(err) => {
                    tracing::warn!(
                        socket = %self.socket.display(),
                        error = %ConnectionError::Accept(err),
                        "collector connection failed",
                    );
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            if stop.is_set() {
                drop(stream);
                break;
            }

            match read_payload(stream).await {
                Ok(payload) => sink.deliver(payload),
                Err(err) => tracing::warn!(
                    socket = %self.socket.display(),
                    error = %err,
                    "collector connection failed",
                ),
            }
        }

        tracing::info!(socket = %self.socket.display(), "ceasing to accept collector connections");
        if done.send(()).is_err() {
            tracing::debug!("shutdown coordinator is gone, completion not observed");
        }
        self
    }
}

/// One read of at most [`PAYLOAD_LIMIT`] bytes. The reader is dropped on return.
pub async fn read_payload<R>(mut reader: R) -> Result<Payload, ConnectionError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; PAYLOAD_LIMIT];
    let read = reader
        .read(&mut buffer)
        .await
        .map_err(ConnectionError::Read)?;
    if read == 0 {
        return Err(ConnectionError::NoData);
    }
    buffer.truncate(read);
    Ok(Payload::new(buffer))
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::SocketInUse {
                socket: socket.to_path_buf(),
            });
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale aggregation socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}
