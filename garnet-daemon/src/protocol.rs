use std::fmt;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{io_err, DaemonError};
use crate::paths::PAYLOAD_LIMIT;

/// Opaque bytes received from one collector connection.
///
/// Collectors write a single line such as `application.prog.counters|1c`; the
/// agent never parses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    bytes: Vec<u8>,
    received_at: DateTime<Utc>,
}

impl Payload {
    /// Wrap bytes read from a connection, truncating to [`PAYLOAD_LIMIT`].
    pub fn new(mut bytes: Vec<u8>) -> Self {
        bytes.truncate(PAYLOAD_LIMIT);
        Self {
            bytes,
            received_at: Utc::now(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bytes))
    }
}

/// Connect to the aggregation socket and write one payload.
///
/// This is the client half of the collector contract: the sample collector
/// and `garnet send` both go through here.
pub fn send_payload(socket: &Path, payload: &[u8]) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Err(DaemonError::AgentNotRunning {
            socket: socket.to_path_buf(),
        });
    }

    let mut stream = UnixStream::connect(socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::AgentNotRunning {
                socket: socket.to_path_buf(),
            }
        } else {
            io_err(socket, err)
        }
    })?;

    stream.write_all(payload).map_err(|e| io_err(socket, e))?;
    stream.flush().map_err(|e| io_err(socket, e))?;
    Ok(())
}
