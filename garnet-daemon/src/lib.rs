//! Garnet agent runtime: collector timers + aggregation listener + drain sequence.

pub mod collector;
mod error;
pub mod listener;
pub mod paths;
pub mod protocol;
mod runtime;
pub mod shutdown;
pub mod unblock;

pub use collector::{CollectorTimer, Invocation, Launcher, ProcessLauncher};
pub use error::{ConnectionError, DaemonError};
pub use listener::{AggregationListener, LogSink, PayloadSink, StopNotice};
pub use protocol::{send_payload, Payload};
pub use runtime::{run, start_blocking, termination_notice, Agent, AgentOptions};
pub use shutdown::{Halt, Phase, ShutdownCoordinator};
pub use unblock::{SelfDial, Unblocker};
