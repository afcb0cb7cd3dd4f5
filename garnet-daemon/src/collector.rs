//! Interval-driven collector invocation.
//!
//! Each [`CollectorTimer`] owns one repeating trigger and runs on its own
//! task. On every tick it launches the collector's command with the
//! aggregation socket path as its only argument and waits for it to exit
//! before waiting for the next tick. Ticks that elapse while a run is in
//! progress are skipped rather than queued.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use garnet_core::CollectorDescriptor;
use tokio::process::Command;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{io_err, DaemonError};

/// Shortest period a timer will tick at; a zero interval would spin.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A started collector run. Resolves once the external command has exited.
pub type Invocation = Pin<Box<dyn Future<Output = Result<(), DaemonError>> + Send>>;

/// Starts one collector run.
///
/// `launch` is synchronous so the timer can hold its stop gate across it:
/// once [`CollectorTimer::stop`] returns, no further `launch` call happens.
pub trait Launcher: Send + Sync + 'static {
    fn launch(
        &self,
        collector: &CollectorDescriptor,
        socket: &Path,
    ) -> Result<Invocation, DaemonError>;
}

/// Runs the collector as a child process: `<command> <socket>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(
        &self,
        collector: &CollectorDescriptor,
        socket: &Path,
    ) -> Result<Invocation, DaemonError> {
        let mut child = Command::new(&collector.command)
            .arg(socket)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| DaemonError::CollectorSpawn {
                name: collector.name.clone(),
                source,
            })?;

        let name = collector.name.clone();
        let command = collector.command.clone();
        Ok(Box::pin(async move {
            let status = child.wait().await.map_err(|e| io_err(&command, e))?;
            if status.success() {
                Ok(())
            } else {
                Err(DaemonError::CollectorExit { name, status })
            }
        }))
    }
}

struct StopGate {
    stopped: Mutex<bool>,
    wake: Notify,
}

impl StopGate {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One collector bound to its repeating trigger.
pub struct CollectorTimer {
    descriptor: Arc<CollectorDescriptor>,
    socket: PathBuf,
    launcher: Arc<dyn Launcher>,
    gate: Arc<StopGate>,
    handle: Option<JoinHandle<()>>,
}

impl CollectorTimer {
    pub fn new(
        descriptor: CollectorDescriptor,
        socket: impl Into<PathBuf>,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        if descriptor.interval < MIN_PERIOD {
            tracing::warn!(
                collector = %descriptor.name,
                interval = ?descriptor.interval,
                "collector interval below minimum, clamping to {MIN_PERIOD:?}",
            );
        }
        Self {
            descriptor: Arc::new(descriptor),
            socket: socket.into(),
            launcher,
            gate: Arc::new(StopGate {
                stopped: Mutex::new(false),
                wake: Notify::new(),
            }),
            handle: None,
        }
    }

    /// Spawn the ticking task. Must be called from within a tokio runtime.
    ///
    /// Has no effect if the timer is already running or has been stopped.
    pub fn start(&mut self) {
        if self.handle.is_some() || self.is_stopped() {
            return;
        }
        let descriptor = self.descriptor.clone();
        let socket = self.socket.clone();
        let launcher = self.launcher.clone();
        let gate = self.gate.clone();
        tracing::info!(
            collector = %descriptor.name,
            command = %descriptor.command.display(),
            interval = ?descriptor.interval,
            "starting collector",
        );
        self.handle = Some(tokio::spawn(tick_loop(descriptor, socket, launcher, gate)));
    }

    /// Halt future invocations.
    ///
    /// Safe to call while a run is in flight and safe to call more than once.
    /// A run already launched is left to finish on its own.
    pub fn stop(&self) {
        {
            let mut stopped = self.gate.lock();
            if *stopped {
                return;
            }
            *stopped = true;
        }
        self.gate.wake.notify_one();
        tracing::info!(collector = %self.descriptor.name, "stopping collector");
    }

    pub fn is_stopped(&self) -> bool {
        *self.gate.lock()
    }

    /// Wait for the ticking task to exit, including any in-flight run.
    pub async fn join(mut self) -> Result<(), DaemonError> {
        match self.handle.take() {
            Some(handle) => handle.await.map_err(|err| DaemonError::Join {
                task: "collector",
                message: err.to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl Drop for CollectorTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn tick_loop(
    descriptor: Arc<CollectorDescriptor>,
    socket: PathBuf,
    launcher: Arc<dyn Launcher>,
    gate: Arc<StopGate>,
) {
    let period = descriptor.interval.max(MIN_PERIOD);
    // First run happens one period after start, not immediately.
    let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = gate.wake.notified() => break,
            _ = ticks.tick() => {}
        }

        let invocation = {
            let stopped = gate.lock();
            if *stopped {
                break;
            }
            launcher.launch(&descriptor, &socket)
        };

        tracing::debug!(collector = %descriptor.name, "collector invoked");
        let outcome = match invocation {
            Ok(run) => run.await,
            Err(err) => Err(err),
        };
        if let Err(err) = outcome {
            tracing::warn!(
                collector = %descriptor.name,
                error = %err,
                "failed to invoke collector",
            );
        }
    }

    tracing::debug!(collector = %descriptor.name, "collector timer exited");
}
