use std::fs;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use garnet_core::{collectors_from_dir, CollectorDescriptor};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::oneshot;

use crate::collector::{CollectorTimer, Launcher, ProcessLauncher};
use crate::error::{io_err, DaemonError};
use crate::listener::{AggregationListener, LogSink, PayloadSink, StopNotice};
use crate::paths::{default_config_dir, default_socket_path};
use crate::shutdown::ShutdownCoordinator;
use crate::unblock::SelfDial;

/// Where the agent listens and where it finds collector definitions.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub socket: PathBuf,
    pub config_dir: PathBuf,
    pub log_json: bool,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            socket: default_socket_path(),
            config_dir: default_config_dir(),
            log_json: false,
        }
    }
}

/// Load configuration, start the agent runtime, and block until it has drained.
///
/// Configuration errors surface before the socket is created.
pub fn start_blocking(options: &AgentOptions) -> Result<(), DaemonError> {
    init_tracing(options.log_json);

    let collectors = collectors_from_dir(&options.config_dir)?;
    tracing::info!(
        config_dir = %options.config_dir.display(),
        collectors = collectors.len(),
        "loaded collector configuration",
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(options.socket.clone(), collectors))
}

/// Run the agent until SIGINT or SIGTERM.
pub async fn run(socket: PathBuf, collectors: Vec<CollectorDescriptor>) -> Result<(), DaemonError> {
    // Registered before the socket exists so a signal never hits the default handler.
    let termination = termination_notice()?;
    Agent::new(socket, collectors).run(termination).await
}

/// Resolves on the first SIGINT or SIGTERM.
///
/// Handlers are installed when this is called, not when the future is first polled.
pub fn termination_notice() -> Result<impl Future<Output = ()>, DaemonError> {
    let mut interrupt = signal(SignalKind::interrupt()).map_err(DaemonError::Signal)?;
    let mut terminate = signal(SignalKind::terminate()).map_err(DaemonError::Signal)?;
    Ok(async move {
        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };
        tracing::info!(signal = name, "got signal, exiting");
    })
}

/// One listener plus one timer per collector, wired to a shutdown coordinator.
pub struct Agent {
    socket: PathBuf,
    collectors: Vec<CollectorDescriptor>,
    launcher: Arc<dyn Launcher>,
    sink: Box<dyn PayloadSink>,
}

impl Agent {
    pub fn new(socket: impl Into<PathBuf>, collectors: Vec<CollectorDescriptor>) -> Self {
        Self {
            socket: socket.into(),
            collectors,
            launcher: Arc::new(ProcessLauncher),
            sink: Box::new(LogSink),
        }
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_sink(mut self, sink: impl PayloadSink) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Serve until `termination` resolves, drain, and remove the socket file.
    pub async fn run<F>(self, termination: F) -> Result<(), DaemonError>
    where
        F: Future<Output = ()>,
    {
        let Agent {
            socket,
            collectors,
            launcher,
            sink,
        } = self;

        let listener = AggregationListener::bind(&socket)?;
        tracing::info!(socket = %socket.display(), "opened aggregation socket");

        let (stop_tx, stop) = StopNotice::channel();
        let (done_tx, done_rx) = oneshot::channel();
        let listener_handle = tokio::spawn(listener.run(stop, done_tx, sink));

        let mut timers: Vec<CollectorTimer> = collectors
            .into_iter()
            .map(|descriptor| CollectorTimer::new(descriptor, &socket, launcher.clone()))
            .collect();
        for timer in &mut timers {
            timer.start();
        }

        let mut coordinator =
            ShutdownCoordinator::new(timers, stop_tx, done_rx, SelfDial::new(&socket));
        if let Err(err) = coordinator.run_until(termination).await {
            listener_handle.abort();
            if let Err(cleanup) = remove_socket(&socket) {
                tracing::warn!(error = %cleanup, "failed to remove aggregation socket");
            }
            return Err(err);
        }

        // The socket stays bound until here so a late self-dial is never refused.
        let listener = listener_handle.await.map_err(|err| DaemonError::Join {
            task: "aggregation_listener",
            message: err.to_string(),
        })?;
        drop(listener);
        remove_socket(&socket)?;
        tracing::info!(socket = %socket.display(), "agent stopped");
        Ok(())
    }
}

fn remove_socket(socket: &Path) -> Result<(), DaemonError> {
    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
