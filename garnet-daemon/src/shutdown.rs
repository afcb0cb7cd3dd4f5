//! The drain sequence: `Running → Draining → Stopped`.
//!
//! Steps run strictly in order, each only after the previous one returned:
//!
//! 1. halt every collector timer;
//! 2. set the listener's stop notice;
//! 3. self-dial the socket so the listener's pending accept returns;
//! 4. wait for the listener's completion notice.
//!
//! A failed self-dial aborts the drain with [`DaemonError::Unblock`]; waiting
//! for completion without it would never return.

use std::fmt;
use std::future::Future;

use tokio::sync::oneshot;

use crate::collector::CollectorTimer;
use crate::error::DaemonError;
use crate::unblock::Unblocker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Running => write!(f, "running"),
            Phase::Draining => write!(f, "draining"),
            Phase::Stopped => write!(f, "stopped"),
        }
    }
}

/// Something the drain sequence must stop before touching the listener.
pub trait Halt {
    /// After this returns, no new work may begin.
    fn halt(&self);
}

impl Halt for CollectorTimer {
    fn halt(&self) {
        self.stop();
    }
}

pub struct ShutdownCoordinator<C, U> {
    phase: Phase,
    collectors: Vec<C>,
    stop_listener: Option<oneshot::Sender<()>>,
    listener_done: Option<oneshot::Receiver<()>>,
    unblocker: U,
}

impl<C: Halt, U: Unblocker> ShutdownCoordinator<C, U> {
    pub fn new(
        collectors: Vec<C>,
        stop_listener: oneshot::Sender<()>,
        listener_done: oneshot::Receiver<()>,
        unblocker: U,
    ) -> Self {
        Self {
            phase: Phase::Running,
            collectors,
            stop_listener: Some(stop_listener),
            listener_done: Some(listener_done),
            unblocker,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Wait for the termination notice, then drain.
    pub async fn run_until<F>(&mut self, termination: F) -> Result<(), DaemonError>
    where
        F: Future<Output = ()>,
    {
        termination.await;
        self.drain().await
    }

    /// Run the drain sequence. Only the first call does anything.
    pub async fn drain(&mut self) -> Result<(), DaemonError> {
        if self.phase != Phase::Running {
            return Ok(());
        }
        self.transition(Phase::Draining);

        for collector in &self.collectors {
            collector.halt();
        }

        if let Some(stop) = self.stop_listener.take() {
            if stop.send(()).is_err() {
                tracing::warn!("aggregation listener already gone before stop notice");
            }
        }

        self.unblocker.unblock().await?;

        let done = self
            .listener_done
            .take()
            .ok_or(DaemonError::ChannelClosed("listener completion"))?;
        done.await
            .map_err(|_| DaemonError::ChannelClosed("listener completion"))?;

        self.transition(Phase::Stopped);
        Ok(())
    }

    fn transition(&mut self, next: Phase) {
        tracing::info!(from = %self.phase, to = %next, "shutdown phase change");
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tempfile::TempDir;
    use tokio::net::UnixStream;
    use tokio::sync::{mpsc, Notify};
    use tokio::task::JoinHandle;
    use tokio::time::{sleep, timeout};

    use crate::listener::{AggregationListener, StopNotice};
    use crate::protocol::Payload;
    use crate::unblock::SelfDial;

    type Log = Arc<Mutex<Vec<String>>>;

    fn record(log: &Log, entry: impl Into<String>) {
        log.lock().expect("log").push(entry.into());
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().expect("log").clone()
    }

    struct RecordingCollector {
        name: &'static str,
        log: Log,
    }

    impl Halt for RecordingCollector {
        fn halt(&self) {
            record(&self.log, format!("halt {}", self.name));
        }
    }

    /// Stands in for the kernel: releases the mocked listener's accept.
    struct RecordingDial {
        log: Log,
        accept: Arc<Notify>,
        fail: bool,
    }

    impl Unblocker for RecordingDial {
        async fn unblock(&self) -> Result<(), DaemonError> {
            record(&self.log, "dial");
            if self.fail {
                return Err(DaemonError::Unblock {
                    socket: "/tmp/garnet-test.sock".into(),
                    source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
                });
            }
            self.accept.notify_one();
            Ok(())
        }
    }

    /// Blocks in "accept" until dialled, then reports whether stop was visible.
    fn mock_listener(
        log: Log,
        accept: Arc<Notify>,
        mut stop: StopNotice,
        done: oneshot::Sender<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if stop.is_set() {
                    record(&log, "listener done");
                    let _ = done.send(());
                    return;
                }
                accept.notified().await;
                if stop.is_set() {
                    record(&log, "accepted after stop");
                } else {
                    record(&log, "accepted as data");
                }
            }
        })
    }

    struct Fixture {
        log: Log,
        coordinator: ShutdownCoordinator<RecordingCollector, RecordingDial>,
        listener: JoinHandle<()>,
    }

    fn fixture(fail_dial: bool) -> Fixture {
        let log: Log = Arc::default();
        let accept = Arc::new(Notify::new());
        let (stop_tx, stop) = StopNotice::channel();
        let (done_tx, done_rx) = oneshot::channel();
        let listener = mock_listener(log.clone(), accept.clone(), stop, done_tx);

        let collectors = ["cpu", "disk"]
            .into_iter()
            .map(|name| RecordingCollector {
                name,
                log: log.clone(),
            })
            .collect();
        let dial = RecordingDial {
            log: log.clone(),
            accept,
            fail: fail_dial,
        };
        Fixture {
            log,
            coordinator: ShutdownCoordinator::new(collectors, stop_tx, done_rx, dial),
            listener,
        }
    }

    #[tokio::test]
    async fn drain_runs_steps_in_order() {
        let mut fx = fixture(false);
        assert_eq!(fx.coordinator.phase(), Phase::Running);
        // Let the mock listener park in accept first.
        tokio::task::yield_now().await;

        fx.coordinator.drain().await.expect("drain");
        assert_eq!(fx.coordinator.phase(), Phase::Stopped);
        fx.listener.await.expect("listener task");

        assert_eq!(
            entries(&fx.log),
            [
                "halt cpu",
                "halt disk",
                "dial",
                "accepted after stop",
                "listener done"
            ]
        );
    }

    #[tokio::test]
    async fn termination_notice_triggers_drain() {
        let mut fx = fixture(false);
        let (notice_tx, notice_rx) = oneshot::channel::<()>();

        let termination = async move {
            let _ = notice_rx.await;
        };
        notice_tx.send(()).expect("notice");
        fx.coordinator.run_until(termination).await.expect("drain");
        assert_eq!(fx.coordinator.phase(), Phase::Stopped);
    }

    #[tokio::test]
    async fn drain_is_deadlock_free_without_prior_activity() {
        let mut fx = fixture(false);
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            fx.coordinator.run_until(std::future::ready(())),
        )
        .await
        .expect("bounded")
        .expect("drain");
        assert_eq!(fx.coordinator.phase(), Phase::Stopped);
        assert!(!entries(&fx.log).iter().any(|e| e == "accepted as data"));
    }

    #[tokio::test]
    async fn second_drain_is_a_no_op() {
        let mut fx = fixture(false);
        fx.coordinator.drain().await.expect("first drain");
        let after_first = entries(&fx.log);

        fx.coordinator.drain().await.expect("second drain");
        assert_eq!(entries(&fx.log), after_first);
        assert_eq!(fx.coordinator.phase(), Phase::Stopped);
    }

    #[tokio::test]
    async fn failed_dial_aborts_without_waiting() {
        let mut fx = fixture(true);
        tokio::task::yield_now().await;

        let err = tokio::time::timeout(std::time::Duration::from_secs(5), fx.coordinator.drain())
            .await
            .expect("must not hang")
            .unwrap_err();
        assert!(matches!(err, DaemonError::Unblock { .. }), "got: {err}");
        assert_eq!(fx.coordinator.phase(), Phase::Draining);
        assert_eq!(entries(&fx.log), ["halt cpu", "halt disk", "dial"]);
        fx.listener.abort();
    }

    #[tokio::test]
    async fn listener_dying_surfaces_as_channel_closed() {
        let log: Log = Arc::default();
        let (stop_tx, _stop) = StopNotice::channel();
        let (done_tx, done_rx) = oneshot::channel::<()>();
        drop(done_tx);

        let dial = RecordingDial {
            log: log.clone(),
            accept: Arc::new(Notify::new()),
            fail: false,
        };
        let mut coordinator =
            ShutdownCoordinator::new(Vec::<RecordingCollector>::new(), stop_tx, done_rx, dial);

        let err = coordinator.drain().await.unwrap_err();
        assert!(
            matches!(err, DaemonError::ChannelClosed("listener completion")),
            "got: {err}"
        );
    }

    /// A collector run that connects after the stop notice but before the self-dial.
    struct LateClientThenDial {
        socket: PathBuf,
        dial: SelfDial,
    }

    impl Unblocker for LateClientThenDial {
        async fn unblock(&self) -> Result<(), DaemonError> {
            let late = UnixStream::connect(&self.socket)
                .await
                .expect("late client connects");
            drop(late);
            // Long enough for the listener to accept it, see the notice and finish.
            sleep(Duration::from_millis(300)).await;
            self.dial.unblock().await
        }
    }

    #[tokio::test]
    async fn late_client_before_self_dial_still_drains() {
        let dir = TempDir::new().expect("tempdir");
        let socket = dir.path().join("garnet.sock");
        let listener = AggregationListener::bind(&socket).expect("bind");
        let (stop_tx, stop) = StopNotice::channel();
        let (done_tx, done_rx) = oneshot::channel();
        let (payload_tx, mut payloads) = mpsc::unbounded_channel::<Payload>();
        let handle = tokio::spawn(listener.run(stop, done_tx, payload_tx));
        tokio::task::yield_now().await;

        let unblocker = LateClientThenDial {
            socket: socket.clone(),
            dial: SelfDial::new(&socket),
        };
        let mut coordinator =
            ShutdownCoordinator::new(Vec::<RecordingCollector>::new(), stop_tx, done_rx, unblocker);

        timeout(Duration::from_secs(5), coordinator.drain())
            .await
            .expect("must not hang")
            .expect("self-dial after the listener finished is not refused");
        assert_eq!(coordinator.phase(), Phase::Stopped);

        let listener = handle.await.expect("listener task");
        assert!(payloads.try_recv().is_err(), "late client is closed unread");
        drop(listener);
    }

    #[test]
    fn phase_display() {
        assert_eq!(Phase::Running.to_string(), "running");
        assert_eq!(Phase::Draining.to_string(), "draining");
        assert_eq!(Phase::Stopped.to_string(), "stopped");
    }
}
