//! Shutdown and error coordination.
//!
//! The coordinator owns the process [`StopSignal`]. While loops run it drains
//! each loop's error channel into the log, one drain task per loop so a
//! loop's errors are logged in the order it emitted them. Once the stop
//! signal fires it waits for every loop to exit and for its drain to flush.
//!
//! ```text
//! Starting -> Running -> Draining -> Terminated
//! ```

use crate::error::ControllerError;
use crate::signals::forward_shutdown_signals;
use crate::stop::StopSignal;
use crate::supervisor::LoopHandle;
use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Process lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructing storage, client and loops
    Starting,
    /// Loops are reconciling
    Running,
    /// Stop signal fired; waiting for loops to exit
    Draining,
    /// All loops have exited (or were abandoned)
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Starting => "starting",
            Phase::Running => "running",
            Phase::Draining => "draining",
            Phase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed shutdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Loops that exited on their own
    pub stopped: Vec<&'static str>,
    /// Loops still running when the drain deadline passed
    pub abandoned: Vec<&'static str>,
    /// Operational errors drained from all loops
    pub errors_logged: usize,
}

struct SupervisedLoop {
    name: &'static str,
    task: JoinHandle<()>,
    task_joined: bool,
    drain: JoinHandle<usize>,
}

impl SupervisedLoop {
    /// Wait for the loop to exit, then for its drain to flush.
    ///
    /// Safe to call again after a cancelled call.
    async fn join(&mut self) -> usize {
        if !self.task_joined {
            let result = (&mut self.task).await;
            self.task_joined = true;
            if let Err(e) = result {
                if e.is_panic() {
                    error!(loop_name = self.name, "{} panicked", self.name);
                }
            }
        }
        (&mut self.drain).await.unwrap_or_default()
    }

    fn exited(&self) -> bool {
        self.task_joined || self.task.is_finished()
    }

    fn abort(&self) {
        self.task.abort();
        self.drain.abort();
    }
}

/// Owns the stop signal and the supervised loops.
pub struct Coordinator {
    stop: StopSignal,
    phase: watch::Sender<Phase>,
    drain_timeout: Option<Duration>,
    loops: Vec<SupervisedLoop>,
    signal_listener: Option<JoinHandle<()>>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("phase", &*self.phase.borrow())
            .field("drain_timeout", &self.drain_timeout)
            .field("loops", &self.loops.iter().map(|l| l.name).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// New coordinator in the `Starting` phase.
    ///
    /// `drain_timeout` bounds how long shutdown waits for loops; `None`
    /// waits for as long as the loops take.
    pub fn new(drain_timeout: Option<Duration>) -> Self {
        let (phase, _) = watch::channel(Phase::Starting);
        Self {
            stop: StopSignal::new(),
            phase,
            drain_timeout,
            loops: Vec::new(),
            signal_listener: None,
        }
    }

    /// The process stop signal
    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Subscribe to phase transitions
    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.send_replace(phase);
        info!(%phase, "Controller {}", phase);
    }

    /// Take ownership of running loops and start draining their errors.
    pub fn supervise(&mut self, handles: Vec<LoopHandle>) {
        for handle in handles {
            let (name, errors, task) = handle.into_parts();
            let drain = tokio::spawn(drain_errors(name, errors));
            self.loops.push(SupervisedLoop {
                name,
                task,
                task_joined: false,
                drain,
            });
        }
    }

    /// Fire the stop signal on SIGINT/SIGTERM.
    pub fn listen_for_signals(&mut self) {
        if self.signal_listener.is_none() {
            self.signal_listener = Some(tokio::spawn(forward_shutdown_signals(self.stop.clone())));
        }
    }

    /// Run until the stop signal fires, then drain and terminate.
    pub async fn run(mut self) -> ShutdownReport {
        self.set_phase(Phase::Running);
        self.stop.fired().await;

        self.set_phase(Phase::Draining);
        let report = self.drain().await;

        if let Some(listener) = self.signal_listener.take() {
            listener.abort();
        }
        self.set_phase(Phase::Terminated);
        info!(
            stopped = report.stopped.len(),
            abandoned = report.abandoned.len(),
            errors = report.errors_logged,
            "Shutdown complete"
        );
        report
    }

    async fn drain(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        let deadline = self.drain_timeout.map(|timeout| Instant::now() + timeout);

        for supervised in &mut self.loops {
            let joined = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, supervised.join()).await.ok(),
                None => Some(supervised.join().await),
            };
            match joined {
                Some(errors) => {
                    report.errors_logged += errors;
                    report.stopped.push(supervised.name);
                }
                None if supervised.exited() => {
                    // The loop made the deadline; its drain only has to flush.
                    report.errors_logged += supervised.join().await;
                    report.stopped.push(supervised.name);
                }
                None => {
                    warn!(
                        loop_name = supervised.name,
                        "{} did not stop before the drain deadline, abandoning it",
                        supervised.name
                    );
                    supervised.abort();
                    report.abandoned.push(supervised.name);
                }
            }
        }

        report
    }
}

/// Log every error a loop reports until its channel closes.
async fn drain_errors(name: &'static str, mut errors: mpsc::UnboundedReceiver<ControllerError>) -> usize {
    info!(loop_name = name, "Watching {} for errors", name);
    let mut count = 0;
    while let Some(e) = errors.recv().await {
        count += 1;
        warn!(loop_name = name, error_kind = %e.kind(), "{} encountered error: {}", name, e);
    }
    count
}
