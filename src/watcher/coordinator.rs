//! Watch session: turns change signals into debounced, serialized sync cycles.
//!
//! `start()` runs one cycle on the caller's thread, spawns a worker thread
//! that owns the cycle loop, and only then activates the change source.
//! Signals go through a channel; the worker waits for the first one,
//! swallows everything that arrives within the debounce window, and runs a
//! single cycle. Signals that arrive while a cycle is running collapse into
//! one owed cycle that runs as soon as the current one returns.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use super::gate::CycleGate;
use super::source::{ChangeSource, SignalSink};
use crate::error::WatcherError;
use crate::observability::spans;
use crate::sync::{SyncCycle, SyncResult};
use crate::Result;

/// Default quiet period before a burst of signals triggers a cycle.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Lifecycle of a watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Running,
    Stopped,
}

enum Message {
    /// A change signal, subject to debouncing.
    Signal,
    /// An owed cycle left behind by `sync_now`; runs without debouncing.
    RunOwed,
    Shutdown,
}

/// State shared between the caller and the worker thread.
struct Shared {
    gate: CycleGate,
    job: Mutex<Box<dyn SyncCycle>>,
    latest: Mutex<Option<SyncResult>>,
    last_error: Mutex<Option<String>>,
    cycles: AtomicU64,
    accepting: AtomicBool,
}

impl Shared {
    /// Run one cycle. The caller must hold a claim on `gate`.
    fn execute(&self, trigger: &str) -> Result<SyncResult> {
        let span = spans::cycle_span(trigger);
        let _enter = span.enter();

        let outcome = self.job.lock().run_cycle();
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;

        match &outcome {
            Ok(result) => {
                tracing::debug!(cycle, failures = result.failure_count(), "Cycle finished");
                *self.latest.lock() = Some(result.clone());
                *self.last_error.lock() = None;
            }
            Err(e) => {
                tracing::error!(cycle, error = %e, "Sync cycle failed");
                *self.last_error.lock() = Some(e.to_string());
            }
        }
        outcome
    }
}

/// Owns one change source and drives a [`SyncCycle`] in response to it.
pub struct SyncCoordinator {
    shared: Arc<Shared>,
    source: Box<dyn ChangeSource>,
    fallback: Option<Box<dyn ChangeSource>>,
    on_fallback: bool,
    debounce: Duration,
    state: WatchState,
    sender: Option<Sender<Message>>,
    worker: Option<JoinHandle<()>>,
}

impl SyncCoordinator {
    /// Create an idle session.
    pub fn new(job: impl SyncCycle, source: impl ChangeSource + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                gate: CycleGate::new(),
                job: Mutex::new(Box::new(job)),
                latest: Mutex::new(None),
                last_error: Mutex::new(None),
                cycles: AtomicU64::new(0),
                accepting: AtomicBool::new(false),
            }),
            source: Box::new(source),
            fallback: None,
            on_fallback: false,
            debounce: DEFAULT_DEBOUNCE,
            state: WatchState::Idle,
            sender: None,
            worker: None,
        }
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Source to activate when the primary one fails to start.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl ChangeSource + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// Run the initial cycle, then begin reacting to change signals.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::AlreadyRunning`] if the session is running,
    /// the cycle's error if the initial sync cannot run, or the source's
    /// error if neither it nor the fallback can be activated. The state is
    /// unchanged on error.
    pub fn start(&mut self) -> Result<()> {
        if self.state == WatchState::Running {
            return Err(WatcherError::AlreadyRunning.into());
        }

        self.run_claimed("start")?;

        let (tx, rx) = unbounded();
        let shared = Arc::clone(&self.shared);
        let debounce = self.debounce;
        let worker = thread::Builder::new()
            .name("treesync-coordinator".to_string())
            .spawn(move || worker_loop(&shared, &rx, debounce))
            .map_err(|e| WatcherError::Poller(format!("failed to spawn coordinator thread: {e}")))?;

        self.shared.accepting.store(true, Ordering::SeqCst);
        let sink = self.sink(tx.clone());
        self.sender = Some(tx);
        self.worker = Some(worker);

        if let Err(e) = self.activate_source(sink) {
            self.shutdown_worker();
            return Err(e);
        }

        self.state = WatchState::Running;
        tracing::info!(
            source = self.source_name(),
            debounce_ms = u64::try_from(self.debounce.as_millis()).unwrap_or(u64::MAX),
            "Watch session started"
        );
        Ok(())
    }

    /// Stop accepting signals and wait for an in-flight cycle to finish.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::NotRunning`] if the session is not running.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != WatchState::Running {
            return Err(WatcherError::NotRunning.into());
        }

        if self.on_fallback {
            if let Some(fallback) = self.fallback.as_mut() {
                fallback.stop();
            }
        } else {
            self.source.stop();
        }
        self.shutdown_worker();

        self.state = WatchState::Stopped;
        tracing::info!(cycles = self.cycles_completed(), "Watch session stopped");
        Ok(())
    }

    /// Run a cycle on the caller's thread.
    ///
    /// Returns `Ok(None)` if a cycle is already running; one more cycle is
    /// then owed and runs after it.
    ///
    /// # Errors
    ///
    /// Returns the cycle's error if it cannot run.
    pub fn sync_now(&self) -> Result<Option<SyncResult>> {
        let Some(claim) = self.shared.gate.try_claim() else {
            self.shared.gate.defer();
            return Ok(None);
        };
        let outcome = self.shared.execute("manual");
        drop(claim);

        // a signal deferred while we held the gate is picked up by the worker
        if self.shared.gate.take_owed() {
            match &self.sender {
                Some(sender) if self.state == WatchState::Running => {
                    let _ = sender.send(Message::RunOwed);
                }
                _ => {}
            }
        }
        outcome.map(Some)
    }

    #[must_use]
    pub fn state(&self) -> WatchState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == WatchState::Running
    }

    /// Result of the most recent successful cycle.
    #[must_use]
    pub fn latest_result(&self) -> Option<SyncResult> {
        self.shared.latest.lock().clone()
    }

    /// Error of the most recent cycle, cleared by the next successful one.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().clone()
    }

    #[must_use]
    pub fn cycles_completed(&self) -> u64 {
        self.shared.cycles.load(Ordering::SeqCst)
    }

    /// Name of the source that is (or would be) delivering signals.
    #[must_use]
    pub fn source_name(&self) -> &'static str {
        match (&self.fallback, self.on_fallback) {
            (Some(fallback), true) => fallback.name(),
            _ => self.source.name(),
        }
    }

    fn run_claimed(&self, trigger: &str) -> Result<SyncResult> {
        let Some(_claim) = self.shared.gate.try_claim() else {
            return Err(WatcherError::AlreadyRunning.into());
        };
        self.shared.execute(trigger)
    }

    fn sink(&self, tx: Sender<Message>) -> SignalSink {
        let shared = Arc::clone(&self.shared);
        SignalSink::new(move |signal| {
            if shared.accepting.load(Ordering::SeqCst) {
                tracing::trace!(?signal, "Signal received");
                let _ = tx.send(Message::Signal);
            }
        })
    }

    fn activate_source(&mut self, sink: SignalSink) -> Result<()> {
        self.on_fallback = false;
        let Err(primary) = self.source.start(sink.clone()) else {
            return Ok(());
        };

        let Some(fallback) = self.fallback.as_mut() else {
            return Err(primary);
        };
        tracing::warn!(
            error = %primary,
            fallback = fallback.name(),
            "Change source failed to start, falling back"
        );
        fallback.start(sink)?;
        self.on_fallback = true;
        Ok(())
    }

    fn shutdown_worker(&mut self) {
        self.shared.accepting.store(false, Ordering::SeqCst);
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Message::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Coordinator thread panicked");
            }
        }
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        if self.state == WatchState::Running {
            let _ = self.stop();
        }
    }
}

fn worker_loop(shared: &Shared, rx: &Receiver<Message>, debounce: Duration) {
    loop {
        match rx.recv() {
            Ok(Message::Signal) => {
                if !coalesce(rx, debounce) {
                    break;
                }
            }
            Ok(Message::RunOwed) => {}
            Ok(Message::Shutdown) | Err(_) => break,
        }

        if !drive(shared, rx) {
            break;
        }
    }
    tracing::debug!("Coordinator thread exiting");
}

/// Swallow signals until the window after the first one closes.
///
/// Returns false on shutdown.
fn coalesce(rx: &Receiver<Message>, debounce: Duration) -> bool {
    let deadline = Instant::now() + debounce;
    loop {
        match rx.recv_deadline(deadline) {
            Ok(Message::Signal | Message::RunOwed) => {}
            Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => return false,
            Err(RecvTimeoutError::Timeout) => return true,
        }
    }
}

/// Run cycles until nothing is owed. Returns false on shutdown.
fn drive(shared: &Shared, rx: &Receiver<Message>) -> bool {
    loop {
        let claim = if let Some(claim) = shared.gate.try_claim() {
            claim
        } else {
            // a manual cycle holds the gate and will hand the work back
            shared.gate.defer();
            // unless it released before seeing the marker
            let Some(claim) = shared.gate.try_claim() else {
                return true;
            };
            shared.gate.take_owed();
            claim
        };
        // errors are recorded on `shared` and the session keeps going
        let _ = shared.execute("change");
        drop(claim);

        for message in rx.try_iter() {
            match message {
                Message::Signal | Message::RunOwed => shared.gate.defer(),
                Message::Shutdown => return false,
            }
        }

        if !shared.gate.take_owed() {
            return true;
        }
    }
}
