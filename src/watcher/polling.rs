//! Change source that asks for a full re-check on a fixed interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::events::Signal;
use super::source::{ChangeSource, SignalSink};
use crate::error::WatcherError;
use crate::Result;

/// Longest the polling thread sleeps before looking at the stop flag.
const STOP_CHECK: Duration = Duration::from_secs(1);

/// Emits [`Signal::Rescan`] every `interval`, starting one interval after
/// `start`.
pub struct PollingWatcher {
    interval: Duration,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PollingWatcher {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }
}

impl ChangeSource for PollingWatcher {
    fn start(&mut self, sink: SignalSink) -> Result<()> {
        if self.handle.is_some() {
            return Err(WatcherError::AlreadyRunning.into());
        }
        if self.interval.is_zero() {
            return Err(WatcherError::Poller("poll interval must be positive".to_string()).into());
        }

        self.stop = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&self.stop);
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("treesync-poll".to_string())
            .spawn(move || poll_loop(interval, &stop, &sink))
            .map_err(|e| WatcherError::Poller(format!("failed to spawn polling thread: {e}")))?;

        tracing::info!(interval_secs = interval.as_secs_f64(), "Polling started");
        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Polling thread panicked");
            }
            tracing::info!("Polling stopped");
        }
    }

    fn name(&self) -> &'static str {
        "polling"
    }
}

impl Drop for PollingWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll_loop(interval: Duration, stop: &AtomicBool, sink: &SignalSink) {
    loop {
        let deadline = Instant::now() + interval;
        loop {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(STOP_CHECK));
        }

        tracing::trace!("Poll tick");
        sink.emit(Signal::Rescan);
    }
}
