//! The contract shared by event-driven and polling change sources.

use std::fmt;
use std::sync::Arc;

use super::events::Signal;
use crate::Result;

/// Receives signals from a change source's background context.
#[derive(Clone)]
pub struct SignalSink {
    inner: Arc<dyn Fn(Signal) + Send + Sync>,
}

impl SignalSink {
    pub fn new(f: impl Fn(Signal) + Send + Sync + 'static) -> Self {
        Self { inner: Arc::new(f) }
    }

    pub fn emit(&self, signal: Signal) {
        (self.inner)(signal);
    }
}

impl fmt::Debug for SignalSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalSink").finish_non_exhaustive()
    }
}

/// Something that tells the coordinator when the source tree may have changed.
pub trait ChangeSource: Send {
    /// Begin delivering signals to `sink`.
    ///
    /// # Errors
    ///
    /// Returns a watcher error if the source cannot be activated.
    fn start(&mut self, sink: SignalSink) -> Result<()>;

    /// Stop delivering signals. Returns once no further signal will be sent.
    fn stop(&mut self);

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_sink_clones_share_target() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let sink = SignalSink::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let other = sink.clone();
        sink.emit(Signal::Rescan);
        other.emit(Signal::Rescan);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
