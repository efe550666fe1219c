//! Change source backed by OS file notifications via notify-rs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};

use super::events::{normalize, EventFilter, Signal};
use super::source::{ChangeSource, SignalSink};
use crate::error::WatcherError;
use crate::filter::PathMatcher;
use crate::Result;

/// Subscribes to OS notifications below a source root.
pub struct EventWatcher {
    root: PathBuf,
    recursive: bool,
    matcher: Arc<PathMatcher>,
    watcher: Option<RecommendedWatcher>,
}

impl EventWatcher {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, matcher: Arc<PathMatcher>) -> Self {
        Self {
            root: root.into(),
            recursive: true,
            matcher,
            watcher: None,
        }
    }

    /// Only watch the root directory itself.
    #[must_use]
    pub fn non_recursive(mut self) -> Self {
        self.recursive = false;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.watcher.is_some()
    }
}

impl ChangeSource for EventWatcher {
    fn start(&mut self, sink: SignalSink) -> Result<()> {
        if self.watcher.is_some() {
            return Err(WatcherError::AlreadyRunning.into());
        }

        // notify reports canonical paths on some platforms
        let root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        let filter = EventFilter::new(root.clone(), Arc::clone(&self.matcher));

        let mut watcher = notify::recommended_watcher(
            move |result: std::result::Result<notify::Event, notify::Error>| match result {
                Ok(event) => {
                    for change in normalize(&event) {
                        if filter.admit(&change) {
                            tracing::trace!(path = %change.path.display(), kind = ?change.kind, "Change");
                            sink.emit(Signal::Changed(change));
                        }
                    }
                }
                Err(e) => {
                    // Overflow or backend trouble: fall back to a full re-check
                    tracing::warn!(error = %e, "Watch error");
                    sink.emit(Signal::Rescan);
                }
            },
        )
        .map_err(|e| WatcherError::watch_failed(self.root.display().to_string(), e.to_string()))?;

        let mode = if self.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&root, mode)
            .map_err(|e| WatcherError::watch_failed(self.root.display().to_string(), e.to_string()))?;

        tracing::info!(path = %self.root.display(), recursive = self.recursive, "Watching directory");
        self.watcher = Some(watcher);
        Ok(())
    }

    fn stop(&mut self) {
        // dropping the watcher removes every watch it holds
        if self.watcher.take().is_some() {
            tracing::info!(path = %self.root.display(), "Stopped watching directory");
        }
    }

    fn name(&self) -> &'static str {
        "events"
    }
}

impl Drop for EventWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
