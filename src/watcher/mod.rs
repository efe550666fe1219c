//! Change propagation: watching the source tree and driving sync cycles.
//!
//! This module provides:
//! - Normalized change events and the filter applied before delivery
//! - Event-driven ([`EventWatcher`]) and polling ([`PollingWatcher`]) sources
//! - [`SyncCoordinator`], the debounced single-flight watch session

mod coordinator;
mod events;
mod gate;
mod polling;
mod source;
mod watcher;

pub use coordinator::{SyncCoordinator, WatchState, DEFAULT_DEBOUNCE};
pub use events::{normalize, ChangeEvent, ChangeKind, EventFilter, Signal};
pub use gate::{CycleClaim, CycleGate};
pub use polling::PollingWatcher;
pub use source::{ChangeSource, SignalSink};
pub use watcher::EventWatcher;
