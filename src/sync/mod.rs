//! One-way directory synchronization.
//!
//! This module provides:
//! - Tree diffing into an ordered [`SyncPlan`]
//! - Plan execution with per-entry failure reporting
//! - [`MirrorJob`], the unit of work the watch coordinator repeats

mod entry;
mod executor;
mod job;
mod plan;
mod planner;
mod result;

pub use entry::{file_digest, EntryKind, TreeEntry};
pub use executor::{apply, copy_file};
pub use job::{sync_directories, sync_directories_async, MirrorJob, SyncCycle};
pub use plan::{Action, ActionKind, PlanCounts, SyncPlan};
pub use planner::{plan, SyncOptions, SyncPlanner};
pub use result::{SyncCounts, SyncFailure, SyncResult};
