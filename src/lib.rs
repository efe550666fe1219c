//! treesync: one-way directory synchronization.
//!
//! A target tree is brought in line with a source tree according to
//! gitignore-style rules, either once ([`sync::sync_directories`]) or
//! continuously through a watch session ([`watcher::SyncCoordinator`]) that
//! reacts to file notifications or a polling timer.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod filter;
pub mod observability;
pub mod runner;
pub mod sync;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result, WatcherError};
