//! Configuration management for treesync.
//!
//! Two layers:
//! - Runtime settings ([`Config`]), filled from command-line flags and
//!   environment variables in `main.rs`
//! - The task file ([`TaskSet`]), a JSON list of source/target pairs

mod settings;
mod tasks;

pub use settings::Config;
pub use tasks::{IgnoreSpec, TaskConfig, TaskRef, TaskSet, TaskUpdate};
