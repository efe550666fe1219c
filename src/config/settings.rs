//! Runtime settings and validation.

use std::time::Duration;

use crate::{Error, Result};

/// Longest accepted debounce window.
const MAX_DEBOUNCE: Duration = Duration::from_secs(60);

/// Runtime settings shared by every task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON.
    pub log_json: bool,

    /// Quiet period that coalesces a burst of changes into one cycle.
    pub debounce: Duration,

    /// Interval between full re-checks when polling.
    pub poll_interval: Duration,

    /// Poll instead of subscribing to OS notifications.
    pub use_polling: bool,

    /// Poll when OS notifications cannot be set up.
    pub fallback_to_polling: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            debounce: Duration::from_secs(1),
            poll_interval: Duration::from_secs(60),
            use_polling: false,
            fallback_to_polling: true,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.poll_interval.is_zero() {
            return Err(Error::config("poll_interval cannot be 0"));
        }

        if self.debounce > MAX_DEBOUNCE {
            return Err(Error::config(format!(
                "debounce cannot exceed {}s",
                MAX_DEBOUNCE.as_secs()
            )));
        }

        Ok(())
    }
}
