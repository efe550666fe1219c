//! Structured logging and tracing configuration.
//!
//! Provides setup for observability using the `tracing` crate with:
//! - Plain or JSON output
//! - `RUST_LOG` overriding the configured level
//! - Spans for task runs and sync cycles

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

use crate::{Error, Result};

/// Tracing configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON output format
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(level: &str, json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let installed = if json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(json_layer).try_init()
    } else {
        let fmt_layer = fmt::layer().with_target(true).with_thread_names(true);

        Registry::default().with(env_filter).with(fmt_layer).try_init()
    };
    installed.map_err(|e| Error::internal(format!("failed to initialize tracing: {e}")))?;

    tracing::debug!("Tracing initialized: level={}, json={}", level, json);
    Ok(())
}

/// Read tracing configuration from the environment.
///
/// Respects these environment variables:
/// - `TREESYNC_LOG_LEVEL` - Log level (default: "info")
/// - `TREESYNC_LOG_JSON` - Enable JSON output (default: false)
#[must_use]
pub fn config_from_env() -> TracingConfig {
    let level = std::env::var("TREESYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let json = std::env::var("TREESYNC_LOG_JSON")
        .map(|v| parse_flag(&v))
        .unwrap_or(false);

    TracingConfig { level, json }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Spans wrapping units of sync work.
pub mod spans {
    use tracing::{info_span, Span};

    /// Span for one configured task.
    #[must_use]
    pub fn task_span(task: &str) -> Span {
        info_span!("task", task = %task)
    }

    /// Span for one sync cycle; `trigger` names what started it.
    #[must_use]
    pub fn cycle_span(trigger: &str) -> Span {
        info_span!("cycle", trigger = %trigger)
    }
}
