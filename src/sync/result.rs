//! Outcome of one sync cycle.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// An entry that could not be planned or applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    pub path: String,
    pub error: String,
}

impl SyncFailure {
    pub fn new(path: impl Into<String>, error: impl ToString) -> Self {
        Self {
            path: path.into(),
            error: error.to_string(),
        }
    }
}

/// Per-category totals of a [`SyncResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    pub copied: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub ignored: usize,
    pub dirs_created: usize,
    pub failures: usize,
}

/// Paths per category plus failures, one value per cycle.
///
/// Paths are relative to the synchronization roots and `/`-separated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    copied: Vec<String>,
    updated: Vec<String>,
    deleted: Vec<String>,
    skipped: Vec<String>,
    ignored: Vec<String>,
    #[serde(default)]
    dirs_created: Vec<String>,
    #[serde(default)]
    failures: Vec<SyncFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finished_at: Option<DateTime<Utc>>,
}

impl SyncResult {
    pub(crate) fn started() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    pub(crate) fn record_copied(&mut self, path: &str) {
        self.copied.push(path.to_string());
    }

    pub(crate) fn record_updated(&mut self, path: &str) {
        self.updated.push(path.to_string());
    }

    pub(crate) fn record_deleted(&mut self, path: &str) {
        self.deleted.push(path.to_string());
    }

    pub(crate) fn record_skipped(&mut self, path: &str) {
        self.skipped.push(path.to_string());
    }

    pub(crate) fn record_ignored(&mut self, path: &str) {
        self.ignored.push(path.to_string());
    }

    pub(crate) fn record_dir_created(&mut self, path: &str) {
        self.dirs_created.push(path.to_string());
    }

    pub(crate) fn record_failure(&mut self, failure: SyncFailure) {
        self.failures.push(failure);
    }

    #[must_use]
    pub fn copied(&self) -> &[String] {
        &self.copied
    }

    #[must_use]
    pub fn updated(&self) -> &[String] {
        &self.updated
    }

    #[must_use]
    pub fn deleted(&self) -> &[String] {
        &self.deleted
    }

    #[must_use]
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    #[must_use]
    pub fn ignored(&self) -> &[String] {
        &self.ignored
    }

    #[must_use]
    pub fn dirs_created(&self) -> &[String] {
        &self.dirs_created
    }

    #[must_use]
    pub fn failures(&self) -> &[SyncFailure] {
        &self.failures
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// True when no entry failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Whether the cycle changed the target tree.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !(self.copied.is_empty()
            && self.updated.is_empty()
            && self.deleted.is_empty()
            && self.dirs_created.is_empty())
    }

    #[must_use]
    pub fn counts(&self) -> SyncCounts {
        SyncCounts {
            copied: self.copied.len(),
            updated: self.updated.len(),
            deleted: self.deleted.len(),
            skipped: self.skipped.len(),
            ignored: self.ignored.len(),
            dirs_created: self.dirs_created.len(),
            failures: self.failures.len(),
        }
    }

    /// One-line summary for logs.
    #[must_use]
    pub fn summary(&self) -> String {
        let c = self.counts();
        let status = if self.is_success() {
            "completed".to_string()
        } else {
            format!("completed with {} failures", c.failures)
        };
        format!(
            "{status}: {} copied, {} updated, {} deleted, {} skipped, {} ignored, {} dirs created",
            c.copied, c.updated, c.deleted, c.skipped, c.ignored, c.dirs_created
        )
    }

    /// Write the result as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::internal(format!("failed to serialize sync result: {e}")))?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Saved sync result");
        Ok(())
    }

    /// Read a result previously written by [`SyncResult::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            Error::config(format!(
                "invalid sync result file '{}': {e}",
                path.display()
            ))
        })
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}
