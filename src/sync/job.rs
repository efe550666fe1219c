//! Plan-then-apply jobs over a fixed source/target pair.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::executor::apply;
use super::plan::SyncPlan;
use super::planner::{plan, SyncOptions};
use super::result::SyncResult;
use crate::filter::PathMatcher;
use crate::{Error, Result};

/// One unit of work the watch coordinator can run repeatedly.
pub trait SyncCycle: Send + 'static {
    /// Run a full cycle.
    ///
    /// # Errors
    ///
    /// Returns an error when the cycle cannot run at all. Per-entry problems
    /// belong in the returned result.
    fn run_cycle(&mut self) -> Result<SyncResult>;
}

/// A source/target pair with its matcher and options.
#[derive(Debug, Clone)]
pub struct MirrorJob {
    source_root: PathBuf,
    target_root: PathBuf,
    matcher: Arc<PathMatcher>,
    options: SyncOptions,
}

impl MirrorJob {
    /// Create a job.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the source root is not an existing
    /// directory.
    pub fn new(
        source_root: impl Into<PathBuf>,
        target_root: impl Into<PathBuf>,
        matcher: Arc<PathMatcher>,
        options: SyncOptions,
    ) -> Result<Self> {
        let source_root = source_root.into();
        if !source_root.is_dir() {
            return Err(Error::validation(format!(
                "source directory '{}' does not exist",
                source_root.display()
            )));
        }

        Ok(Self {
            source_root,
            target_root: target_root.into(),
            matcher,
            options,
        })
    }

    #[must_use]
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    #[must_use]
    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    #[must_use]
    pub fn matcher(&self) -> &Arc<PathMatcher> {
        &self.matcher
    }

    #[must_use]
    pub fn options(&self) -> SyncOptions {
        self.options
    }

    /// Compute the plan without touching the target.
    ///
    /// # Errors
    ///
    /// Returns an error if the roots are invalid.
    pub fn plan(&self) -> Result<SyncPlan> {
        plan(
            &self.source_root,
            &self.target_root,
            &self.matcher,
            self.options,
        )
    }

    /// Plan and apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the roots are invalid.
    pub fn run(&self) -> Result<SyncResult> {
        let span = tracing::info_span!(
            "sync",
            source = %self.source_root.display(),
            target = %self.target_root.display()
        );
        let _enter = span.enter();

        let plan = self.plan()?;
        let counts = plan.counts();
        tracing::debug!(
            actions = plan.len(),
            mutations = counts.mutations(),
            "Planned sync"
        );

        let result = apply(&plan);
        if result.is_success() {
            tracing::info!("{}", result.summary());
        } else {
            tracing::warn!("{}", result.summary());
        }
        Ok(result)
    }
}

impl SyncCycle for MirrorJob {
    fn run_cycle(&mut self) -> Result<SyncResult> {
        self.run()
    }
}

/// Synchronize `target` with `source` once.
///
/// # Errors
///
/// Returns an error if the roots are invalid.
pub fn sync_directories(
    source: &Path,
    target: &Path,
    matcher: &PathMatcher,
    options: SyncOptions,
) -> Result<SyncResult> {
    let plan = plan(source, target, matcher, options)?;
    Ok(apply(&plan))
}

/// Run [`MirrorJob::run`] on the blocking thread pool.
///
/// # Errors
///
/// Returns an error if the roots are invalid or the blocking task panics.
pub async fn sync_directories_async(job: MirrorJob) -> Result<SyncResult> {
    tokio::task::spawn_blocking(move || job.run())
        .await
        .map_err(|e| Error::internal(format!("sync task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_new_requires_source_dir() {
        let tmp = TempDir::new().unwrap();
        let err = MirrorJob::new(
            tmp.path().join("missing"),
            tmp.path().join("dst"),
            Arc::new(PathMatcher::empty()),
            SyncOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_run_cycle_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src");
        fs::create_dir_all(source.join("nested")).unwrap();
        fs::write(source.join("nested/a.txt"), "a").unwrap();

        let mut job = MirrorJob::new(
            &source,
            tmp.path().join("dst"),
            Arc::new(PathMatcher::empty()),
            SyncOptions::default(),
        )
        .unwrap();

        let first = job.run_cycle().unwrap();
        assert_eq!(first.copied(), ["nested/a.txt"]);

        let second = job.run_cycle().unwrap();
        assert!(!second.has_changes());
        assert_eq!(second.skipped(), ["nested/a.txt"]);
        assert!(job.plan().unwrap().is_noop());
    }

    #[tokio::test]
    async fn test_sync_directories_async() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), "a").unwrap();

        let job = MirrorJob::new(
            &source,
            tmp.path().join("dst"),
            Arc::new(PathMatcher::empty()),
            SyncOptions::default(),
        )
        .unwrap();

        let result = sync_directories_async(job).await.unwrap();
        assert_eq!(result.copied(), ["a.txt"]);
        assert_eq!(result.dirs_created(), ["."]);
    }
}
