//! Running configured tasks, once or as watch sessions.

use std::sync::Arc;

use futures::future::join_all;

use crate::config::{Config, TaskConfig, TaskSet};
use crate::observability::spans;
use crate::sync::{MirrorJob, SyncResult};
use crate::watcher::{EventWatcher, PollingWatcher, SyncCoordinator};
use crate::{Error, Result};

/// What happened to one task in [`run_tasks`].
#[derive(Debug)]
pub struct TaskOutcome {
    pub name: String,
    /// The cycle's result, or why the task could not run.
    pub result: std::result::Result<SyncResult, String>,
}

impl TaskOutcome {
    /// The task ran and no entry failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.as_ref().is_ok_and(SyncResult::is_success)
    }
}

/// Run the named tasks (or every enabled task when `names` is empty)
/// concurrently, one blocking task each.
///
/// A task that cannot run, for example because its source directory is
/// missing, yields an error outcome without affecting the others.
///
/// # Errors
///
/// Returns a configuration error if a name does not match any task.
pub async fn run_tasks(set: &TaskSet, names: &[String]) -> Result<Vec<TaskOutcome>> {
    let selected: Vec<TaskConfig> = set.select(names)?.into_iter().cloned().collect();
    if selected.is_empty() {
        tracing::warn!("No tasks to run");
    }

    let handles = selected.into_iter().map(|task| {
        let name = task.name.clone();
        let handle = tokio::task::spawn_blocking(move || run_task(&task));
        async move {
            let result = match handle.await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(e) => Err(format!("task panicked: {e}")),
            };
            TaskOutcome { name, result }
        }
    });

    Ok(join_all(handles).await)
}

/// Check that every task in `outcomes` got to run.
///
/// Per-entry failures inside a run do not count; they are part of the
/// task's result.
///
/// # Errors
///
/// Returns a validation error naming the tasks that could not run.
pub fn ensure_all_ran(outcomes: &[TaskOutcome]) -> Result<()> {
    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|outcome| outcome.result.is_err())
        .map(|outcome| outcome.name.as_str())
        .collect();

    if failed.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "{} task(s) did not run: {}",
            failed.len(),
            failed.join(", ")
        )))
    }
}

/// Run one task synchronously.
///
/// # Errors
///
/// Returns an error if the task is invalid or its roots are.
pub fn run_task(task: &TaskConfig) -> Result<SyncResult> {
    let span = spans::task_span(&task.name);
    let _enter = span.enter();

    let result = task.job().and_then(|job| job.run());
    if let Err(e) = &result {
        tracing::error!(error = %e, "Task failed");
    }
    result
}

/// Build an idle watch session for `job` according to `settings`.
///
/// With `use_polling` the session polls; otherwise it subscribes to OS
/// notifications and, with `fallback_to_polling`, polls when that fails.
#[must_use]
pub fn build_coordinator(job: MirrorJob, settings: &Config) -> SyncCoordinator {
    let poller = PollingWatcher::new(settings.poll_interval);

    let coordinator = if settings.use_polling {
        SyncCoordinator::new(job, poller)
    } else {
        let watcher = EventWatcher::new(job.source_root(), Arc::clone(job.matcher()));
        let coordinator = SyncCoordinator::new(job, watcher);
        if settings.fallback_to_polling {
            coordinator.with_fallback(poller)
        } else {
            coordinator
        }
    };

    coordinator.with_debounce(settings.debounce)
}

/// Start a watch session for a configured task.
///
/// # Errors
///
/// Returns an error if the task cannot be turned into a job or the session
/// fails to start.
pub fn start_auto_sync(task: &TaskConfig, settings: &Config) -> Result<SyncCoordinator> {
    let span = spans::task_span(&task.name);
    let _enter = span.enter();

    let mut coordinator = build_coordinator(task.job()?, settings);
    coordinator.start()?;
    Ok(coordinator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncFailure;
    use crate::watcher::WatchState;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn task(tmp: &TempDir, name: &str) -> TaskConfig {
        let source = tmp.path().join(format!("{name}-src"));
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), name).unwrap();
        TaskConfig::new(name, source, tmp.path().join(format!("{name}-dst")))
    }

    #[tokio::test]
    async fn test_run_tasks_isolates_failures() {
        let tmp = TempDir::new().unwrap();
        let good = task(&tmp, "good");
        let mut broken = task(&tmp, "broken");
        broken.source_dir = tmp.path().join("missing");
        let mut disabled = task(&tmp, "disabled");
        disabled.enabled = false;

        let set: TaskSet = [good, broken, disabled].into_iter().collect();
        let outcomes = run_tasks(&set, &[]).await.unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].name, "good");
        assert!(outcomes[0].is_success());
        assert!(outcomes[1].result.as_ref().unwrap_err().contains("does not exist"));
        assert!(tmp.path().join("good-dst/a.txt").exists());
        assert!(!tmp.path().join("disabled-dst").exists());

        let err = ensure_all_ran(&outcomes).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(
            err.to_string(),
            "validation error: 1 task(s) did not run: broken"
        );
    }

    #[tokio::test]
    async fn test_ensure_all_ran_ignores_entry_failures() {
        let tmp = TempDir::new().unwrap();
        let set: TaskSet = [task(&tmp, "one"), task(&tmp, "two")].into_iter().collect();
        let outcomes = run_tasks(&set, &[]).await.unwrap();
        assert!(ensure_all_ran(&outcomes).is_ok());

        let with_failures = [TaskOutcome {
            name: "partial".to_string(),
            result: Ok({
                let mut result = SyncResult::default();
                result.record_failure(SyncFailure::new("a.txt", "permission denied"));
                result
            }),
        }];
        assert!(ensure_all_ran(&with_failures).is_ok());
        assert!(ensure_all_ran(&[]).is_ok());
    }

    #[tokio::test]
    async fn test_run_tasks_by_name() {
        let tmp = TempDir::new().unwrap();
        let mut disabled = task(&tmp, "disabled");
        disabled.enabled = false;
        let set: TaskSet = [disabled].into_iter().collect();

        let outcomes = run_tasks(&set, &["disabled".to_string()]).await.unwrap();
        assert!(outcomes[0].is_success());

        assert!(run_tasks(&set, &["other".to_string()]).await.is_err());
    }

    #[test]
    fn test_start_auto_sync_polling() {
        let tmp = TempDir::new().unwrap();
        let task = task(&tmp, "watched");
        let settings = Config {
            use_polling: true,
            poll_interval: Duration::from_secs(30),
            ..Config::default()
        };

        let mut coordinator = start_auto_sync(&task, &settings).unwrap();
        assert_eq!(coordinator.state(), WatchState::Running);
        assert_eq!(coordinator.source_name(), "polling");
        assert_eq!(coordinator.latest_result().unwrap().copied(), ["a.txt"]);

        coordinator.stop().unwrap();
        assert_eq!(coordinator.state(), WatchState::Stopped);
    }
}
