//! Applies a [`SyncPlan`] to the filesystem.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use super::plan::{Action, SyncPlan};
use super::result::{SyncFailure, SyncResult};

/// Apply every action in plan order.
///
/// A failing action is recorded against its path and execution moves on to
/// the next one; planning failures are carried over into the result.
#[must_use]
pub fn apply(plan: &SyncPlan) -> SyncResult {
    let mut result = SyncResult::started();

    for failure in plan.failures() {
        result.record_failure(failure.clone());
    }

    for action in plan {
        let path = action.path().as_str();
        match apply_action(action) {
            Ok(()) => {
                tracing::debug!(action = %action, "Applied");
                record(&mut result, action);
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Failed to apply {}", action.kind().label());
                result.record_failure(SyncFailure::new(path, e));
            }
        }
    }

    result.finish()
}

fn apply_action(action: &Action) -> io::Result<()> {
    match action {
        Action::MakeDir { target, .. } => fs::create_dir_all(target),
        Action::Copy { source, target, .. } | Action::Update { source, target, .. } => {
            copy_file(source, target).map(|_| ())
        }
        Action::Delete { target, .. } => ignore_missing(fs::remove_file(target)),
        Action::RemoveDir { target, .. } => ignore_missing(fs::remove_dir_all(target)),
        Action::Skip { .. } | Action::Ignore { .. } => Ok(()),
    }
}

fn record(result: &mut SyncResult, action: &Action) {
    let path = action.path().as_str();
    match action {
        Action::MakeDir { .. } => result.record_dir_created(path),
        Action::Copy { .. } => result.record_copied(path),
        Action::Update { .. } => result.record_updated(path),
        Action::Delete { .. } | Action::RemoveDir { .. } => result.record_deleted(path),
        Action::Skip { .. } => result.record_skipped(path),
        Action::Ignore { .. } => result.record_ignored(path),
    }
}

/// Removing something that is already gone counts as done.
fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Copy a whole file, keeping its modification time and permission bits.
///
/// The content is written to a staging file next to `target` and renamed
/// over it, so a read-only or half-written target is never left behind.
///
/// # Errors
///
/// Returns an error if the source cannot be read or the target written.
pub fn copy_file(source: &Path, target: &Path) -> io::Result<u64> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let staging = staging_path(target);
    let outcome = write_staged(source, &staging, target);
    if outcome.is_err() {
        let _ = fs::remove_file(&staging);
    }
    outcome
}

fn write_staged(source: &Path, staging: &Path, target: &Path) -> io::Result<u64> {
    let mut reader = File::open(source)?;
    let metadata = reader.metadata()?;

    let mut writer = File::create(staging)?;
    let bytes = io::copy(&mut reader, &mut writer)?;
    if let Ok(modified) = metadata.modified() {
        writer.set_modified(modified)?;
    }
    drop(writer);

    fs::set_permissions(staging, metadata.permissions())?;
    fs::rename(staging, target)?;
    Ok(bytes)
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(target.file_name().unwrap_or_default());
    name.push(".treesync-partial");
    target.with_file_name(name)
}
