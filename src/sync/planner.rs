//! Tree diff: walks source and target and produces a [`SyncPlan`].
//!
//! The forward pass walks the source top-down so a `MakeDir` always precedes
//! the copies into that directory, and ignored directories are pruned before
//! anything below them is visited. The reverse pass (only with
//! `delete_extra`) walks the target and lists entries with no source
//! counterpart, emitting each extra directory's removal after everything
//! below it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::entry::TreeEntry;
use super::plan::{Action, SyncPlan};
use crate::filter::{PathMatcher, RelativePath};
use crate::{Error, Result};

/// Options controlling a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Remove target entries that do not exist in the source.
    #[serde(default)]
    pub delete_extra: bool,
    /// Decide updates by content digest instead of modification time.
    #[serde(default = "default_compare_by_content", rename = "compare_content")]
    pub compare_by_content: bool,
}

fn default_compare_by_content() -> bool {
    true
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            delete_extra: false,
            compare_by_content: true,
        }
    }
}

/// Compute the plan that brings `target_root` in line with `source_root`.
///
/// # Errors
///
/// Returns a validation error if the source root is missing or not a
/// directory, if the target root exists but is not a directory, or if the
/// target lies inside the source. Problems with individual entries are
/// recorded in the plan instead.
pub fn plan(
    source_root: &Path,
    target_root: &Path,
    matcher: &PathMatcher,
    options: SyncOptions,
) -> Result<SyncPlan> {
    SyncPlanner::new(source_root, target_root, matcher, options).plan()
}

/// Planner over one source/target pair.
pub struct SyncPlanner<'a> {
    source_root: &'a Path,
    target_root: &'a Path,
    matcher: &'a PathMatcher,
    options: SyncOptions,
}

/// An extra target directory whose removal waits for its descendants.
struct PendingRemoval {
    depth: usize,
    path: RelativePath,
    target: PathBuf,
}

impl<'a> SyncPlanner<'a> {
    #[must_use]
    pub fn new(
        source_root: &'a Path,
        target_root: &'a Path,
        matcher: &'a PathMatcher,
        options: SyncOptions,
    ) -> Self {
        Self {
            source_root,
            target_root,
            matcher,
            options,
        }
    }

    /// Walk both trees and build the plan.
    ///
    /// # Errors
    ///
    /// See [`plan`].
    pub fn plan(&self) -> Result<SyncPlan> {
        let target_exists = validate_roots(self.source_root, self.target_root)?;
        let mut plan = SyncPlan::new(self.source_root, self.target_root);

        if !target_exists {
            plan.push(Action::MakeDir {
                path: RelativePath::root(),
                target: self.target_root.to_path_buf(),
            });
        }

        self.forward_pass(&mut plan, target_exists);

        if self.options.delete_extra && target_exists {
            self.reverse_pass(&mut plan);
        }

        let counts = plan.counts();
        tracing::debug!(
            source = %self.source_root.display(),
            target = %self.target_root.display(),
            mkdir = counts.make_dir,
            copy = counts.copy,
            update = counts.update,
            delete = counts.delete + counts.remove_dir,
            skip = counts.skip,
            ignore = counts.ignore,
            failures = plan.failures().len(),
            "Planned sync"
        );

        Ok(plan)
    }

    fn forward_pass(&self, plan: &mut SyncPlan, target_exists: bool) {
        let mut walker = WalkDir::new(self.source_root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();
        // Depth of the outermost directory the plan creates from scratch;
        // nothing below it exists in the target.
        let mut fresh: Option<usize> = if target_exists { None } else { Some(0) };

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    record_walk_error(plan, self.source_root, &e);
                    continue;
                }
            };

            if fresh.is_some_and(|depth| entry.depth() <= depth) {
                fresh = None;
            }

            let Some(path) = RelativePath::from_root(self.source_root, entry.path()) else {
                continue;
            };
            let file_type = entry.file_type();
            let is_dir = file_type.is_dir();

            let deciding = self.matcher.deciding_rule(&path, is_dir);
            if let Some(rule) = deciding.filter(|rule| !rule.is_negated()) {
                if is_dir {
                    walker.skip_current_dir();
                }
                tracing::trace!(path = %path, is_dir, rule = rule.pattern(), "Ignoring entry");
                plan.push(Action::Ignore { path, is_dir });
                continue;
            }

            let target = path.to_native(self.target_root);
            if is_dir {
                if fresh.is_some() {
                    plan.push(Action::MakeDir { path, target });
                } else if plan_directory(plan, path, target) {
                    fresh = Some(entry.depth());
                }
            } else if file_type.is_file() {
                if fresh.is_some() {
                    plan.push(Action::Copy {
                        path,
                        source: entry.path().to_path_buf(),
                        target,
                    });
                } else {
                    self.plan_file(plan, path, entry.path(), target);
                }
            } else {
                tracing::debug!(path = %path, "Skipping special file");
                plan.push(Action::Skip { path });
            }
        }
    }

    fn plan_file(&self, plan: &mut SyncPlan, path: RelativePath, source: &Path, target: PathBuf) {
        let mut source_entry = match fs::metadata(source) {
            Ok(metadata) => TreeEntry::from_metadata(path.clone(), &metadata),
            Err(e) => {
                plan.record_failure(path.as_str(), e);
                return;
            }
        };

        let mut target_entry = match TreeEntry::stat(self.target_root, path.clone()) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                plan.push(Action::Copy {
                    path,
                    source: source.to_path_buf(),
                    target,
                });
                return;
            }
            Err(e) => {
                plan.record_failure(path.as_str(), e);
                return;
            }
        };

        if target_entry.is_dir() {
            plan.push(Action::RemoveDir {
                path: path.clone(),
                target: target.clone(),
            });
            plan.push(Action::Copy {
                path,
                source: source.to_path_buf(),
                target,
            });
            return;
        }

        match self.needs_update(&mut source_entry, &mut target_entry) {
            Ok(true) => plan.push(Action::Update {
                path,
                source: source.to_path_buf(),
                target,
            }),
            Ok(false) => plan.push(Action::Skip { path }),
            Err(e) => plan.record_failure(path.as_str(), e),
        }
    }

    fn needs_update(&self, source: &mut TreeEntry, target: &mut TreeEntry) -> io::Result<bool> {
        if !self.options.compare_by_content {
            return Ok(source.is_newer_than(target));
        }

        if source.size != target.size {
            return Ok(true);
        }

        let source_digest = source.digest(self.source_root)?.to_string();
        let target_digest = target.digest(self.target_root)?;
        Ok(source_digest != target_digest)
    }

    fn reverse_pass(&self, plan: &mut SyncPlan) {
        let mut walker = WalkDir::new(self.target_root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        let mut pending: Vec<PendingRemoval> = Vec::new();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    record_walk_error(plan, self.target_root, &e);
                    continue;
                }
            };

            flush_removals(plan, &mut pending, entry.depth());

            let Some(path) = RelativePath::from_root(self.target_root, entry.path()) else {
                continue;
            };
            let is_dir = entry.file_type().is_dir();

            if self.matcher.matches(&path, is_dir) {
                if is_dir {
                    walker.skip_current_dir();
                }
                continue;
            }

            let target = entry.path().to_path_buf();

            // Everything below an extra directory is extra as well.
            if !pending.is_empty() {
                mark_extra(plan, &mut pending, entry.depth(), path, target, is_dir);
                continue;
            }

            match fs::metadata(path.to_native(self.source_root)) {
                Ok(metadata) => {
                    // kind mismatches were replaced by the forward pass
                    if is_dir && !metadata.is_dir() {
                        walker.skip_current_dir();
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    mark_extra(plan, &mut pending, entry.depth(), path, target, is_dir);
                }
                Err(e) => {
                    if is_dir {
                        walker.skip_current_dir();
                    }
                    plan.record_failure(path.as_str(), e);
                }
            }
        }

        flush_removals(plan, &mut pending, 0);
    }
}

/// Returns true when the plan creates the directory from scratch.
fn plan_directory(plan: &mut SyncPlan, path: RelativePath, target: PathBuf) -> bool {
    match fs::metadata(&target) {
        Ok(metadata) if metadata.is_dir() => false,
        Ok(_) => {
            plan.push(Action::Delete {
                path: path.clone(),
                target: target.clone(),
            });
            plan.push(Action::MakeDir { path, target });
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            plan.push(Action::MakeDir { path, target });
            true
        }
        Err(e) => {
            plan.record_failure(path.as_str(), e);
            false
        }
    }
}

fn mark_extra(
    plan: &mut SyncPlan,
    pending: &mut Vec<PendingRemoval>,
    depth: usize,
    path: RelativePath,
    target: PathBuf,
    is_dir: bool,
) {
    if is_dir {
        pending.push(PendingRemoval {
            depth,
            path,
            target,
        });
    } else {
        plan.push(Action::Delete { path, target });
    }
}

/// Emit removals for pending directories that the walk has left.
fn flush_removals(plan: &mut SyncPlan, pending: &mut Vec<PendingRemoval>, depth: usize) {
    while pending.last().is_some_and(|p| p.depth >= depth) {
        if let Some(done) = pending.pop() {
            plan.push(Action::RemoveDir {
                path: done.path,
                target: done.target,
            });
        }
    }
}

fn record_walk_error(plan: &mut SyncPlan, root: &Path, error: &walkdir::Error) {
    let path = error
        .path()
        .and_then(|p| RelativePath::from_root(root, p))
        .map_or_else(|| root.display().to_string(), |p| p.to_string());
    plan.record_failure(path, error);
}

/// Check both roots; returns whether the target root already exists.
fn validate_roots(source_root: &Path, target_root: &Path) -> Result<bool> {
    if !source_root.exists() {
        return Err(Error::validation(format!(
            "source directory does not exist: {}",
            source_root.display()
        )));
    }
    if !source_root.is_dir() {
        return Err(Error::validation(format!(
            "source path is not a directory: {}",
            source_root.display()
        )));
    }

    let target_exists = match fs::metadata(target_root) {
        Ok(metadata) if metadata.is_dir() => true,
        Ok(_) => {
            return Err(Error::validation(format!(
                "target path exists and is not a directory: {}",
                target_root.display()
            )))
        }
        Err(_) => false,
    };

    let source = source_root
        .canonicalize()
        .unwrap_or_else(|_| source_root.to_path_buf());
    let target = if target_exists {
        target_root
            .canonicalize()
            .unwrap_or_else(|_| target_root.to_path_buf())
    } else {
        target_root.to_path_buf()
    };
    if target.starts_with(&source) || target_root.starts_with(source_root) {
        return Err(Error::validation(format!(
            "target directory {} must not be inside source directory {}",
            target_root.display(),
            source_root.display()
        )));
    }

    Ok(target_exists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::plan::ActionKind;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct Trees {
        _tmp: TempDir,
        source: PathBuf,
        target: PathBuf,
    }

    fn trees() -> Trees {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source");
        let target = tmp.path().join("target");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&target).unwrap();
        Trees {
            _tmp: tmp,
            source,
            target,
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    fn mirror() -> SyncOptions {
        SyncOptions {
            delete_extra: true,
            compare_by_content: true,
        }
    }

    #[test]
    fn test_missing_source_is_validation_error() {
        let t = trees();
        let err = plan(
            &t.source.join("nope"),
            &t.target,
            &PathMatcher::empty(),
            mirror(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_target_file_is_validation_error() {
        let t = trees();
        let file_target = t.target.join("file");
        fs::write(&file_target, "x").unwrap();
        let err = plan(&t.source, &file_target, &PathMatcher::empty(), mirror()).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_target_inside_source_rejected() {
        let t = trees();
        let nested = t.source.join("backup");
        let err = plan(&t.source, &nested, &PathMatcher::empty(), mirror()).unwrap_err();
        assert!(err.to_string().contains("must not be inside"));
    }

    #[test]
    fn test_missing_target_root_gets_created_first() {
        let t = trees();
        write(&t.source, "a.txt", "hi");
        let target = t.target.join("fresh");

        let plan = plan(&t.source, &target, &PathMatcher::empty(), mirror()).unwrap();
        assert_eq!(plan.actions()[0].kind(), ActionKind::MakeDir);
        assert!(plan.actions()[0].path().is_root());
        assert_eq!(plan.counts().copy, 1);
    }

    #[test]
    fn test_copy_and_make_dir_order() {
        let t = trees();
        write(&t.source, "docs/guide/intro.md", "intro");

        let plan = plan(&t.source, &t.target, &PathMatcher::empty(), mirror()).unwrap();
        let mkdir_docs = plan.position(ActionKind::MakeDir, "docs").unwrap();
        let mkdir_guide = plan.position(ActionKind::MakeDir, "docs/guide").unwrap();
        let copy = plan.position(ActionKind::Copy, "docs/guide/intro.md").unwrap();
        assert!(mkdir_docs < mkdir_guide);
        assert!(mkdir_guide < copy);
    }

    #[test]
    fn test_ignored_directory_is_pruned() {
        let t = trees();
        write(&t.source, "temp/cache.bin", "x");
        write(&t.source, "temp/deeper/more.bin", "x");
        write(&t.target, "temp/stale.bin", "old");
        write(&t.source, "keep.txt", "x");

        let matcher = PathMatcher::new(["temp/"]).unwrap();
        let plan = plan(&t.source, &t.target, &matcher, mirror()).unwrap();

        assert!(plan.position(ActionKind::Ignore, "temp").is_some());
        assert!(plan
            .iter()
            .all(|a| !a.path().as_str().starts_with("temp/")));
        assert_eq!(plan.counts().delete, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_entry_recorded_and_siblings_planned() {
        let t = trees();
        write(&t.source, "a.txt", "a");
        write(&t.source, "sub/b.txt", "b");
        std::os::unix::fs::symlink(t.source.join("nowhere"), t.source.join("broken")).unwrap();

        let plan = plan(&t.source, &t.target, &PathMatcher::empty(), mirror()).unwrap();

        assert_eq!(plan.failures().len(), 1);
        assert_eq!(plan.failures()[0].path, "broken");
        assert!(plan.position(ActionKind::Copy, "a.txt").is_some());
        assert!(plan.position(ActionKind::MakeDir, "sub").is_some());
        assert!(plan.position(ActionKind::Copy, "sub/b.txt").is_some());
        assert!(plan.iter().all(|a| a.path().as_str() != "broken"));
    }

    #[test]
    fn test_ignored_files_are_not_deleted() {
        let t = trees();
        write(&t.target, "scratch.tmp", "target only");

        let matcher = PathMatcher::new(["*.tmp"]).unwrap();
        let plan = plan(&t.source, &t.target, &matcher, mirror()).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_content_comparison() {
        let t = trees();
        write(&t.source, "same.txt", "same");
        write(&t.target, "same.txt", "same");
        write(&t.source, "changed.txt", "new!");
        write(&t.target, "changed.txt", "old!");
        write(&t.source, "grown.txt", "longer content");
        write(&t.target, "grown.txt", "short");

        let plan = plan(&t.source, &t.target, &PathMatcher::empty(), mirror()).unwrap();
        assert!(plan.position(ActionKind::Skip, "same.txt").is_some());
        assert!(plan.position(ActionKind::Update, "changed.txt").is_some());
        assert!(plan.position(ActionKind::Update, "grown.txt").is_some());
    }

    #[test]
    fn test_mtime_comparison() {
        let t = trees();
        write(&t.source, "a.txt", "same");
        write(&t.target, "a.txt", "same");
        write(&t.source, "b.txt", "src");
        write(&t.target, "b.txt", "dst");

        let now = SystemTime::now();
        set_mtime(&t.source.join("a.txt"), now);
        set_mtime(&t.target.join("a.txt"), now - Duration::from_secs(60));
        // target newer than source: never updated by mtime
        set_mtime(&t.source.join("b.txt"), now - Duration::from_secs(60));
        set_mtime(&t.target.join("b.txt"), now);

        let options = SyncOptions {
            delete_extra: false,
            compare_by_content: false,
        };
        let plan = plan(&t.source, &t.target, &PathMatcher::empty(), options).unwrap();
        assert!(plan.position(ActionKind::Update, "a.txt").is_some());
        assert!(plan.position(ActionKind::Skip, "b.txt").is_some());
    }

    #[test]
    fn test_extras_only_with_delete_extra() {
        let t = trees();
        write(&t.target, "extra.txt", "x");

        let keep = SyncOptions {
            delete_extra: false,
            compare_by_content: true,
        };
        let plan_keep = plan(&t.source, &t.target, &PathMatcher::empty(), keep).unwrap();
        assert!(plan_keep.is_empty());

        let plan_mirror = plan(&t.source, &t.target, &PathMatcher::empty(), mirror()).unwrap();
        assert!(plan_mirror.position(ActionKind::Delete, "extra.txt").is_some());
    }

    #[test]
    fn test_extra_directory_removed_after_descendants() {
        let t = trees();
        write(&t.target, "old/a.txt", "x");
        write(&t.target, "old/sub/b.txt", "x");
        write(&t.target, "zzz.txt", "x");

        let plan = plan(&t.source, &t.target, &PathMatcher::empty(), mirror()).unwrap();
        let rm_old = plan.position(ActionKind::RemoveDir, "old").unwrap();
        let rm_sub = plan.position(ActionKind::RemoveDir, "old/sub").unwrap();
        let del_a = plan.position(ActionKind::Delete, "old/a.txt").unwrap();
        let del_b = plan.position(ActionKind::Delete, "old/sub/b.txt").unwrap();

        assert!(del_b < rm_sub);
        assert!(rm_sub < rm_old);
        assert!(del_a < rm_old);
        assert!(plan.position(ActionKind::Delete, "zzz.txt").is_some());
    }

    #[test]
    fn test_kind_mismatch_replaced() {
        let t = trees();
        write(&t.source, "thing", "now a file");
        write(&t.target, "thing/inner.txt", "was a dir");
        write(&t.source, "other/inner.txt", "now a dir");
        write(&t.target, "other", "was a file");

        let plan = plan(&t.source, &t.target, &PathMatcher::empty(), mirror()).unwrap();

        let rm = plan.position(ActionKind::RemoveDir, "thing").unwrap();
        let copy = plan.position(ActionKind::Copy, "thing").unwrap();
        assert!(rm < copy);
        assert!(plan.position(ActionKind::Delete, "thing/inner.txt").is_none());

        let del = plan.position(ActionKind::Delete, "other").unwrap();
        let mkdir = plan.position(ActionKind::MakeDir, "other").unwrap();
        assert!(del < mkdir);
    }

    #[test]
    fn test_rendered_plan() {
        let t = trees();
        write(&t.source, "a.txt", "hi");
        write(&t.source, "logs/app.log", "x");
        write(&t.source, "temp/scratch.txt", "x");
        write(&t.target, "stale/old.txt", "x");

        let matcher = PathMatcher::new(["*.log", "temp/"]).unwrap();
        let plan = plan(&t.source, &t.target, &matcher, mirror()).unwrap();

        insta::assert_snapshot!(plan.to_string(), @r"
        copy a.txt
        mkdir logs/
        ignore logs/app.log
        ignore temp/
        delete stale/old.txt
        rmdir stale/
        ");
    }
}
