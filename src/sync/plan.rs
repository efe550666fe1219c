//! Ordered action lists produced by the planner.

use std::fmt;
use std::path::{Path, PathBuf};

use super::result::SyncFailure;
use crate::filter::RelativePath;

/// One step of a plan. Each variant carries only what applying it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create a directory in the target tree.
    MakeDir { path: RelativePath, target: PathBuf },
    /// Copy a file that is absent from the target.
    Copy {
        path: RelativePath,
        source: PathBuf,
        target: PathBuf,
    },
    /// Overwrite a target file that differs from its source.
    Update {
        path: RelativePath,
        source: PathBuf,
        target: PathBuf,
    },
    /// Remove a target file (or symlink).
    Delete { path: RelativePath, target: PathBuf },
    /// Remove a target directory and anything left inside it.
    RemoveDir { path: RelativePath, target: PathBuf },
    /// File already up to date.
    Skip { path: RelativePath },
    /// Excluded by the ignore rules; directories are not descended.
    Ignore { path: RelativePath, is_dir: bool },
}

/// Discriminant of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    MakeDir,
    Copy,
    Update,
    Delete,
    RemoveDir,
    Skip,
    Ignore,
}

impl ActionKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::MakeDir => "mkdir",
            Self::Copy => "copy",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::RemoveDir => "rmdir",
            Self::Skip => "skip",
            Self::Ignore => "ignore",
        }
    }

    /// Whether applying this kind changes the target tree.
    #[must_use]
    pub fn is_mutation(self) -> bool {
        !matches!(self, Self::Skip | Self::Ignore)
    }
}

impl Action {
    #[must_use]
    pub fn path(&self) -> &RelativePath {
        match self {
            Self::MakeDir { path, .. }
            | Self::Copy { path, .. }
            | Self::Update { path, .. }
            | Self::Delete { path, .. }
            | Self::RemoveDir { path, .. }
            | Self::Skip { path }
            | Self::Ignore { path, .. } => path,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::MakeDir { .. } => ActionKind::MakeDir,
            Self::Copy { .. } => ActionKind::Copy,
            Self::Update { .. } => ActionKind::Update,
            Self::Delete { .. } => ActionKind::Delete,
            Self::RemoveDir { .. } => ActionKind::RemoveDir,
            Self::Skip { .. } => ActionKind::Skip,
            Self::Ignore { .. } => ActionKind::Ignore,
        }
    }

    fn names_directory(&self) -> bool {
        match self {
            Self::MakeDir { .. } | Self::RemoveDir { .. } => true,
            Self::Ignore { is_dir, .. } => *is_dir,
            _ => false,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path();
        if self.names_directory() && !path.is_root() {
            write!(f, "{} {path}/", self.kind().label())
        } else {
            write!(f, "{} {path}", self.kind().label())
        }
    }
}

/// Number of actions per kind in a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanCounts {
    pub make_dir: usize,
    pub copy: usize,
    pub update: usize,
    pub delete: usize,
    pub remove_dir: usize,
    pub skip: usize,
    pub ignore: usize,
}

impl PlanCounts {
    /// Actions that change the target tree.
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.make_dir + self.copy + self.update + self.delete + self.remove_dir
    }
}

/// Ordered actions for one source/target pair plus entries that could not
/// be planned.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    source_root: PathBuf,
    target_root: PathBuf,
    actions: Vec<Action>,
    failures: Vec<SyncFailure>,
}

impl SyncPlan {
    #[must_use]
    pub fn new(source_root: impl Into<PathBuf>, target_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            target_root: target_root.into(),
            actions: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn record_failure(&mut self, path: impl Into<String>, error: impl ToString) {
        let failure = SyncFailure::new(path, error);
        tracing::warn!(path = %failure.path, error = %failure.error, "Failed to plan entry");
        self.failures.push(failure);
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
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    #[must_use]
    pub fn failures(&self) -> &[SyncFailure] {
        &self.failures
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Action> {
        self.actions.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Position of the first action of `kind` on `path`.
    #[must_use]
    pub fn position(&self, kind: ActionKind, path: &str) -> Option<usize> {
        self.actions
            .iter()
            .position(|a| a.kind() == kind && a.path().as_str() == path)
    }

    #[must_use]
    pub fn counts(&self) -> PlanCounts {
        let mut counts = PlanCounts::default();
        for action in &self.actions {
            match action.kind() {
                ActionKind::MakeDir => counts.make_dir += 1,
                ActionKind::Copy => counts.copy += 1,
                ActionKind::Update => counts.update += 1,
                ActionKind::Delete => counts.delete += 1,
                ActionKind::RemoveDir => counts.remove_dir += 1,
                ActionKind::Skip => counts.skip += 1,
                ActionKind::Ignore => counts.ignore += 1,
            }
        }
        counts
    }

    /// True when applying the plan would not change the target.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.actions.iter().all(|a| !a.kind().is_mutation())
    }
}

impl<'a> IntoIterator for &'a SyncPlan {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

impl fmt::Display for SyncPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, action) in self.actions.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{action}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(path: &str) -> RelativePath {
        RelativePath::new(path).unwrap()
    }

    #[test]
    fn test_counts_and_noop() {
        let mut plan = SyncPlan::new("/src", "/dst");
        plan.push(Action::Skip { path: rel("a.txt") });
        plan.push(Action::Ignore {
            path: rel("temp"),
            is_dir: true,
        });
        assert!(plan.is_noop());

        plan.push(Action::Copy {
            path: rel("b.txt"),
            source: PathBuf::from("/src/b.txt"),
            target: PathBuf::from("/dst/b.txt"),
        });
        assert!(!plan.is_noop());

        let counts = plan.counts();
        assert_eq!(counts.skip, 1);
        assert_eq!(counts.ignore, 1);
        assert_eq!(counts.copy, 1);
        assert_eq!(counts.mutations(), 1);
        assert_eq!(plan.position(ActionKind::Copy, "b.txt"), Some(2));
    }

    #[test]
    fn test_display() {
        let mut plan = SyncPlan::new("/src", "/dst");
        plan.push(Action::MakeDir {
            path: rel("docs"),
            target: PathBuf::from("/dst/docs"),
        });
        plan.push(Action::Ignore {
            path: rel("a.tmp"),
            is_dir: false,
        });
        plan.push(Action::RemoveDir {
            path: rel("old"),
            target: PathBuf::from("/dst/old"),
        });

        assert_eq!(plan.to_string(), "mkdir docs/\nignore a.tmp\nrmdir old/");
    }

    #[test]
    fn test_failures_recorded() {
        let mut plan = SyncPlan::new("/src", "/dst");
        plan.record_failure("secret", "permission denied");
        assert_eq!(plan.failures().len(), 1);
        assert_eq!(plan.failures()[0].path, "secret");
        assert!(plan.is_empty());
    }
}
