//! Change events and their normalization from raw notifications.

#![allow(clippy::missing_const_for_fn)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};

use crate::filter::{PathMatcher, RelativePath};

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Moved,
}

/// A single change below a watched root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Absolute path as reported by the OS.
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub is_dir: bool,
}

impl ChangeEvent {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind, is_dir: bool) -> Self {
        Self {
            path: path.into(),
            kind,
            is_dir,
        }
    }

    /// Whether the final path component starts with a dot.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'))
    }
}

/// What a change source hands to its sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// A specific path changed.
    Changed(ChangeEvent),
    /// Something may have changed anywhere; re-check the whole tree.
    Rescan,
}

/// Turn one raw notification into zero or more change events.
///
/// Access events carry no change and yield nothing. A rename reported with
/// both ends yields a `Moved` event for each path.
#[must_use]
pub fn normalize(event: &Event) -> Vec<ChangeEvent> {
    let kind = match event.kind {
        EventKind::Access(_) => return Vec::new(),
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Moved,
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => ChangeKind::Modified,
    };

    if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = event.kind {
        if event.paths.len() == 2 {
            return event
                .paths
                .iter()
                .map(|p| ChangeEvent::new(p.clone(), ChangeKind::Moved, p.is_dir()))
                .collect();
        }
    }

    event
        .paths
        .iter()
        .map(|p| {
            let is_dir = match event.kind {
                EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => {
                    true
                }
                _ => p.is_dir(),
            };
            ChangeEvent::new(p.clone(), kind, is_dir)
        })
        .collect()
}

/// Drops events the coordinator should never see.
#[derive(Debug, Clone)]
pub struct EventFilter {
    root: PathBuf,
    matcher: Arc<PathMatcher>,
}

impl EventFilter {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, matcher: Arc<PathMatcher>) -> Self {
        Self {
            root: root.into(),
            matcher,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `event` should be passed on.
    ///
    /// Rejected: directory creation (a file event inside it follows), hidden
    /// entries, paths outside the root and paths the matcher excludes.
    #[must_use]
    pub fn admit(&self, event: &ChangeEvent) -> bool {
        if event.kind == ChangeKind::Created && event.is_dir {
            return false;
        }
        if event.is_hidden() {
            return false;
        }

        let Some(rel) = RelativePath::from_root(&self.root, &event.path) else {
            return false;
        };
        if rel.is_root() {
            return true;
        }

        !self.matcher.excludes(&rel, event.is_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::DataChange;

    fn filter(patterns: &[&str]) -> EventFilter {
        EventFilter::new(
            "/watched",
            Arc::new(PathMatcher::new(patterns.iter().copied()).unwrap()),
        )
    }

    #[test]
    fn test_normalize_kinds() {
        let created = Event::new(EventKind::Create(CreateKind::File)).add_path("/w/a.txt".into());
        assert_eq!(normalize(&created)[0].kind, ChangeKind::Created);

        let folder = Event::new(EventKind::Create(CreateKind::Folder)).add_path("/w/docs".into());
        assert!(normalize(&folder)[0].is_dir);

        let modified = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path("/w/a.txt".into());
        assert_eq!(normalize(&modified)[0].kind, ChangeKind::Modified);

        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path("/w/a.txt".into());
        assert_eq!(normalize(&removed)[0].kind, ChangeKind::Deleted);

        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path("/w/a.txt".into());
        assert!(normalize(&access).is_empty());
    }

    #[test]
    fn test_normalize_rename_both() {
        let rename = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path("/w/old.txt".into())
            .add_path("/w/new.txt".into());

        let events = normalize(&rename);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == ChangeKind::Moved));
        assert_eq!(events[0].path, PathBuf::from("/w/old.txt"));
        assert_eq!(events[1].path, PathBuf::from("/w/new.txt"));
    }

    #[test]
    fn test_filter_drops_directory_creation() {
        let filter = filter(&[]);
        assert!(!filter.admit(&ChangeEvent::new("/watched/docs", ChangeKind::Created, true)));
        assert!(filter.admit(&ChangeEvent::new("/watched/docs", ChangeKind::Deleted, true)));
        assert!(filter.admit(&ChangeEvent::new("/watched/docs/a.md", ChangeKind::Created, false)));
    }

    #[test]
    fn test_filter_drops_hidden_and_outside() {
        let filter = filter(&[]);
        assert!(!filter.admit(&ChangeEvent::new("/watched/.swp", ChangeKind::Modified, false)));
        assert!(!filter.admit(&ChangeEvent::new("/elsewhere/a.txt", ChangeKind::Modified, false)));
    }

    #[test]
    fn test_filter_applies_matcher_to_ancestors() {
        let filter = filter(&["*.tmp", "build/"]);
        assert!(!filter.admit(&ChangeEvent::new("/watched/a.tmp", ChangeKind::Modified, false)));
        assert!(!filter.admit(&ChangeEvent::new(
            "/watched/build/out/main.o",
            ChangeKind::Modified,
            false
        )));
        assert!(filter.admit(&ChangeEvent::new("/watched/src/main.rs", ChangeKind::Modified, false)));
    }
}
