//! Transient tree entries produced while walking source and target.

use std::fs::{self, File, Metadata};
use std::io;
use std::path::Path;
use std::time::SystemTime;

use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::filter::RelativePath;

/// File or directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A stat snapshot of one entry below a root.
#[derive(Debug, Clone)]
pub struct TreeEntry {
    pub path: RelativePath,
    pub kind: EntryKind,
    pub size: u64,
    pub modified: SystemTime,
    pub digest: Option<String>,
}

impl TreeEntry {
    /// Build an entry from already-read metadata.
    #[must_use]
    pub fn from_metadata(path: RelativePath, metadata: &Metadata) -> Self {
        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        Self {
            path,
            kind,
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            digest: None,
        }
    }

    /// Stat `path` below `root`, following symlinks.
    ///
    /// Returns `Ok(None)` when nothing exists there.
    ///
    /// # Errors
    ///
    /// Returns the underlying error for anything other than a missing entry.
    pub fn stat(root: &Path, path: RelativePath) -> io::Result<Option<Self>> {
        match fs::metadata(path.to_native(root)) {
            Ok(metadata) => Ok(Some(Self::from_metadata(path, &metadata))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Compute and cache the content digest of a file entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn digest(&mut self, root: &Path) -> io::Result<&str> {
        if self.digest.is_none() {
            self.digest = Some(file_digest(&self.path.to_native(root))?);
        }
        Ok(self.digest.as_deref().unwrap_or_default())
    }

    /// Strictly newer modification time than `other`.
    #[must_use]
    pub fn is_newer_than(&self, other: &Self) -> bool {
        self.modified > other.modified
    }
}

/// Compute the blake3 digest of a file, streaming its content.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn file_digest(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}
