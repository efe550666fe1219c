//! Slash-normalized paths relative to a synchronization root.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

const ROOT: &str = ".";

/// A path relative to a source or target root, always `/`-separated.
///
/// The root itself is represented as `"."`. The text form is lossy for names
/// that are not valid UTF-8 and is used for matching and reporting only;
/// filesystem paths are rebuilt from the original components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath {
    text: String,
    native: PathBuf,
}

impl RelativePath {
    /// Parse and normalize a relative path.
    ///
    /// Backslashes become slashes, `./` and empty segments are dropped.
    ///
    /// # Errors
    ///
    /// Returns a validation error for absolute paths and for paths that
    /// climb out of the root with `..`.
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let raw = path.as_ref().replace('\\', "/");

        if raw.starts_with('/') || has_drive_prefix(&raw) || Path::new(&raw).is_absolute() {
            return Err(Error::validation(format!(
                "expected a path relative to the sync root, got '{raw}'"
            )));
        }

        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    return Err(Error::validation(format!(
                        "relative path escapes the sync root: '{raw}'"
                    )))
                }
                other => segments.push(OsStr::new(other)),
            }
        }

        Ok(Self::from_segments(&segments))
    }

    /// The root of the tree.
    #[must_use]
    pub fn root() -> Self {
        Self {
            text: ROOT.to_string(),
            native: PathBuf::new(),
        }
    }

    /// Build the relative path of `path` below `root`.
    ///
    /// Returns `None` when `path` is not inside `root`.
    #[must_use]
    pub fn from_root(root: &Path, path: &Path) -> Option<Self> {
        let stripped = path.strip_prefix(root).ok()?;
        let mut segments = Vec::new();
        for component in stripped.components() {
            match component {
                Component::Normal(name) => segments.push(name),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(Self::from_segments(&segments))
    }

    fn from_segments(segments: &[&OsStr]) -> Self {
        if segments.is_empty() {
            return Self::root();
        }
        let text = segments
            .iter()
            .map(|name| name.to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Self {
            text,
            native: segments.iter().collect(),
        }
    }

    /// Whether this is the root of the tree.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.native.as_os_str().is_empty()
    }

    /// The normalized string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Append a single entry name.
    #[must_use]
    pub fn join(&self, name: &str) -> Self {
        if self.is_root() {
            Self::from_segments(&[OsStr::new(name)])
        } else {
            Self {
                text: format!("{}/{name}", self.text),
                native: self.native.join(name),
            }
        }
    }

    /// Last segment of the path (`"."` for the root).
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.text.rsplit('/').next().unwrap_or(&self.text)
    }

    /// Proper ancestors, outermost first (`a/b/c` yields `a`, `a/b`).
    pub fn ancestors(&self) -> impl Iterator<Item = Self> + '_ {
        let segments: Vec<&OsStr> = self.native.iter().collect();
        (1..segments.len()).map(move |len| Self::from_segments(&segments[..len]))
    }

    /// Resolve against a root directory.
    #[must_use]
    pub fn to_native(&self, root: &Path) -> PathBuf {
        if self.is_root() {
            root.to_path_buf()
        } else {
            root.join(&self.native)
        }
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// `C:`-style prefixes are absolute on Windows even when parsed elsewhere.
fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_separators() {
        let path = RelativePath::new("src\\utils\\mod.rs").unwrap();
        assert_eq!(path.as_str(), "src/utils/mod.rs");
    }

    #[test]
    fn test_strips_dot_and_empty_segments() {
        let path = RelativePath::new("./a//b/./c/").unwrap();
        assert_eq!(path.as_str(), "a/b/c");
    }

    #[test]
    fn test_rejects_absolute() {
        assert!(RelativePath::new("/etc/passwd").is_err());
        assert!(RelativePath::new("C:\\Users").is_err());
        assert!(RelativePath::new("\\share\\x").is_err());
    }

    #[test]
    fn test_rejects_parent_escape() {
        let err = RelativePath::new("a/../../b").unwrap_err();
        assert!(err.to_string().contains("escapes"));
    }

    #[test]
    fn test_root() {
        assert!(RelativePath::new("").unwrap().is_root());
        assert!(RelativePath::new("./").unwrap().is_root());
        assert_eq!(RelativePath::root().join("a.txt").as_str(), "a.txt");
    }

    #[test]
    fn test_join_and_file_name() {
        let path = RelativePath::new("logs").unwrap().join("app.log");
        assert_eq!(path.as_str(), "logs/app.log");
        assert_eq!(path.file_name(), "app.log");
    }

    #[test]
    fn test_ancestors() {
        let path = RelativePath::new("a/b/c.txt").unwrap();
        let ancestors: Vec<String> = path.ancestors().map(|p| p.to_string()).collect();
        assert_eq!(ancestors, vec!["a", "a/b"]);
        assert_eq!(RelativePath::new("top").unwrap().ancestors().count(), 0);
    }

    #[test]
    fn test_from_root() {
        let root = Path::new("/data/src");
        let rel = RelativePath::from_root(root, Path::new("/data/src/a/b.txt")).unwrap();
        assert_eq!(rel.as_str(), "a/b.txt");
        assert!(RelativePath::from_root(root, root).unwrap().is_root());
        assert!(RelativePath::from_root(root, Path::new("/other/b.txt")).is_none());
    }

    #[test]
    fn test_to_native() {
        let rel = RelativePath::new("a/b.txt").unwrap();
        assert_eq!(
            rel.to_native(Path::new("/target")),
            Path::new("/target").join("a").join("b.txt")
        );
        assert_eq!(
            RelativePath::root().to_native(Path::new("/target")),
            PathBuf::from("/target")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_keeps_native_bytes() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let name = OsString::from_vec(b"bad\xffname.txt".to_vec());
        let root = Path::new("/data/src");
        let rel = RelativePath::from_root(root, &root.join("dir").join(&name)).unwrap();

        assert_eq!(rel.as_str(), "dir/bad\u{FFFD}name.txt");
        assert_eq!(
            rel.to_native(Path::new("/target")),
            Path::new("/target").join("dir").join(&name)
        );
        assert_eq!(rel.ancestors().next().unwrap().as_str(), "dir");
    }

    #[cfg(unix)]
    #[test]
    fn test_distinct_non_utf8_names_stay_distinct() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let root = Path::new("/data");
        let a = OsString::from_vec(b"x\xfe".to_vec());
        let b = OsString::from_vec(b"x\xff".to_vec());
        let rel_a = RelativePath::from_root(root, &root.join(a)).unwrap();
        let rel_b = RelativePath::from_root(root, &root.join(b)).unwrap();

        assert_eq!(rel_a.as_str(), rel_b.as_str());
        assert_ne!(rel_a, rel_b);
    }
}
