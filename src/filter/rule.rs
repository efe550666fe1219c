//! A single compiled ignore rule.

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use super::path::RelativePath;
use crate::{Error, Result};

/// One line of an ignore-rule set.
///
/// The leading `!` and trailing `/` are parsed here so the negation and the
/// directory-only anchor are explicit; the remaining glob body is compiled
/// with gitignore syntax (`*`, `?`, `**`, character classes).
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    pattern: String,
    glob: String,
    negated: bool,
    directory_only: bool,
    order: usize,
    compiled: Gitignore,
}

impl IgnoreRule {
    /// Compile a pattern declared at position `order`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for an empty body or a glob that
    /// does not compile.
    pub fn parse(pattern: &str, order: usize) -> Result<Self> {
        let trimmed = pattern.trim();
        let (negated, rest) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (directory_only, glob) = match rest.strip_suffix('/') {
            Some(body) => (true, body),
            None => (false, rest),
        };

        if glob.is_empty() {
            return Err(Error::invalid_pattern(trimmed, "pattern has no glob body"));
        }

        let line = if directory_only {
            format!("{glob}/")
        } else {
            glob.to_string()
        };

        let mut builder = GitignoreBuilder::new(".");
        builder
            .add_line(None, &line)
            .map_err(|e| Error::invalid_pattern(trimmed, e.to_string()))?;
        let compiled = builder
            .build()
            .map_err(|e| Error::invalid_pattern(trimmed, e.to_string()))?;

        Ok(Self {
            pattern: trimmed.to_string(),
            glob: glob.to_string(),
            negated,
            directory_only,
            order,
            compiled,
        })
    }

    /// Check whether this rule's glob matches the path, ignoring negation.
    #[must_use]
    pub fn is_match(&self, path: &RelativePath, is_dir: bool) -> bool {
        if self.directory_only && !is_dir {
            return false;
        }
        !self.compiled.matched(path.as_str(), is_dir).is_none()
    }

    /// The pattern as declared.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The glob body without `!` and trailing `/`.
    #[must_use]
    pub fn glob(&self) -> &str {
        &self.glob
    }

    #[must_use]
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    #[must_use]
    pub fn is_directory_only(&self) -> bool {
        self.directory_only
    }

    /// Declaration index within the owning rule set.
    #[must_use]
    pub fn order(&self) -> usize {
        self.order
    }

    pub(super) fn set_order(&mut self, order: usize) {
        self.order = order;
    }
}
