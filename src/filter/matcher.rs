//! Ordered ignore-rule evaluation.

use std::path::Path;

use super::path::RelativePath;
use super::rule::IgnoreRule;
use crate::{Error, Result};

/// Ordered set of ignore rules with last-match-wins evaluation.
///
/// Matching is a pure function of the rules and the input path; it never
/// touches the filesystem.
#[derive(Debug, Clone, Default)]
pub struct PathMatcher {
    rules: Vec<IgnoreRule>,
}

impl PathMatcher {
    /// A matcher that ignores nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile patterns in declaration order.
    ///
    /// Blank entries and `#` comments are skipped, exactly as in a rule file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for the first pattern that fails to compile.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matcher = Self::empty();
        for pattern in patterns {
            matcher.push_line(pattern.as_ref())?;
        }
        Ok(matcher)
    }

    /// Parse the contents of an ignore-rule file.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern is invalid.
    pub fn parse(text: &str) -> Result<Self> {
        Self::new(text.lines())
    }

    /// Load an ignore-rule file (UTF-8, one pattern per line).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read, or an
    /// invalid-pattern error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut matcher = Self::empty();
        matcher.extend_from_file(path)?;
        Ok(matcher)
    }

    /// Append the rules of an ignore-rule file after the existing ones.
    ///
    /// Returns the number of rules added.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or holds an invalid pattern.
    pub fn extend_from_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "failed to read ignore file '{}': {e}",
                path.display()
            ))
        })?;

        let before = self.rules.len();
        for line in text.lines() {
            self.push_line(line)?;
        }
        let added = self.rules.len() - before;

        tracing::debug!(path = %path.display(), rules = added, "Loaded ignore rules");
        Ok(added)
    }

    /// Add a pattern at the end unless an identical one is already declared.
    ///
    /// Returns `true` if the pattern was added. Blank input and `#` comments
    /// are not rules and are never added.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid.
    pub fn add_pattern(&mut self, pattern: &str) -> Result<bool> {
        let trimmed = pattern.trim();
        if !is_rule_line(trimmed) || self.rules.iter().any(|r| r.pattern() == trimmed) {
            return Ok(false);
        }
        let rule = IgnoreRule::parse(trimmed, self.rules.len())?;
        self.rules.push(rule);
        Ok(true)
    }

    /// Remove a declared pattern. Later rules keep their relative order.
    pub fn remove_pattern(&mut self, pattern: &str) -> bool {
        let trimmed = pattern.trim();
        let Some(idx) = self.rules.iter().position(|r| r.pattern() == trimmed) else {
            return false;
        };
        self.rules.remove(idx);
        for (order, rule) in self.rules.iter_mut().enumerate().skip(idx) {
            rule.set_order(order);
        }
        true
    }

    /// Patterns in declaration order.
    #[must_use]
    pub fn patterns(&self) -> Vec<&str> {
        self.rules.iter().map(IgnoreRule::pattern).collect()
    }

    #[must_use]
    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `path` is excluded.
    ///
    /// Every rule is consulted in declaration order; each matching rule sets
    /// the verdict (excluded for a normal rule, included for a negated one)
    /// and the verdict after the last rule is returned.
    #[must_use]
    pub fn matches(&self, path: &RelativePath, is_dir: bool) -> bool {
        self.rules.iter().fold(false, |verdict, rule| {
            if rule.is_match(path, is_dir) {
                !rule.is_negated()
            } else {
                verdict
            }
        })
    }

    /// The rule that decides the verdict for `path`, if any matches.
    #[must_use]
    pub fn deciding_rule(&self, path: &RelativePath, is_dir: bool) -> Option<&IgnoreRule> {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.is_match(path, is_dir))
    }

    /// String convenience over [`PathMatcher::matches`].
    ///
    /// # Errors
    ///
    /// Returns a validation error for absolute paths.
    pub fn is_ignored(&self, path: &str, is_dir: bool) -> Result<bool> {
        let path = RelativePath::new(path)?;
        Ok(self.matches(&path, is_dir))
    }

    /// Whether `path` or any of its ancestor directories is excluded.
    ///
    /// A tree walk never reaches entries below an excluded directory; this is
    /// the equivalent check for a single path seen out of context, such as a
    /// change notification.
    #[must_use]
    pub fn excludes(&self, path: &RelativePath, is_dir: bool) -> bool {
        if self.is_empty() || path.is_root() {
            return false;
        }
        path.ancestors().any(|ancestor| self.matches(&ancestor, true)) || self.matches(path, is_dir)
    }

    fn push_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if !is_rule_line(line) {
            return Ok(());
        }
        let rule = IgnoreRule::parse(line, self.rules.len())?;
        self.rules.push(rule);
        Ok(())
    }
}

fn is_rule_line(line: &str) -> bool {
    !line.is_empty() && !line.starts_with('#')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn rel(path: &str) -> RelativePath {
        RelativePath::new(path).unwrap()
    }

    #[test]
    fn test_empty_matcher_includes_everything() {
        let matcher = PathMatcher::empty();
        assert!(!matcher.matches(&rel("anything.tmp"), false));
        assert!(!matcher.matches(&rel("dir"), true));
    }

    #[test]
    fn test_negation_after_match() {
        let matcher = PathMatcher::new(["*.tmp", "temp/", "!keep.tmp"]).unwrap();

        assert!(!matcher.matches(&rel("keep.tmp"), false));
        assert!(matcher.matches(&rel("a.tmp"), false));
        assert!(matcher.matches(&rel("temp"), true));
        assert!(!matcher.matches(&rel("temp"), false));
        assert!(!matcher.matches(&rel("notes.txt"), false));
    }

    #[test]
    fn test_declaration_order_decides() {
        // negation declared first has nothing to override
        let matcher = PathMatcher::new(["!keep.tmp", "*.tmp"]).unwrap();
        assert!(matcher.matches(&rel("keep.tmp"), false));
    }

    #[test]
    fn test_later_match_re_excludes() {
        let matcher = PathMatcher::new(["*.log", "!important.log", "important.log"]).unwrap();
        assert!(matcher.matches(&rel("important.log"), false));

        let rule = matcher.deciding_rule(&rel("important.log"), false).unwrap();
        assert_eq!(rule.order(), 2);
    }

    #[test]
    fn test_directory_rule_then_wildcard_negation() {
        let matcher = PathMatcher::new(["build/", "!build"]).unwrap();
        assert!(!matcher.matches(&rel("build"), true));

        let matcher = PathMatcher::new(["!build", "build/"]).unwrap();
        assert!(matcher.matches(&rel("build"), true));
    }

    #[test]
    fn test_skips_comments_and_blank_lines() {
        let matcher = PathMatcher::parse("# comment\n\n*.bak\n   \n#*.txt\n").unwrap();
        assert_eq!(matcher.patterns(), vec!["*.bak"]);
        assert!(!matcher.matches(&rel("notes.txt"), false));
    }

    #[test]
    fn test_invalid_pattern_fails() {
        let err = PathMatcher::new(["*.tmp", "src/[a"]).unwrap_err();
        assert!(err.to_string().contains("src/[a"));
    }

    #[test]
    fn test_is_ignored_rejects_absolute() {
        let matcher = PathMatcher::new(["*.tmp"]).unwrap();
        assert!(matcher.is_ignored("/abs/a.tmp", false).is_err());
        assert!(matcher.is_ignored("sub\\a.tmp", false).unwrap());
    }

    #[test]
    fn test_excludes_checks_ancestors() {
        let matcher = PathMatcher::new(["temp/"]).unwrap();
        assert!(!matcher.matches(&rel("temp/file.txt"), false));
        assert!(matcher.excludes(&rel("temp/file.txt"), false));
        assert!(matcher.excludes(&rel("a/temp/deep/file.txt"), false));
        assert!(!matcher.excludes(&rel("src/file.txt"), false));
    }

    #[test]
    fn test_add_and_remove_pattern() {
        let mut matcher = PathMatcher::new(["*.tmp", "*.bak"]).unwrap();
        assert!(!matcher.add_pattern("*.tmp").unwrap());
        assert!(matcher.add_pattern("cache/").unwrap());
        assert!(!matcher.add_pattern("# cache/").unwrap());
        assert!(!matcher.add_pattern("   ").unwrap());
        assert!(!matcher.patterns().iter().any(|p| p.is_empty() || p.starts_with('#')));
        assert_eq!(matcher.len(), 3);

        assert!(matcher.remove_pattern("*.tmp"));
        assert!(!matcher.remove_pattern("*.tmp"));
        assert_eq!(matcher.patterns(), vec!["*.bak", "cache/"]);
        let orders: Vec<usize> = matcher.rules().iter().map(IgnoreRule::order).collect();
        assert_eq!(orders, vec![0, 1]);
    }

    #[test]
    fn test_from_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join(".syncignore");
        fs::write(&file, "# build outputs\ntarget/\n*.o\n!keep.o\n").unwrap();

        let matcher = PathMatcher::from_file(&file).unwrap();
        assert_eq!(matcher.len(), 3);
        assert!(matcher.matches(&rel("target"), true));
        assert!(matcher.matches(&rel("main.o"), false));
        assert!(!matcher.matches(&rel("keep.o"), false));
    }

    #[test]
    fn test_from_missing_file() {
        let err = PathMatcher::from_file("/nonexistent/.syncignore").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
