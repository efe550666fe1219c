//! Ignore rules with gitignore-like syntax.
//!
//! This module provides:
//! - Relative path normalization for matching
//! - Single compiled rules (`*`, `?`, `**`, `!` negation, `dir/` anchors)
//! - Ordered, last-match-wins rule sets loaded from lists or rule files

mod matcher;
mod path;
mod rule;

pub use matcher::PathMatcher;
pub use path::RelativePath;
pub use rule::IgnoreRule;
