//! Exclusion pattern matching.
//!
//! Patterns are shell globs matched against a single path segment at a time,
//! so `myenv` prunes every directory named `myenv` wherever it sits and
//! `*.log` drops every log file, without callers having to write `**/` prefixes.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::ffi::OsStr;
use std::path::{Component, Path};
use tracing::error;

/// Patterns used when the settings source does not provide any.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "myenv",
    "venv",
    ".venv",
    "*__pycache__*",
    "sample_file",
    "*.log",
];

/// Ordered set of glob patterns matched against individual path segments.
#[derive(Debug, Clone)]
pub struct ExclusionPatterns {
    patterns: Vec<String>,
    set: GlobSet,
}

impl ExclusionPatterns {
    /// Compiles the given patterns.
    ///
    /// Surrounding whitespace is trimmed and empty patterns are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for a pattern that is not valid glob syntax.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            let glob =
                Glob::new(pattern).map_err(|e| Error::invalid_pattern(pattern, e.kind().to_string()))?;
            builder.add(glob);
        }

        let set = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {}", e)))?;

        Ok(Self { patterns, set })
    }

    /// Parses a comma-separated pattern list such as `myenv, *.log`.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern is invalid.
    pub fn from_comma_separated(list: &str) -> Result<Self> {
        Self::new(list.split(','))
    }

    /// A set that excludes nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    /// The default exclusion set.
    ///
    /// # Panics
    ///
    /// Never: the default patterns are valid globs.
    #[must_use]
    pub fn defaults() -> Self {
        Self::new(DEFAULT_EXCLUSIONS).expect("default exclusion patterns are valid globs")
    }

    /// The patterns in the order they were given.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns true when no patterns are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns the first pattern matching a single segment, if any.
    #[must_use]
    pub fn matching_pattern(&self, name: &OsStr) -> Option<&str> {
        if self.is_empty() {
            return None;
        }
        self.set
            .matches(Path::new(name))
            .into_iter()
            .min()
            .map(|index| self.patterns[index].as_str())
    }

    /// Returns true if a single segment matches any pattern.
    #[must_use]
    pub fn matches_name(&self, name: &OsStr) -> bool {
        !self.is_empty() && self.set.is_match(Path::new(name))
    }

    /// Returns true if any segment of `path` matches any pattern.
    ///
    /// Only normal components are consulted, so the path may be absolute or
    /// relative. A segment that is not valid UTF-8 cannot be inspected and
    /// excludes the path.
    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.is_empty() {
            return false;
        }

        for component in path.components() {
            let Component::Normal(segment) = component else {
                continue;
            };

            if segment.to_str().is_none() {
                error!(
                    "Cannot inspect path segment {:?} of {}; excluding path",
                    segment,
                    path.display()
                );
                return true;
            }

            if self.set.is_match(Path::new(segment)) {
                return true;
            }
        }

        path.file_name().is_some_and(|name| self.matches_name(name))
    }
}

impl Default for ExclusionPatterns {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Returns true if `path` is excluded by `patterns`.
///
/// See [`ExclusionPatterns::is_excluded`].
#[must_use]
pub fn is_excluded(path: &Path, patterns: &ExclusionPatterns) -> bool {
    patterns.is_excluded(path)
}
