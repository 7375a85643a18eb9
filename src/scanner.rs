use crate::{
    file::{is_source_file, FileEntry},
    filter::ExclusionPatterns,
};
use std::path::{Path, PathBuf};
use tracing::{debug, error, trace, warn};
use walkdir::{DirEntry, WalkDir};

/// Why a path did not end up in the merge artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// File name matched an exclusion pattern
    ExcludedName {
        /// The matching pattern
        pattern: String,
    },

    /// Directory name matched an exclusion pattern; its subtree was not visited
    ExcludedDirectory {
        /// The matching pattern
        pattern: String,
    },

    /// File does not carry the source extension
    UnsupportedExtension,

    /// File is valid in none of the supported encodings
    Undecodable,

    /// Name is not valid UTF-8, so it can be neither matched nor named in the artifact
    Uninspectable,

    /// File could not be read
    Unreadable {
        /// Underlying error message
        message: String,
    },
}

/// A path that was looked at and left out, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPath {
    /// Path relative to the collection root, `/`-separated
    pub path: String,

    /// Why it was skipped
    pub reason: SkipReason,
}

/// Everything the collector found.
#[derive(Debug, Default, Clone)]
pub struct ScanReport {
    /// Eligible files, sorted by relative path
    pub entries: Vec<FileEntry>,

    /// Files and pruned directories that were left out
    pub skipped: Vec<SkippedPath>,

    /// Traversal errors encountered (each leaves its subtree empty)
    pub errors: usize,
}

impl ScanReport {
    /// Returns the skip reason recorded for a relative path, if any.
    #[must_use]
    pub fn skip_reason(&self, path: &str) -> Option<&SkipReason> {
        self.skipped
            .iter()
            .find(|s| s.path == path)
            .map(|s| &s.reason)
    }
}

/// Walks a directory tree and collects eligible source files.
pub struct Collector<'a> {
    root: PathBuf,
    patterns: &'a ExclusionPatterns,
}

impl<'a> Collector<'a> {
    /// Creates a collector over `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, patterns: &'a ExclusionPatterns) -> Self {
        Self {
            root: root.into(),
            patterns,
        }
    }

    /// Scans the root directory.
    ///
    /// Directories whose name matches a pattern are pruned before they are
    /// entered. The root itself is always entered. Traversal errors are
    /// logged and counted; the affected subtree contributes no files.
    pub fn scan(&self) -> ScanReport {
        let mut report = ScanReport::default();
        let mut pruned: Vec<SkippedPath> = Vec::new();

        debug!("Starting scan of {}", self.root.display());

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                if entry.file_name().to_str().is_none() {
                    pruned.push(self.uninspectable(entry.path()));
                    return false;
                }
                match self.patterns.matching_pattern(entry.file_name()) {
                    Some(pattern) => {
                        let path = self.relative_path(entry.path());
                        debug!("Pruning directory {} (pattern '{}')", path, pattern);
                        pruned.push(SkippedPath {
                            path,
                            reason: SkipReason::ExcludedDirectory {
                                pattern: pattern.to_string(),
                            },
                        });
                        false
                    }
                    None => true,
                }
            });

        for result in walker {
            match result {
                Ok(entry) if !entry.file_type().is_dir() => self.process_entry(&entry, &mut report),
                Ok(_) => {}
                Err(e) => {
                    let location = e
                        .path()
                        .map_or_else(|| self.root.display().to_string(), |p| p.display().to_string());
                    warn!("Skipping unreadable location {}: {}", location, e);
                    report.errors += 1;
                }
            }
        }

        report.skipped.extend(pruned);

        // Sort for deterministic ordering
        report
            .entries
            .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        report.entries.dedup_by(|a, b| {
            let duplicate = a.relative_path == b.relative_path;
            if duplicate {
                warn!(
                    "Dropping {} as a duplicate of {}",
                    a.absolute_path.display(),
                    b.absolute_path.display()
                );
            }
            duplicate
        });
        report.skipped.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(
            "Scan complete: {} eligible, {} skipped, {} errors",
            report.entries.len(),
            report.skipped.len(),
            report.errors
        );

        report
    }

    /// Evaluates one non-directory entry.
    fn process_entry(&self, entry: &DirEntry, report: &mut ScanReport) {
        let path = entry.path();
        let relative_path = self.relative_path(path);

        trace!("Evaluating file: {}", relative_path);

        if entry.file_name().to_str().is_none() {
            report.skipped.push(self.uninspectable(path));
            return;
        }

        if let Some(pattern) = self.patterns.matching_pattern(entry.file_name()) {
            report.skipped.push(SkippedPath {
                path: relative_path,
                reason: SkipReason::ExcludedName {
                    pattern: pattern.to_string(),
                },
            });
            return;
        }

        if !is_source_file(path) {
            report.skipped.push(SkippedPath {
                path: relative_path,
                reason: SkipReason::UnsupportedExtension,
            });
            return;
        }

        report
            .entries
            .push(FileEntry::new(relative_path, path.to_path_buf()));
    }

    /// Logs and records a path whose name is not valid UTF-8.
    fn uninspectable(&self, path: &Path) -> SkippedPath {
        error!("Cannot inspect non-UTF-8 name {}; skipping it", path.display());
        SkippedPath {
            path: self.relative_path(path),
            reason: SkipReason::Uninspectable,
        }
    }

    /// Computes the `/`-separated path of `path` relative to the root.
    fn relative_path(&self, path: &Path) -> String {
        let relative = pathdiff::diff_paths(path, &self.root).unwrap_or_else(|| path.to_path_buf());
        normalize_separators(&relative)
    }
}

/// Joins the components of a relative path with `/`.
pub(crate) fn normalize_separators(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Collects the eligible source files under `root`, sorted by relative path.
#[must_use]
pub fn collect(root: &Path, patterns: &ExclusionPatterns) -> Vec<FileEntry> {
    Collector::new(root, patterns).scan().entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn patterns(list: &[&str]) -> ExclusionPatterns {
        ExclusionPatterns::new(list).unwrap()
    }

    fn relative_paths(entries: &[FileEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.relative_path.as_str()).collect()
    }

    #[test]
    fn test_collect_scenario_with_pruned_env() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.py").write_str("print('a')").unwrap();
        temp.child("b.txt").write_str("notes").unwrap();
        temp.child("sub/c.py").write_str("print('c')").unwrap();
        temp.child("myenv/d.py").write_str("print('d')").unwrap();

        let set = patterns(&["myenv"]);
        let report = Collector::new(temp.path(), &set).scan();

        assert_eq!(relative_paths(&report.entries), ["a.py", "sub/c.py"]);
        assert_eq!(report.entries[0].absolute_path, temp.path().join("a.py"));
        assert_eq!(
            report.entries[1].absolute_path,
            temp.path().join("sub").join("c.py")
        );
        assert_eq!(
            report.skip_reason("b.txt"),
            Some(&SkipReason::UnsupportedExtension)
        );
        assert_eq!(
            report.skip_reason("myenv"),
            Some(&SkipReason::ExcludedDirectory {
                pattern: "myenv".to_string()
            })
        );
        // Pruned subtrees are never visited, so their files have no outcome at all
        assert_eq!(report.skip_reason("myenv/d.py"), None);
        assert_eq!(report.errors, 0);
    }

    #[test]
    fn test_prune_applies_at_any_depth() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("pkg/core.py").write_str("").unwrap();
        temp.child("pkg/__pycache__/core.py").write_str("").unwrap();
        temp.child("pkg/deep/er/cache_dir/x.py").write_str("").unwrap();
        temp.child("pkg/deep/er/keep.py").write_str("").unwrap();

        let set = patterns(&["*__pycache__*", "cache_dir"]);
        let files = collect(temp.path(), &set);

        assert_eq!(relative_paths(&files), ["pkg/core.py", "pkg/deep/er/keep.py"]);
    }

    #[test]
    fn test_excluded_file_names_are_skipped_with_pattern() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.py").write_str("").unwrap();
        temp.child("conftest.py").write_str("").unwrap();
        temp.child("tools/conftest.py").write_str("").unwrap();

        let set = patterns(&["conf*.py"]);
        let report = Collector::new(temp.path(), &set).scan();

        assert_eq!(relative_paths(&report.entries), ["main.py"]);
        assert_eq!(
            report.skip_reason("tools/conftest.py"),
            Some(&SkipReason::ExcludedName {
                pattern: "conf*.py".to_string()
            })
        );
    }

    #[test]
    fn test_output_is_sorted_and_unique() {
        let temp = assert_fs::TempDir::new().unwrap();
        for name in ["zeta.py", "Alpha.py", "alpha.py", "b/a.py", "a/z.py", "a/b/c.py", "a_b.py"] {
            temp.child(name).write_str("").unwrap();
        }

        let files = collect(temp.path(), &ExclusionPatterns::empty());
        let paths = relative_paths(&files);

        let mut sorted = paths.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(paths, sorted);
        assert_eq!(paths.len(), 7);
        // Case-sensitive byte order: uppercase sorts first
        assert_eq!(paths[0], "Alpha.py");
    }

    #[test]
    fn test_root_name_matching_pattern_is_still_scanned() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("myenv/app.py").write_str("").unwrap();

        let set = patterns(&["myenv"]);
        let files = collect(&temp.path().join("myenv"), &set);

        assert_eq!(relative_paths(&files), ["app.py"]);
    }

    #[test]
    fn test_empty_directory_yields_nothing() {
        let temp = assert_fs::TempDir::new().unwrap();
        let report = Collector::new(temp.path(), &ExclusionPatterns::empty()).scan();

        assert!(report.entries.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_missing_root_is_a_traversal_error() {
        let temp = assert_fs::TempDir::new().unwrap();
        let report = Collector::new(temp.path().join("gone"), &ExclusionPatterns::empty()).scan();

        assert!(report.entries.is_empty());
        assert_eq!(report.errors, 1);
    }

    // Linux file systems accept arbitrary bytes in names; others may reject them
    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names_are_skipped_not_merged() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("ok.py").write_str("").unwrap();
        std::fs::write(temp.path().join(OsStr::from_bytes(b"\xff.py")), "a = 1").unwrap();
        std::fs::write(temp.path().join(OsStr::from_bytes(b"\xfe.py")), "b = 2").unwrap();
        let odd_dir = temp.path().join(OsStr::from_bytes(b"pkg\xff"));
        std::fs::create_dir(&odd_dir).unwrap();
        std::fs::write(odd_dir.join("inner.py"), "").unwrap();

        let set = patterns(&["nomatch"]);
        let report = Collector::new(temp.path(), &set).scan();

        assert_eq!(relative_paths(&report.entries), ["ok.py"]);
        let uninspectable = report
            .skipped
            .iter()
            .filter(|s| s.reason == SkipReason::Uninspectable)
            .count();
        assert_eq!(uninspectable, 3);
        assert!(set.is_excluded(&temp.path().join(OsStr::from_bytes(b"\xff.py"))));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subtree_is_counted_and_siblings_survive() {
        use std::os::unix::fs::PermissionsExt;

        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.py").write_str("").unwrap();
        temp.child("locked/hidden.py").write_str("").unwrap();
        temp.child("open/visible.py").write_str("").unwrap();

        let locked = temp.path().join("locked");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        // Privileged users can still list the directory
        let listable = std::fs::read_dir(&locked).is_ok();

        let report = Collector::new(temp.path(), &ExclusionPatterns::empty()).scan();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        if listable {
            return;
        }
        assert_eq!(relative_paths(&report.entries), ["a.py", "open/visible.py"]);
        assert_eq!(report.errors, 1);
    }

    #[test]
    fn test_normalize_separators() {
        let path: PathBuf = ["pkg", "sub", "mod.py"].iter().collect();
        assert_eq!(normalize_separators(&path), "pkg/sub/mod.py");
    }
}
