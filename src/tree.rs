//! Directory structure summary embedded at the top of the merge artifact.
//!
//! The summary is for human orientation only and is intentionally shallow:
//! root-level files and directories, plus the source files directly inside
//! each directory. The collector remains the sole authority on what is merged.

use crate::{file::is_source_file, filter::ExclusionPatterns};
use std::fs;
use std::io;
use std::path::Path;
use tracing::error;

/// Heading of the structure block.
pub const TREE_HEADING: &str = "# Directory Structure";

/// Placeholder written in place of an excluded directory's contents.
pub const SKIPPED_MARKER: &str = "(skipped directory contents)";

const SEPARATOR_WIDTH: usize = 80;
const INDENT: &str = "    ";

/// Renders the directory structure block for `root`.
///
/// Never fails: if the root cannot be listed the block contains an
/// explanatory placeholder, and an unreadable subdirectory gets a
/// placeholder line of its own.
#[must_use]
pub fn render_tree(root: &Path, patterns: &ExclusionPatterns) -> String {
    let body = match render_listing(root, patterns) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to list {} for the directory structure: {}", root.display(), e);
            format!("(directory structure unavailable: {})\n", e)
        }
    };

    format!(
        "{}\n\n{}\n{}\n",
        TREE_HEADING,
        body,
        "=".repeat(SEPARATOR_WIDTH)
    )
}

fn render_listing(root: &Path, patterns: &ExclusionPatterns) -> io::Result<String> {
    let root_name = root
        .file_name()
        .map_or_else(|| root.display().to_string(), |n| n.to_string_lossy().into_owned());

    let mut source_files = Vec::new();
    let mut other_files = Vec::new();
    let mut directories = Vec::new();

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy().into_owned();

        // metadata() follows symlinks, so linked files and directories land in their target's group
        match fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => {
                let excluded = patterns.is_excluded(Path::new(&file_name));
                directories.push((name, path, excluded));
            }
            Ok(meta) if meta.is_file() => {
                if is_source_file(&path) {
                    source_files.push(name);
                } else {
                    other_files.push(name);
                }
            }
            _ => {}
        }
    }

    source_files.sort();
    other_files.sort();
    directories.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = format!("{}/\n", root_name);

    for name in source_files.iter().chain(&other_files) {
        out.push_str(&format!("{INDENT}{name}\n"));
    }

    for (name, dir, excluded) in &directories {
        out.push_str(&format!("{INDENT}{name}/\n"));

        if *excluded {
            out.push_str(&format!("{INDENT}{INDENT}{SKIPPED_MARKER}\n"));
            continue;
        }

        match direct_source_files(dir, patterns) {
            Ok(files) => {
                for file in files {
                    out.push_str(&format!("{INDENT}{INDENT}{file}\n"));
                }
            }
            Err(e) => {
                error!("Failed to list {}: {}", dir.display(), e);
                out.push_str(&format!("{INDENT}{INDENT}(unreadable directory contents: {e})\n"));
            }
        }
    }

    Ok(out)
}

/// Lists the source files directly inside `dir`, sorted, excluding matches.
fn direct_source_files(dir: &Path, patterns: &ExclusionPatterns) -> io::Result<Vec<String>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_file = fs::metadata(&path).is_ok_and(|m| m.is_file());

        if is_file && is_source_file(&path) && !patterns.is_excluded(Path::new(&entry.file_name())) {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn root_name(temp: &assert_fs::TempDir) -> String {
        temp.path().file_name().unwrap().to_string_lossy().into_owned()
    }

    #[test]
    fn test_render_scenario() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("b.txt").write_str("").unwrap();
        temp.child("a.py").write_str("").unwrap();
        temp.child("README.md").write_str("").unwrap();
        temp.child("sub/c.py").write_str("").unwrap();
        temp.child("sub/notes.txt").write_str("").unwrap();
        temp.child("sub/nested/deep.py").write_str("").unwrap();
        temp.child("myenv/d.py").write_str("").unwrap();

        let set = ExclusionPatterns::new(["myenv"]).unwrap();
        let tree = render_tree(temp.path(), &set);

        let expected = format!(
            "# Directory Structure\n\n\
             {}/\n\
             \x20   a.py\n\
             \x20   README.md\n\
             \x20   b.txt\n\
             \x20   myenv/\n\
             \x20       (skipped directory contents)\n\
             \x20   sub/\n\
             \x20       c.py\n\
             \n{}\n",
            root_name(&temp),
            "=".repeat(80)
        );
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_excluded_children_are_hidden() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("pkg/keep.py").write_str("").unwrap();
        temp.child("pkg/test_skip.py").write_str("").unwrap();

        let set = ExclusionPatterns::new(["test_*"]).unwrap();
        let tree = render_tree(temp.path(), &set);

        assert!(tree.contains("        keep.py\n"));
        assert!(!tree.contains("test_skip.py"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let temp = assert_fs::TempDir::new().unwrap();
        for name in ["z.py", "m.py", "a.py", "dir_b/x.py", "dir_a/y.py"] {
            temp.child(name).write_str("").unwrap();
        }

        let set = ExclusionPatterns::empty();
        let first = render_tree(temp.path(), &set);
        let second = render_tree(temp.path(), &set);

        assert_eq!(first, second);
        let a = first.find("a.py").unwrap();
        let m = first.find("m.py").unwrap();
        let dir_a = first.find("dir_a/").unwrap();
        let dir_b = first.find("dir_b/").unwrap();
        assert!(a < m && m < dir_a && dir_a < dir_b);
    }

    #[test]
    fn test_excluded_ancestor_of_root_does_not_hide_subdirectories() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("venv/project/pkg/mod.py").write_str("").unwrap();

        let set = ExclusionPatterns::new(["venv"]).unwrap();
        let tree = render_tree(&temp.path().join("venv").join("project"), &set);

        assert!(tree.contains("    pkg/\n        mod.py\n"));
        assert!(!tree.contains(SKIPPED_MARKER));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_degrades_to_placeholder_line() {
        use std::os::unix::fs::PermissionsExt;

        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("locked/hidden.py").write_str("").unwrap();
        temp.child("open/visible.py").write_str("").unwrap();

        let locked = temp.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // Privileged users can still list the directory
        let listable = fs::read_dir(&locked).is_ok();

        let tree = render_tree(temp.path(), &ExclusionPatterns::empty());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if listable {
            return;
        }
        assert!(tree.contains("    locked/\n        (unreadable directory contents: "));
        assert!(!tree.contains("hidden.py"));
        assert!(tree.contains("    open/\n        visible.py\n"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_directory_is_shown_as_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = assert_fs::TempDir::new().unwrap();
        let odd_dir = temp.path().join(OsStr::from_bytes(b"pkg\xff"));
        fs::create_dir(&odd_dir).unwrap();
        fs::write(odd_dir.join("inner.py"), "").unwrap();

        let set = ExclusionPatterns::new(["nomatch"]).unwrap();
        let tree = render_tree(temp.path(), &set);

        assert!(tree.contains(&format!("    pkg\u{FFFD}/\n        {SKIPPED_MARKER}\n")));
        assert!(!tree.contains("inner.py"));
    }

    #[test]
    fn test_unreadable_root_degrades_to_placeholder() {
        let temp = assert_fs::TempDir::new().unwrap();
        let tree = render_tree(&temp.path().join("missing"), &ExclusionPatterns::empty());

        assert!(tree.starts_with(TREE_HEADING));
        assert!(tree.contains("(directory structure unavailable:"));
        assert!(tree.ends_with(&format!("{}\n", "=".repeat(80))));
    }
}
