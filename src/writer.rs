use crate::{
    error::{Error, Result},
    file::{read_text, FileEntry, TextEncoding},
    scanner::{SkipReason, SkippedPath},
};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, warn};

/// First line of every merge artifact.
pub const MERGE_TITLE: &str = "# Merged Python Files";

/// Prefix of the header line naming a file inside its block.
pub const FILE_HEADER_PREFIX: &str = "File: ";

const SEPARATOR_WIDTH: usize = 80;

fn separator() -> String {
    "=".repeat(SEPARATOR_WIDTH)
}

/// A file that made it into the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedFile {
    /// Path relative to the collection root
    pub relative_path: String,

    /// Encoding the content was decoded with
    pub encoding: TextEncoding,
}

/// Result of writing a merge artifact.
#[derive(Debug, Clone)]
pub struct MergeReport {
    /// Where the artifact was written
    pub output_path: PathBuf,

    /// Files included, in artifact order
    pub included: Vec<IncludedFile>,

    /// Files left out because they could not be read or decoded
    pub skipped: Vec<SkippedPath>,

    /// Size of the artifact in bytes
    pub bytes_written: usize,
}

/// Formats a single file block.
///
/// A block is a separator, the `File:` header, another separator, a blank
/// line, the raw content and a trailing blank line. The header ends with the
/// content's line count, e.g. `File: pkg/mod.py (12 lines)`, so a reader can
/// step over content that itself looks like a block header.
#[must_use]
pub fn format_file_block(relative_path: &str, content: &str) -> String {
    let separator = separator();
    let line_count = content.lines().count();
    format!(
        "\n{separator}\n{FILE_HEADER_PREFIX}{relative_path} ({line_count} lines)\n{separator}\n\n{content}\n\n"
    )
}

/// Splits a header line into the relative path and the content line count.
fn parse_header(line: &str) -> Option<(&str, usize)> {
    let (path, count) = line
        .strip_prefix(FILE_HEADER_PREFIX)?
        .strip_suffix(" lines)")?
        .rsplit_once(" (")?;
    Some((path, count.parse().ok()?))
}

/// Recovers the relative paths of all file blocks, in artifact order.
///
/// Content lines are skipped using the count in each header, so file
/// content never produces extra entries.
#[must_use]
pub fn parse_file_headers(artifact: &str) -> Vec<String> {
    let separator = separator();
    let lines: Vec<&str> = artifact.lines().collect();
    let mut paths = Vec::new();
    let mut index = 0;

    while index + 2 < lines.len() {
        if lines[index] == separator && lines[index + 2] == separator {
            if let Some((path, line_count)) = parse_header(lines[index + 1]) {
                paths.push(path.to_string());
                // separator, header, separator, blank line, then the content
                index += 4 + line_count;
                continue;
            }
        }
        index += 1;
    }

    paths
}

/// Reads every entry, assembles the artifact and writes it to `destination`.
///
/// Entries that cannot be read or decoded are logged and left out; the
/// report records why. The write replaces any existing file atomically.
///
/// # Errors
///
/// Returns an error if the destination directory cannot be created or the
/// artifact cannot be written. No partial file is left behind.
pub fn write_merge(entries: &[FileEntry], tree_text: &str, destination: &Path) -> Result<MergeReport> {
    let mut content = format!("{MERGE_TITLE}\n\n{tree_text}");
    let mut included = Vec::with_capacity(entries.len());
    let mut skipped = Vec::new();

    for entry in entries {
        match read_text(&entry.absolute_path) {
            Ok(decoded) => {
                if decoded.encoding != TextEncoding::Utf8 {
                    debug!(
                        "Decoded {} as {}",
                        entry.relative_path,
                        decoded.encoding.label()
                    );
                }
                content.push_str(&format_file_block(&entry.relative_path, &decoded.text));
                included.push(IncludedFile {
                    relative_path: entry.relative_path.clone(),
                    encoding: decoded.encoding,
                });
            }
            Err(e) => {
                error!("Skipping {}: {}", entry.relative_path, e);
                let reason = match e {
                    Error::Undecodable { .. } => SkipReason::Undecodable,
                    other => SkipReason::Unreadable {
                        message: other.to_string(),
                    },
                };
                skipped.push(SkippedPath {
                    path: entry.relative_path.clone(),
                    reason,
                });
            }
        }
    }

    if !skipped.is_empty() {
        warn!("{} file(s) left out of the merge", skipped.len());
    }

    info!("Writing output to: {}", destination.display());
    write_file_atomic(destination, &content)?;
    info!(
        "Merged {} files into {}",
        included.len(),
        destination.display()
    );

    Ok(MergeReport {
        output_path: destination.to_path_buf(),
        included,
        skipped,
        bytes_written: content.len(),
    })
}

/// Formats the artifact and writes it, returning the destination path.
///
/// # Errors
///
/// See [`write_merge`].
pub fn format_and_write(entries: &[FileEntry], tree_text: &str, destination: &Path) -> Result<PathBuf> {
    write_merge(entries, tree_text, destination).map(|report| report.output_path)
}

/// Writes a file atomically.
///
/// # Process
///
/// 1. Creates the parent directory if needed
/// 2. Writes content to a sibling temporary file
/// 3. Syncs the temporary file to disk
/// 4. Renames the temporary file over the target path
///
/// On failure the temporary file is removed, so the target is either the
/// previous file or the complete new one.
pub(crate) fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::config(format!("Invalid output path: {}", path.display())))?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let result = write_and_rename(&temp_path, path, content);
    if result.is_err() && temp_path.exists() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_and_rename(temp_path: &Path, path: &Path, content: &str) -> Result<()> {
    let mut temp_file = fs::File::create(temp_path).map_err(|e| Error::io(temp_path, e))?;

    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| Error::io(temp_path, e))?;

    // Ensure data is flushed to disk
    temp_file.sync_all().map_err(|e| Error::io(temp_path, e))?;

    drop(temp_file);

    fs::rename(temp_path, path).map_err(|e| Error::io(path, e))?;

    Ok(())
}
