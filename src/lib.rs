//! # codespec
//!
//! Turns a Python source tree into documentation.
//!
//! ## Features
//!
//! - Glob-based exclusion of files and whole directories
//! - A single merge artifact with a directory overview and one block per file
//! - UTF-8 decoding with a Shift_JIS fallback for legacy sources
//! - Atomic writes for every generated document
//! - Requirements, detailed specification and refactoring documents generated
//!   by an OpenAI-compatible chat model
//!
//! ## Quick Start
//!
//! ```no_run
//! use codespec::{Config, Pipeline, Task};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .root_dir("./project")
//!     .output_file("merge.txt")
//!     .build()?;
//!
//! Pipeline::new(config)?.run(Task::Merge)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library follows a pipeline architecture:
//! 1. **Filter**: Decides which names are excluded
//! 2. **Scanner**: Collects eligible source files, pruning excluded directories
//! 3. **Tree**: Renders the directory structure block
//! 4. **Writer**: Formats and persists the merge artifact
//! 5. **Stages**: Render prompts, query the model and validate the documents

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod completion;
mod config;
mod error;
mod file;
mod filter;
mod pipeline;
mod scanner;
mod stage;
mod template;
mod tree;
mod writer;

pub use completion::{CompletionClient, CompletionRequest, OpenAiClient};
pub use config::{
    Config, ConfigBuilder, Settings, SettingsSource, API_KEY_ENV, DEFAULT_SETTINGS_FILE,
    DOCUMENT_DIR, LOG_DIR,
};
pub use error::{Error, Result};
pub use file::{
    decode_bytes, is_source_file, read_text, DecodedText, FileEntry, TextEncoding, SOURCE_EXTENSION,
};
pub use filter::{is_excluded, ExclusionPatterns, DEFAULT_EXCLUSIONS};
pub use pipeline::{MergeStats, Pipeline, RunSummary, Task};
pub use scanner::{collect, Collector, ScanReport, SkipReason, SkippedPath};
pub use stage::{Stage, StageInput};
pub use tree::{render_tree, SKIPPED_MARKER, TREE_HEADING};
pub use writer::{
    format_and_write, format_file_block, parse_file_headers, write_merge, IncludedFile, MergeReport,
    FILE_HEADER_PREFIX, MERGE_TITLE,
};

/// Runs a task with the given configuration.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - No source files are found
/// - An input document is missing
/// - The completion service fails or returns an incomplete document
/// - File operations fail
///
/// # Examples
///
/// ```no_run
/// use codespec::{Config, Task, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .root_dir(".")
///     .build()?;
///
/// run(config, Task::Merge)?;
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config, task: Task) -> Result<RunSummary> {
    Pipeline::new(config)?.run(task)
}
