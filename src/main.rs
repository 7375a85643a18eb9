use anyhow::{bail, Context};
use clap::Parser;
use codespec::{
    Config, ExclusionPatterns, Pipeline, RunSummary, Settings, SettingsSource, Stage, Task,
    DEFAULT_SETTINGS_FILE,
};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE_NAME: &str = "application.log";

#[derive(Parser, Debug)]
#[command(
    name = "codespec",
    version,
    author,
    about = "Merge a Python source tree and generate documentation from it",
    long_about = "Merge every Python file of a source tree into one artifact, then turn it into \
    a requirements specification, a detailed program specification and a refactoring \
    review with an OpenAI-compatible chat model.\n\n\
    Settings are read from settings.toml; command line flags override them. \
    Without a TASK an interactive menu is shown.\n\n\
    USAGE EXAMPLES:\n  \
      # Choose a task interactively\n  \
      codespec\n\n  \
      # Only build document/merge.txt\n  \
      codespec merge\n\n  \
      # Run everything for another project\n  \
      codespec --dir ./my-project all\n\n  \
      # Override the exclusion list\n  \
      codespec --exclude venv --exclude '*.log' merge"
)]
struct Cli {
    /// Task to run; prompts for one when omitted
    #[arg(value_enum, value_name = "TASK")]
    task: Option<CliTask>,

    /// Settings file
    #[arg(short, long, default_value = DEFAULT_SETTINGS_FILE, value_name = "FILE")]
    settings: PathBuf,

    /// Source directory (overrides `source_directory`)
    #[arg(short, long, value_name = "PATH")]
    dir: Option<PathBuf>,

    /// Merge artifact file name (overrides `output_file`)
    #[arg(short, long, value_name = "NAME")]
    output_file: Option<String>,

    /// Exclusion pattern (repeatable, replaces `exclusions`)
    #[arg(short, long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliTask {
    /// Merge, then generate every document
    All,
    /// Only build the merge artifact
    Merge,
    /// Requirements specification
    Spec,
    /// Detailed program specification
    DetailedSpec,
    /// Refactoring review
    Refactor,
}

impl From<CliTask> for Task {
    fn from(t: CliTask) -> Self {
        match t {
            CliTask::All => Self::All,
            CliTask::Merge => Self::Merge,
            CliTask::Spec => Self::Stage(Stage::Requirements),
            CliTask::DetailedSpec => Self::Stage(Stage::DetailedSpec),
            CliTask::Refactor => Self::Stage(Stage::Refactoring),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (settings, settings_source) = Settings::load(&cli.settings);

    let mut builder = settings
        .into_builder()
        .context("Invalid exclusion pattern in settings")?;

    if let Some(dir) = cli.dir {
        builder = builder.root_dir(dir);
    }
    if let Some(output_file) = cli.output_file {
        builder = builder.output_file(output_file);
    }
    if !cli.exclude.is_empty() {
        let patterns = ExclusionPatterns::new(&cli.exclude).context("Invalid --exclude pattern")?;
        builder = builder.exclusions(patterns);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let level = match (cli.debug, cli.verbose) {
        (_, v) if v >= 2 => "trace",
        (true, _) | (_, 1) => "debug",
        _ => "info",
    };
    setup_tracing(level, &config.log_dir());
    report_settings_source(&settings_source);

    info!(
        "codespec started at {} (level {}, logs in {})",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        level,
        config.log_dir().display()
    );

    let task = match cli.task {
        Some(task) => task.into(),
        None => prompt_task()?,
    };

    let summary = Pipeline::new(config)
        .context("Failed to create pipeline")?
        .run(task)
        .context("Task execution failed")?;

    print_outputs(&summary);
    Ok(())
}

fn report_settings_source(source: &SettingsSource) {
    match source {
        SettingsSource::File(path) => info!("Loaded settings from {}", path.display()),
        SettingsSource::Missing(path) => {
            warn!("Settings file {} not found, using defaults", path.display());
        }
        SettingsSource::Invalid { path, error } => {
            warn!("Ignoring settings file {}: {}", path.display(), error);
        }
    }
}

fn prompt_task() -> anyhow::Result<Task> {
    println!("Select a task:");
    println!("  1. Run everything");
    println!("  2. Merge Python files only");
    println!("  3. Generate requirements specification");
    println!("  4. Generate detailed program specification");
    println!("  5. Run refactoring check");
    print!("Enter 1-5: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;

    let task = match line.trim() {
        "1" => Task::All,
        "2" => Task::Merge,
        "3" => Task::Stage(Stage::Requirements),
        "4" => Task::Stage(Stage::DetailedSpec),
        "5" => Task::Stage(Stage::Refactoring),
        other => bail!("Invalid choice '{}', expected a number from 1 to 5", other),
    };

    Ok(task)
}

fn print_outputs(summary: &RunSummary) {
    if let Some(stats) = &summary.merge {
        stats.print_summary();
    }
    for (stage, path) in &summary.documents {
        println!("✓ {}: {}", stage.id(), path.display());
    }
}

fn setup_tracing(level: &str, log_dir: &Path) {
    let filter = EnvFilter::new(format!("codespec={level}"));

    let log_file = fs::create_dir_all(log_dir).and_then(|()| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join(LOG_FILE_NAME))
    });

    let (file_layer, file_error) = match log_file {
        Ok(file) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            ),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        warn!("Logging to console only, cannot open {}: {}", log_dir.display(), e);
    }
}
