use crate::{
    completion::{CompletionClient, CompletionRequest, OpenAiClient},
    config::Config,
    error::{Error, Result},
    file::read_text,
    scanner::{Collector, ScanReport},
    stage::{Stage, StageInput},
    template::{PromptInputs, PromptRenderer},
    tree::render_tree,
    writer::{write_file_atomic, write_merge, MergeReport},
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

/// What a single invocation should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Merge, then every document stage in order
    All,
    /// Only build the merge artifact
    Merge,
    /// Only run one document stage
    Stage(Stage),
}

/// Statistics collected while building the merge artifact.
#[derive(Debug, Clone)]
pub struct MergeStats {
    /// Eligible files found by the collector
    pub files_collected: usize,

    /// Files written into the artifact
    pub files_merged: usize,

    /// Paths skipped while collecting and while reading
    pub files_skipped: usize,

    /// Traversal errors encountered
    pub traversal_errors: usize,

    /// Artifact size in bytes
    pub bytes_written: usize,

    /// Where the artifact was written
    pub output_path: PathBuf,

    /// Total execution time
    pub duration: Duration,

    /// Collector report
    pub scan: ScanReport,

    /// Writer report
    pub merge: MergeReport,
}

impl MergeStats {
    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║               Merge Execution Summary                 ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!("║ Files Collected:      {:>8}                        ║", self.files_collected);
        println!("║ Files Merged:         {:>8}                        ║", self.files_merged);
        println!("║ Paths Skipped:        {:>8}                        ║", self.files_skipped);
        println!("║ Traversal Errors:     {:>8}                        ║", self.traversal_errors);
        println!("║ Artifact Size:        {:>8} bytes                  ║", self.bytes_written);
        println!("║ Duration:             {:>8.2}s                     ║", self.duration.as_secs_f64());
        println!("╚═══════════════════════════════════════════════════════╝");
        println!("  Output: {}\n", self.output_path.display());
    }
}

/// Outcome of running a [`Task`].
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Merge statistics, if the task merged
    pub merge: Option<MergeStats>,

    /// Documents written by stages, in order
    pub documents: Vec<(Stage, PathBuf)>,
}

impl RunSummary {
    /// Every output path produced, merge artifact first.
    #[must_use]
    pub fn outputs(&self) -> Vec<&Path> {
        self.merge
            .iter()
            .map(|m| m.output_path.as_path())
            .chain(self.documents.iter().map(|(_, p)| p.as_path()))
            .collect()
    }
}

/// Main pipeline orchestrator.
pub struct Pipeline {
    config: Config,
    renderer: PromptRenderer,
    client: Option<Box<dyn CompletionClient>>,
}

impl Pipeline {
    /// Creates a new pipeline with the given configuration.
    ///
    /// The completion client is created on first use from the configuration,
    /// so merge-only runs need no API key.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - Prompt templates fail to load
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            renderer: PromptRenderer::new()?,
            client: None,
        })
    }

    /// Uses `client` for every completion request instead of the configured endpoint.
    #[must_use]
    pub fn with_client(mut self, client: impl CompletionClient + 'static) -> Self {
        self.client = Some(Box::new(client));
        self
    }

    /// The configuration this pipeline runs with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Executes a task.
    ///
    /// [`Task::All`] stops at the first failing step, since every later stage
    /// reads the output of the earlier ones.
    ///
    /// # Errors
    ///
    /// Returns the first error of any step.
    pub fn run(&self, task: Task) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        match task {
            Task::Merge => summary.merge = Some(self.merge()?),
            Task::Stage(stage) => summary.documents.push((stage, self.generate(stage)?)),
            Task::All => {
                summary.merge = Some(self.merge()?);
                for &stage in Stage::all() {
                    summary.documents.push((stage, self.generate(stage)?));
                }
            }
        }

        Ok(summary)
    }

    /// Collects source files and writes the merge artifact.
    ///
    /// # Process
    ///
    /// 1. **Collect**: walks the root, pruning excluded directories
    /// 2. **Render**: builds the directory structure block
    /// 3. **Write**: reads every file and writes the artifact atomically
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFiles`] if nothing eligible was found, or an IO
    /// error if the artifact cannot be written.
    #[instrument(skip(self), fields(root_dir = %self.config.root_dir.display()))]
    pub fn merge(&self) -> Result<MergeStats> {
        let start_time = Instant::now();
        let root = &self.config.root_dir;
        let patterns = &self.config.exclusions;

        info!("Starting merge with exclusions {:?}", patterns.patterns());

        let scan = Collector::new(root, patterns).scan();
        if scan.entries.is_empty() {
            warn!("No Python files found in {}", root.display());
            return Err(Error::no_files(root));
        }
        info!("Found {} Python files to process", scan.entries.len());

        let tree = render_tree(root, patterns);
        let merge = write_merge(&scan.entries, &tree, &self.config.merge_path()).inspect_err(|e| {
            error!("Failed to write merge artifact: {}", e);
        })?;

        let stats = MergeStats {
            files_collected: scan.entries.len(),
            files_merged: merge.included.len(),
            files_skipped: scan.skipped.len() + merge.skipped.len(),
            traversal_errors: scan.errors,
            bytes_written: merge.bytes_written,
            output_path: merge.output_path.clone(),
            duration: start_time.elapsed(),
            scan,
            merge,
        };

        info!(
            "✓ Merge completed in {:.2}s: {}",
            stats.duration.as_secs_f64(),
            stats.output_path.display()
        );

        Ok(stats)
    }

    /// Runs one document stage and returns the path of the written document.
    ///
    /// The answer is written before it is validated, so an incomplete
    /// document is still available for inspection when validation fails.
    ///
    /// # Errors
    ///
    /// Returns an error if an input is missing, the completion request fails
    /// or returns nothing, the document cannot be written, or a required
    /// section is missing.
    #[instrument(skip(self, stage), fields(stage = stage.id()))]
    pub fn generate(&self, stage: Stage) -> Result<PathBuf> {
        info!("Generating {}", stage.output_file());

        let code = self.read_input(StageInput::MergedSource)?;
        let requirements = if stage.inputs().contains(&StageInput::Document(Stage::Requirements)) {
            Some(self.read_input(StageInput::Document(Stage::Requirements))?)
        } else {
            None
        };

        let prompt = self.renderer.render(
            stage,
            PromptInputs {
                code: &code,
                requirements: requirements.as_deref(),
            },
        )?;

        let request = CompletionRequest {
            model: self.config.model.clone(),
            system: stage.system_prompt().to_string(),
            prompt,
            temperature: self.config.temperature,
        };

        let answer = self.complete(&request)?;
        if answer.trim().is_empty() {
            return Err(Error::EmptyResponse {
                stage: stage.id().to_string(),
            });
        }

        let output_path = self.config.document_dir().join(stage.output_file());
        write_file_atomic(&output_path, &answer)?;
        info!("Wrote {}", output_path.display());

        stage.validate(&output_path, &answer).inspect_err(|e| {
            error!("{}", e);
        })?;

        info!("✓ {} validated", stage.output_file());
        Ok(output_path)
    }

    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if let Some(client) = &self.client {
            return client.complete(request);
        }
        OpenAiClient::from_config(&self.config)?.complete(request)
    }

    /// Reads a stage input from the document directory.
    fn read_input(&self, input: StageInput) -> Result<String> {
        let path = match input {
            StageInput::MergedSource => self.config.merge_path(),
            StageInput::Document(stage) => self.config.document_dir().join(stage.output_file()),
        };

        match read_text(&path) {
            Ok(decoded) if !decoded.text.trim().is_empty() => Ok(decoded.text),
            Ok(_) => Err(Error::missing_input(path)),
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                Err(Error::missing_input(path))
            }
        }
    }
}
