use crate::error::{Error, Result};
use crate::filter::{ExclusionPatterns, DEFAULT_EXCLUSIONS};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_OUTPUT_FILE: &str = "merge.txt";
const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_API_BASE_URL: &str = "https://api.openai.com";

/// Directory (under the source root) that receives every generated document.
pub const DOCUMENT_DIR: &str = "document";

/// Directory (under the source root) that receives the application log.
pub const LOG_DIR: &str = "log";

/// Default settings file name, looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "settings.toml";

/// Environment variable consulted when the settings file has no API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Raw values read from the settings file.
///
/// Every key is optional; missing keys fall back to the documented defaults.
///
/// ```toml
/// source_directory = "."
/// output_file = "merge.txt"
/// exclusions = "myenv,*__pycache__*,sample_file,*.log"
///
/// [api]
/// openai_api_key = "sk-..."
/// openai_model = "gpt-4"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Collection root
    pub source_directory: PathBuf,

    /// Merge artifact file name
    pub output_file: String,

    /// Comma-separated exclusion patterns
    pub exclusions: String,

    /// Completion service settings
    pub api: ApiSettings,
}

/// The `[api]` table of the settings file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// API key; empty means "use the environment"
    pub openai_api_key: String,

    /// Model name
    pub openai_model: String,

    /// Base URL of the OpenAI-compatible endpoint
    pub base_url: String,

    /// Sampling temperature
    pub temperature: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_directory: PathBuf::from("."),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            exclusions: DEFAULT_EXCLUSIONS.join(","),
            api: ApiSettings::default(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Where a [`Settings`] value came from.
#[derive(Debug, Clone)]
pub enum SettingsSource {
    /// Parsed from this file
    File(PathBuf),
    /// The file does not exist; defaults were used
    Missing(PathBuf),
    /// The file exists but could not be used; defaults were used
    Invalid {
        /// The offending file
        path: PathBuf,
        /// Why it was rejected
        error: Error,
    },
}

impl Settings {
    /// Parses settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the text is not valid TOML or a value
    /// has the wrong type.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::config(format!("Malformed settings: {}", e)))
    }

    /// Loads settings from `path`, degrading to defaults.
    ///
    /// A missing or malformed file yields [`Settings::default`]; the returned
    /// [`SettingsSource`] tells the caller which case applied so it can warn.
    #[must_use]
    pub fn load(path: &Path) -> (Self, SettingsSource) {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return (Self::default(), SettingsSource::Missing(path.to_path_buf()));
            }
            Err(e) => {
                return (
                    Self::default(),
                    SettingsSource::Invalid {
                        path: path.to_path_buf(),
                        error: Error::io(path, e),
                    },
                );
            }
        };

        match Self::from_toml(&text) {
            Ok(settings) => (settings, SettingsSource::File(path.to_path_buf())),
            Err(error) => (
                Self::default(),
                SettingsSource::Invalid {
                    path: path.to_path_buf(),
                    error,
                },
            ),
        }
    }

    /// Returns the configured API key, falling back to the environment.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        let key = self.api.openai_api_key.trim();
        if key.is_empty() {
            std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty())
        } else {
            Some(key.to_string())
        }
    }

    /// Turns the settings into a configuration builder.
    ///
    /// # Errors
    ///
    /// Returns an error if the exclusion list contains an invalid pattern.
    pub fn into_builder(self) -> Result<ConfigBuilder> {
        let exclusions = ExclusionPatterns::from_comma_separated(&self.exclusions)?;
        let api_key = self.api_key();

        let mut builder = Config::builder()
            .root_dir(self.source_directory)
            .output_file(self.output_file)
            .exclusions(exclusions)
            .model(self.api.openai_model)
            .api_base_url(self.api.base_url)
            .temperature(self.api.temperature);

        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }

        Ok(builder)
    }
}

/// Configuration for the codespec pipeline.
///
/// Use [`Config::builder()`] to construct a new configuration, or
/// [`Settings::into_builder`] to start from a settings file.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Root directory to collect source files from
    pub root_dir: PathBuf,

    /// File name of the merge artifact inside [`DOCUMENT_DIR`]
    pub output_file: String,

    /// Exclusion patterns
    pub exclusions: ExclusionPatterns,

    /// API key for the completion service
    pub api_key: Option<String>,

    /// Model name sent with every completion request
    pub model: String,

    /// Base URL of the OpenAI-compatible endpoint
    pub api_base_url: String,

    /// Sampling temperature
    pub temperature: f32,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use codespec::Config;
    ///
    /// let config = Config::builder()
    ///     .root_dir("./project")
    ///     .output_file("merge.txt")
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Root directory doesn't exist or is not a directory
    /// - Output file name is empty or contains a path separator
    /// - Temperature is outside `0.0..=2.0`
    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.exists() {
            return Err(Error::config(format!(
                "Root directory does not exist: {}",
                self.root_dir.display()
            )));
        }

        if !self.root_dir.is_dir() {
            return Err(Error::config(format!(
                "Root path is not a directory: {}",
                self.root_dir.display()
            )));
        }

        let output = Path::new(&self.output_file);
        if self.output_file.trim().is_empty() || output.file_name() != Some(output.as_os_str()) {
            return Err(Error::config(format!(
                "Output file must be a plain file name, got '{}'",
                self.output_file
            )));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::config(format!(
                "temperature ({}) must be between 0.0 and 2.0",
                self.temperature
            )));
        }

        Ok(())
    }

    /// Directory that receives the generated documents.
    #[must_use]
    pub fn document_dir(&self) -> PathBuf {
        self.root_dir.join(DOCUMENT_DIR)
    }

    /// Full path of the merge artifact.
    #[must_use]
    pub fn merge_path(&self) -> PathBuf {
        self.document_dir().join(&self.output_file)
    }

    /// Directory that receives the application log.
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.root_dir.join(LOG_DIR)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            exclusions: ExclusionPatterns::defaults(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root_dir: Option<PathBuf>,
    output_file: Option<String>,
    exclusions: Option<ExclusionPatterns>,
    api_key: Option<String>,
    model: Option<String>,
    api_base_url: Option<String>,
    temperature: Option<f32>,
}

impl ConfigBuilder {
    /// Sets the root directory to collect from.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Sets the merge artifact file name.
    #[must_use]
    pub fn output_file(mut self, name: impl Into<String>) -> Self {
        self.output_file = Some(name.into());
        self
    }

    /// Sets the exclusion patterns.
    #[must_use]
    pub fn exclusions(mut self, patterns: ExclusionPatterns) -> Self {
        self.exclusions = Some(patterns);
        self
    }

    /// Sets the completion service API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the model name.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the base URL of the completion endpoint.
    #[must_use]
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Builds the configuration.
    ///
    /// The root directory is made absolute so relative paths and the tree
    /// heading are stable regardless of how it was given.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let mut config = Config {
            root_dir: self.root_dir.unwrap_or_else(|| PathBuf::from(".")),
            output_file: self
                .output_file
                .unwrap_or_else(|| DEFAULT_OUTPUT_FILE.to_string()),
            exclusions: self.exclusions.unwrap_or_default(),
            api_key: self.api_key,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base_url: self
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        };

        config.validate()?;
        config.root_dir = fs::canonicalize(&config.root_dir)
            .map_err(|e| Error::io(&config.root_dir, e))?;

        Ok(config)
    }
}
