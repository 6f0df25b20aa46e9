//! Run configuration: defaults, YAML/JSON files, CLI overrides and validation.
//!
//! Every field has a default, so a partial file only overrides what it names:
//!
//! ```yaml
//! scraping:
//!   language: zh
//! http:
//!   timeout: 60
//!   rate_limit_delay: 2.5
//! output:
//!   format: html
//!   directory: ./reports
//! ```

use crate::cli::Cli;
use crate::date_filter::YearMonth;
use crate::retrieval::DEFAULT_USER_AGENTS;
use crate::scrapers::landing::DEFAULT_SECTION_HEADING;
use crate::utils::ensure_writable_dir;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors from loading, saving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported configuration file extension: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Site language; selects the landing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    #[serde(alias = "english")]
    #[value(alias = "english")]
    En,
    #[serde(alias = "chinese")]
    #[value(alias = "chinese")]
    Zh,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Language::En => "en",
            Language::Zh => "zh",
        })
    }
}

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    Txt,
    Html,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Txt => "txt",
            OutputFormat::Html => "html",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// How repeated URLs among successful extractions are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Keep the first record per URL.
    #[default]
    Skip,
    /// Keep every record.
    Overwrite,
    /// Keep every record, suffixing repeated titles with ` (vN)`.
    Version,
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DuplicatePolicy::Skip => "skip",
            DuplicatePolicy::Overwrite => "overwrite",
            DuplicatePolicy::Version => "version",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BaseUrls {
    pub en: String,
    pub zh: String,
}

impl Default for BaseUrls {
    fn default() -> Self {
        Self {
            en: "https://www.amazonaws.cn/en/new/".to_string(),
            zh: "https://www.amazonaws.cn/new/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScrapingSection {
    pub language: Language,
    pub base_urls: BaseUrls,
    pub section_headings: Vec<String>,
}

impl Default for ScrapingSection {
    fn default() -> Self {
        Self {
            language: Language::En,
            base_urls: BaseUrls::default(),
            section_headings: vec![DEFAULT_SECTION_HEADING.to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpSection {
    /// Per-request timeout in seconds.
    pub timeout: u64,
    pub max_retries: u32,
    /// Pause between detail-page fetches, in seconds.
    pub rate_limit_delay: f64,
    pub user_agents: Vec<String>,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout: 300,
            max_retries: 3,
            rate_limit_delay: 1.0,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputSection {
    pub format: OutputFormat,
    pub directory: PathBuf,
    /// `{timestamp}` expands to `%Y%m%d_%H%M%S`.
    pub filename_template: String,
    pub include_metadata: bool,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            format: OutputFormat::Json,
            directory: PathBuf::from("./output"),
            filename_template: "aws_announcements_{timestamp}".to_string(),
            include_metadata: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FilteringSection {
    /// `YYYY-MM`.
    pub date_filter: Option<String>,
    pub duplicate_handling: DuplicatePolicy,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `DEBUG`, `INFO`, `WARNING`, `ERROR` or `CRITICAL`.
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: None,
        }
    }
}

/// Complete configuration of one run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub scraping: ScrapingSection,
    pub http: HttpSection,
    pub output: OutputSection,
    pub filtering: FilteringSection,
    pub logging: LoggingSection,
    /// Landing page override; wins over `scraping.base_urls`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ScraperConfig {
    /// Load from `path`, or return the defaults when no path is given.
    ///
    /// The format follows the extension: `.yaml`/`.yml` or `.json`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NotFound`] when a named file does not exist, plus read
    /// and parse failures.
    #[instrument(level = "info", skip_all, fields(path = ?path))]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            debug!("No configuration file given; using defaults");
            return Ok(Self::default());
        };
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = match extension(path).as_deref() {
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Some("json") => serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write the configuration to `path`, in the format its extension names.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let rendered = match extension(path).as_deref() {
            Some("yaml" | "yml") => serde_yaml::to_string(self).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?,
            Some("json") => serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, rendered).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Apply command-line values on top of the loaded configuration.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(filter) = &cli.date_filter {
            self.filtering.date_filter = Some(filter.clone());
        }
        if let Some(language) = cli.language {
            self.scraping.language = language;
        }
        if let Some(format) = cli.output_format {
            self.output.format = format;
        }
        if let Some(dir) = &cli.output_dir {
            self.output.directory = dir.clone();
        }
        if let Some(timeout) = cli.timeout {
            self.http.timeout = timeout;
        }
        if let Some(retries) = cli.max_retries {
            self.http.max_retries = retries;
        }
        if let Some(delay) = cli.rate_limit_delay {
            self.http.rate_limit_delay = delay;
        }
        if let Some(level) = &cli.log_level {
            self.logging.level = level.clone();
        }
        if let Some(file) = &cli.log_file {
            self.logging.file = Some(file.clone());
        }
        if let Some(url) = &cli.url {
            self.url = Some(url.clone());
        }
    }

    /// Check values that serde cannot: ranges, the filter and the log level.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.timeout == 0 {
            return Err(ConfigError::Invalid("http.timeout must be positive".into()));
        }
        let delay = self.http.rate_limit_delay;
        if !delay.is_finite() || delay < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "http.rate_limit_delay must be a non-negative number, got {delay}"
            )));
        }
        if let Some(filter) = &self.filtering.date_filter {
            YearMonth::parse(filter).map_err(|_| {
                ConfigError::Invalid(format!(
                    "filtering.date_filter must be YYYY-MM, got {filter:?}"
                ))
            })?;
        }
        if level_directive(&self.logging.level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown logging.level {:?}",
                self.logging.level
            )));
        }
        if self.output.filename_template.trim().is_empty() {
            return Err(ConfigError::Invalid("output.filename_template is empty".into()));
        }
        url::Url::parse(self.landing_url()).map_err(|e| {
            ConfigError::Invalid(format!("landing URL {:?}: {e}", self.landing_url()))
        })?;
        Ok(())
    }

    /// [`validate`](Self::validate), plus a write probe of the output directory.
    pub async fn validate_with_output_dir(&self) -> Result<(), ConfigError> {
        self.validate()?;
        let dir = &self.output.directory;
        ensure_writable_dir(dir).await.map_err(|e| {
            ConfigError::Invalid(format!(
                "output directory {} is not writable: {e}",
                dir.display()
            ))
        })
    }

    /// The landing page for this run.
    pub fn landing_url(&self) -> &str {
        match &self.url {
            Some(url) => url,
            None => match self.scraping.language {
                Language::En => &self.scraping.base_urls.en,
                Language::Zh => &self.scraping.base_urls.zh,
            },
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout)
    }

    /// Validated delays are finite and non-negative.
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.http.rate_limit_delay).unwrap_or_default()
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Map a configured level name to a `tracing` filter directive.
pub fn level_directive(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" | "WARNING" => Some("warn"),
        "ERROR" | "CRITICAL" => Some("error"),
        _ => None,
    }
}
