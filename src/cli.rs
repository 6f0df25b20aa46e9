//! Command-line interface definitions.
//!
//! Every option here overrides the matching configuration key; anything left
//! unset keeps the value from the config file or the built-in default.

use crate::config::{Language, OutputFormat};
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the announcement harvester.
///
/// # Examples
///
/// ```sh
/// # Everything from the English landing page, as JSON in ./output
/// announcement_harvester
///
/// # January 2026 only, from the Chinese page, as an HTML report
/// announcement_harvester -d 2026-01 -L zh -f html -o ./reports
///
/// # Check a config file without touching the network
/// announcement_harvester -c config.yaml --dry-run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a YAML or JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Only keep announcements published in this month (YYYY-MM)
    #[arg(short, long)]
    pub date_filter: Option<String>,

    /// Site language
    #[arg(short = 'L', long, value_enum)]
    pub language: Option<Language>,

    /// Output file format
    #[arg(short = 'f', long, value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Directory for the output file
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Retries per page after the first attempt
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Seconds to wait between detail-page fetches
    #[arg(long)]
    pub rate_limit_delay: Option<f64>,

    /// DEBUG, INFO, WARNING, ERROR or CRITICAL
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Validate configuration and exit without fetching anything
    #[arg(long)]
    pub dry_run: bool,

    /// Landing page URL, overriding the language default
    #[arg(long)]
    pub url: Option<String>,

    /// Write the effective configuration to this file (.yaml or .json) and exit
    #[arg(long)]
    pub save_config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "announcement_harvester",
            "--config",
            "config.yaml",
            "--date-filter",
            "2026-01",
            "--output-format",
            "csv",
            "--output-dir",
            "./out",
            "--rate-limit-delay",
            "0.25",
            "--dry-run",
            "--save-config",
            "effective.yaml",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("config.yaml")));
        assert_eq!(cli.date_filter.as_deref(), Some("2026-01"));
        assert_eq!(cli.output_format, Some(OutputFormat::Csv));
        assert_eq!(cli.output_dir, Some(PathBuf::from("./out")));
        assert_eq!(cli.rate_limit_delay, Some(0.25));
        assert!(cli.dry_run);
        assert_eq!(cli.save_config, Some(PathBuf::from("effective.yaml")));
        assert!(cli.language.is_none());
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "announcement_harvester",
            "-c",
            "/tmp/c.json",
            "-d",
            "2025-12",
            "-L",
            "chinese",
            "-f",
            "html",
            "-o",
            "/tmp/out",
            "-l",
            "DEBUG",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json")));
        assert_eq!(cli.date_filter.as_deref(), Some("2025-12"));
        assert_eq!(cli.language, Some(Language::Zh));
        assert_eq!(cli.output_format, Some(OutputFormat::Html));
        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(cli.log_level.as_deref(), Some("DEBUG"));
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["announcement_harvester", "-f", "pdf"]).is_err());
    }
}
