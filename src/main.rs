//! # Announcement Harvester
//!
//! Harvests product announcements from the Amazon Web Services China
//! "What's New" pages: discovers announcement links on the landing page,
//! optionally keeps a single publication month, extracts title, date, body
//! and embedded links from each detail page, and writes one report file.
//!
//! ## Usage
//!
//! ```sh
//! announcement_harvester -d 2026-01 -f html -o ./reports
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Discovery**: Fetch the landing page and extract announcement links
//! 2. **Filtering**: Keep links published in the requested month
//! 3. **Extraction**: Fetch each detail page in turn, rate limited
//! 4. **Output**: Write JSON, CSV, text or HTML
//!
//! Exit status is non-zero on fatal errors (bad configuration, landing page
//! unreachable or unrecognisable) and when links were processed but none
//! could be extracted.

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod date_filter;
mod error;
mod models;
mod orchestrator;
mod outputs;
mod retrieval;
mod scrapers;
mod utils;

use cli::Cli;
use config::{level_directive, ScraperConfig};
use orchestrator::{log_summary, RunSettings, Scraper};
use outputs::{store_result, StoreOptions};
use retrieval::HttpClient;

/// Set up stdout logging, plus a plain-text file layer when `log_file` is set.
///
/// `RUST_LOG` wins over the configured level when present.
fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let directive = level_directive(level).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{directive},hyper=warn,reqwest=warn")));

    let stdout_layer = tfmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(UtcTime::rfc_3339());

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Some(
                tfmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_timer(UtcTime::rfc_3339()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;
    Ok(())
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C; run cannot be interrupted cleanly");
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received; stopping after the current step");
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    let mut config = ScraperConfig::load(args.config.as_deref())?;
    config.apply_cli(&args);

    init_tracing(&config.logging.level, config.logging.file.as_deref())?;
    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "announcement_harvester starting up");
    debug!(?args, "Parsed CLI arguments");

    // Early check: configuration values and a writable output dir
    if let Err(e) = config.validate_with_output_dir().await {
        error!(error = %e, "Configuration is invalid");
        return Err(e.into());
    }

    if let Some(path) = &args.save_config {
        config.save(path)?;
        info!(path = %path.display(), "Effective configuration written");
        return Ok(());
    }

    if args.dry_run {
        info!(
            url = config.landing_url(),
            language = %config.scraping.language,
            format = %config.output.format,
            dir = %config.output.directory.display(),
            filter = config.filtering.date_filter.as_deref().unwrap_or("none"),
            "Dry run: configuration is valid, nothing fetched"
        );
        return Ok(());
    }

    let client = HttpClient::new(config.timeout(), config.http.user_agents.clone())?;
    let scraper = Scraper::new(client, RunSettings::from(&config))?;
    info!(
        url = config.landing_url(),
        language = %config.scraping.language,
        "Starting announcement harvest"
    );

    let result = match scraper.run_until(shutdown_signal()).await {
        Ok(result) => result,
        Err(e) => {
            error!(kind = e.kind(), error = %e, "Run aborted");
            return Err(e.into());
        }
    };

    let output = match store_result(&result, &StoreOptions::from(&config)).await {
        Ok(path) => Some(path),
        Err(e) => {
            error!(error = %e, "Failed to write output");
            None
        }
    };

    log_summary(
        &result,
        config.filtering.date_filter.as_deref(),
        config.scraping.language,
        output.as_deref(),
    );

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    if output.is_none() {
        return Err("output could not be written".into());
    }
    if result.is_total_failure() {
        error!(
            failed = result.failed_extractions.len(),
            "No announcement could be extracted"
        );
        std::process::exit(1);
    }
    Ok(())
}
