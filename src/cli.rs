//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::TimeWindow;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use clap::Parser;
use std::path::PathBuf;

/// seispair - transfer-function QC for seismic station networks
///
/// Pairs co-located and orthogonal channels of each station, plans the
/// frequency grid for their instrument responses, and hands every pair to
/// a metric engine.
///
/// Examples:
///   seispair --network IU --station ANMO --start 2024-03-01
///   seispair --network IU --station "A*" --start 2024-03-01 --end 2024-03-08 --format csv
///   seispair --inventory stations.txt --start 2024-03-01 --dry-run
///   seispair --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Network code (FDSN wildcards allowed)
    #[arg(
        short,
        long,
        value_name = "NET",
        required_unless_present_any = ["init_config", "inventory"]
    )]
    pub network: Option<String>,

    /// Station code (FDSN wildcards allowed)
    #[arg(short, long, value_name = "STA", default_value = "*")]
    pub station: String,

    /// Window start, YYYY-MM-DD or RFC 3339
    #[arg(long, value_name = "TIME", required_unless_present = "init_config")]
    pub start: Option<String>,

    /// Window end, exclusive; defaults to one day after the start
    #[arg(long, value_name = "TIME")]
    pub end: Option<String>,

    /// Read the channel inventory from a local FDSN station text file
    #[arg(long, value_name = "FILE")]
    pub inventory: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json, csv)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .seispair.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of stations processed concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Metric names to keep (comma-separated)
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub metrics: Option<Vec<String>>,

    /// Rotate offset horizontal pairs instead of skipping them
    ///
    /// Experimental: the amplitude mixing awaits validation.
    #[arg(long)]
    pub rotation: bool,

    /// Plan pairs and frequency grids without fetching any data
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .seispair.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// FDSN station service URL
    #[arg(long, value_name = "URL", env = "SEISPAIR_STATION_URL")]
    pub station_url: Option<String>,

    /// FDSN dataselect service URL
    #[arg(long, value_name = "URL", env = "SEISPAIR_DATASELECT_URL")]
    pub dataselect_url: Option<String>,

    /// IRIS evalresp service URL
    #[arg(long, value_name = "URL", env = "SEISPAIR_EVALRESP_URL")]
    pub evalresp_url: Option<String>,

    /// Metric engine endpoint URL
    #[arg(long, value_name = "URL", env = "SEISPAIR_ENGINE_URL")]
    pub engine_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// Metric rows only, as CSV
    Csv,
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` or RFC 3339 as UTC.
pub fn parse_time_arg(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();

    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(format!(
        "Invalid time '{}': expected YYYY-MM-DD or RFC 3339",
        value
    ))
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The requested time window; the end defaults to one day after the start.
    pub fn time_window(&self) -> Result<TimeWindow, String> {
        let start = match self.start.as_deref() {
            Some(start) => parse_time_arg(start)?,
            None => return Err("--start is required".to_string()),
        };
        let end = match self.end.as_deref() {
            Some(end) => parse_time_arg(end)?,
            None => start + Duration::days(1),
        };

        if end <= start {
            return Err("--end must be after --start".to_string());
        }

        Ok(TimeWindow::new(start, end))
    }

    /// `network.station` selection label, or the inventory file.
    pub fn selection(&self) -> String {
        match (&self.network, &self.inventory) {
            (Some(network), _) => format!("{}.{}", network, self.station),
            (None, Some(path)) => path.display().to_string(),
            (None, None) => String::new(),
        }
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.network.is_none() && self.inventory.is_none() {
            return Err("Either --network or --inventory is required".to_string());
        }

        self.time_window()?;

        // Validate service URLs given on the command line
        for (flag, url) in [
            ("--station-url", &self.station_url),
            ("--dataselect-url", &self.dataselect_url),
            ("--evalresp-url", &self.evalresp_url),
            ("--engine-url", &self.engine_url),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(format!("{} must start with 'http://' or 'https://'", flag));
                }
            }
        }

        // Validate concurrency
        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if let Some(ref metrics) = self.metrics {
            if metrics.iter().all(|m| m.trim().is_empty()) {
                return Err("--metrics must name at least one metric".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        // Validate inventory file if provided
        if let Some(ref path) = self.inventory {
            if !path.is_file() {
                return Err(format!("Inventory file does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
