//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.seispair.toml` files.

use crate::models::TimeWindow;
use crate::orchestrator::RunConfig;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".seispair.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Web service endpoints.
    #[serde(default)]
    pub services: ServicesConfig,

    /// Run settings.
    #[serde(default)]
    pub run: RunSettings,

    /// Horizontal rotation settings.
    #[serde(default)]
    pub rotation: RotationConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Number of stations processed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_output() -> String {
    "seispair_report.md".to_string()
}

fn default_concurrency() -> usize {
    4
}

/// Endpoints of the external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// FDSN station web service.
    #[serde(default = "default_station_url")]
    pub station_url: String,

    /// FDSN dataselect web service.
    #[serde(default = "default_dataselect_url")]
    pub dataselect_url: String,

    /// IRIS evalresp web service.
    #[serde(default = "default_evalresp_url")]
    pub evalresp_url: String,

    /// Metric engine endpoint.
    #[serde(default = "default_engine_url")]
    pub engine_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            station_url: default_station_url(),
            dataselect_url: default_dataselect_url(),
            evalresp_url: default_evalresp_url(),
            engine_url: default_engine_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_station_url() -> String {
    "https://service.iris.edu/fdsnws/station/1".to_string()
}

fn default_dataselect_url() -> String {
    "https://service.iris.edu/fdsnws/dataselect/1".to_string()
}

fn default_evalresp_url() -> String {
    "https://service.iris.edu/irisws/evalresp/1".to_string()
}

fn default_engine_url() -> String {
    "http://localhost:8650/transfer-function".to_string()
}

fn default_timeout() -> u64 {
    300
}

/// What to compute and which channels to ignore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    /// Metric names kept in the output.
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,

    /// Channel codes that are never paired.
    #[serde(default = "default_excluded_channels")]
    pub excluded_channels: Vec<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            metrics: default_metrics(),
            excluded_channels: default_excluded_channels(),
        }
    }
}

fn default_metrics() -> Vec<String> {
    vec!["transfer_function".to_string()]
}

fn default_excluded_channels() -> Vec<String> {
    vec!["LOG".to_string(), "ACE".to_string()]
}

/// Rotation of offset horizontal pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Off by default: the amplitude mixing has not been validated.
    #[serde(default)]
    pub enabled: bool,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.seispair.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values given explicitly on the command line override.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }

        if let Some(ref url) = args.station_url {
            self.services.station_url = url.clone();
        }
        if let Some(ref url) = args.dataselect_url {
            self.services.dataselect_url = url.clone();
        }
        if let Some(ref url) = args.evalresp_url {
            self.services.evalresp_url = url.clone();
        }
        if let Some(ref url) = args.engine_url {
            self.services.engine_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.services.timeout_seconds = timeout;
        }

        if let Some(ref metrics) = args.metrics {
            self.run.metrics = metrics
                .iter()
                .map(|name| name.trim())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }

        // Flag only enables; disabling is done in the file
        if args.rotation {
            self.rotation.enabled = true;
        }
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.general.concurrency == 0 {
            bail!("general.concurrency must be at least 1");
        }
        if self.services.timeout_seconds == 0 {
            bail!("services.timeout_seconds must be at least 1");
        }
        if self.run.metrics.is_empty() {
            bail!("run.metrics must name at least one metric");
        }

        for (name, url) in [
            ("station_url", &self.services.station_url),
            ("dataselect_url", &self.services.dataselect_url),
            ("evalresp_url", &self.services.evalresp_url),
            ("engine_url", &self.services.engine_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!("services.{} must start with 'http://' or 'https://'", name);
            }
        }

        Ok(())
    }

    /// Settings handed to the orchestrator.
    pub fn run_config(&self, window: TimeWindow, plan_only: bool) -> RunConfig {
        RunConfig {
            window,
            metrics: self.run.metrics.iter().cloned().collect(),
            excluded_channels: self.run.excluded_channels.clone(),
            rotation_enabled: self.rotation.enabled,
            concurrency: self.general.concurrency,
            plan_only,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
