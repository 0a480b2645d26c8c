//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.protmass.toml` files.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".protmass.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data source settings.
    #[serde(default)]
    pub data: DataConfig,

    /// Analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Archive download settings.
    #[serde(default)]
    pub download: DownloadConfig,
}

/// Where the data lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// SQLite database holding the four tables.
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Compressed archive offered for download.
    #[serde(default = "default_archive")]
    pub archive: PathBuf,

    /// File name suggested to the browser for the archive.
    #[serde(default = "default_archive_name")]
    pub archive_name: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            archive: default_archive(),
            archive_name: default_archive_name(),
        }
    }
}

fn default_database() -> PathBuf {
    PathBuf::from("protmass.db")
}

fn default_archive() -> PathBuf {
    PathBuf::from("protein_database.rar")
}

fn default_archive_name() -> String {
    "protein_database.rar".to_string()
}

/// Analysis parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Proteins listed in the compartment analysis.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Compartments shown in the single-condition ratio ranking.
    #[serde(default = "default_ratio_top_n")]
    pub ratio_top_n: usize,

    /// Both ratios must reach this value for a compartment to be labelled.
    #[serde(default = "default_label_threshold")]
    pub label_threshold: f64,

    /// Upper bound on histogram bins.
    #[serde(default = "default_max_bins")]
    pub max_bins: usize,

    /// Rows shown by the overview.
    #[serde(default = "default_overview_rows")]
    pub overview_rows: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            ratio_top_n: default_ratio_top_n(),
            label_threshold: default_label_threshold(),
            max_bins: default_max_bins(),
            overview_rows: default_overview_rows(),
        }
    }
}

fn default_top_n() -> usize {
    10
}

fn default_ratio_top_n() -> usize {
    20
}

fn default_label_threshold() -> f64 {
    0.05
}

fn default_max_bins() -> usize {
    50
}

fn default_overview_rows() -> usize {
    100
}

/// Rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for generated charts.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Page format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Chart width in pixels (paired figures are twice as wide).
    #[serde(default = "default_chart_width")]
    pub chart_width: u32,

    /// Chart height in pixels.
    #[serde(default = "default_chart_height")]
    pub chart_height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            format: OutputFormat::default(),
            chart_width: default_chart_width(),
            chart_height: default_chart_height(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("protmass_output")
}

fn default_chart_width() -> u32 {
    800
}

fn default_chart_height() -> u32 {
    600
}

/// Archive download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// How long the download waits for the background read.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Who to ask for the data when the archive is unavailable.
    #[serde(default = "default_contact")]
    pub contact: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            contact: default_contact(),
        }
    }
}

fn default_timeout() -> u64 {
    5
}

fn default_contact() -> String {
    "the database maintainers".to_string()
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
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref database) = args.database {
            self.data.database = database.clone();
        }
        if let Some(ref archive) = args.archive {
            self.data.archive = archive.clone();
        }
        if let Some(ref dir) = args.output_dir {
            self.output.dir = dir.clone();
        }
        if let Some(format) = args.format {
            self.output.format = format;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
