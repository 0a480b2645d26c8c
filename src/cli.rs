//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// protmass - explore yeast absolute quantitative proteomics
///
/// Browse protein mass fractions across experimental conditions, rank
/// compartments and compare conditions on log scales. Tables print as
/// Markdown or JSON; charts are written as SVG files.
///
/// Examples:
///   protmass demo-db demo.db
///   protmass --database demo.db search YAL00 --conditions P1,P2
///   protmass --database demo.db compartment nucleus P1
///   protmass --database demo.db distribution P1 P2 --format json
///   protmass --database demo.db shell
///   protmass --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the SQLite database
    ///
    /// Can also be set via PROTMASS_DATABASE env var or .protmass.toml config.
    #[arg(long, global = true, value_name = "FILE", env = "PROTMASS_DATABASE")]
    pub database: Option<PathBuf>,

    /// Path to the downloadable database archive
    #[arg(long, global = true, value_name = "FILE")]
    pub archive: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .protmass.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for generated charts
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, global = true, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write the rendered page to a file instead of stdout
    #[arg(short, long, global = true, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .protmass.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// One user request.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show the first rows of the mass-fraction table and the condition metadata
    Overview {
        /// Number of rows to show
        #[arg(long, value_name = "N")]
        rows: Option<usize>,
    },

    /// Find proteins whose gene identifier contains QUERY (case-insensitive)
    Search {
        /// Substring to look for; an empty query shows the overview
        query: String,

        /// Conditions to total over the matches and chart (comma-separated)
        ///
        /// Example: --conditions P1,P2,P3
        #[arg(long, value_name = "CONDS", value_delimiter = ',')]
        conditions: Vec<String>,
    },

    /// Cumulative mass of the proteins of one compartment under one condition
    Compartment {
        compartment: String,
        condition: String,

        /// Number of top proteins to list
        #[arg(long, value_name = "N")]
        top: Option<usize>,
    },

    /// List the annotated compartments
    Compartments,

    /// Compartment mass ratios: ranking for one condition, scatter for two
    Ratio {
        condition: String,
        second: Option<String>,
    },

    /// Log mass-fraction distribution for one condition, log scatter for two
    Distribution {
        condition: String,
        second: Option<String>,
    },

    /// Link to the full database archive
    Download {
        /// Also copy the archive to this path
        #[arg(long, value_name = "PATH")]
        save: Option<PathBuf>,
    },

    /// About this database
    About,

    /// Write a synthetic demo database
    DemoDb {
        path: PathBuf,

        #[arg(long, default_value = "100", value_name = "N")]
        genes: usize,

        #[arg(long, default_value = "10", value_name = "N")]
        conditions: usize,

        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Interactive session: one command per line
    Shell,
}

/// Output format for rendered pages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let Some(ref command) = self.command else {
            return Err("A command is required (try --help)".to_string());
        };

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        command.validate()
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

impl Command {
    /// Validate command-specific values.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Command::Overview { rows: Some(0) } => Err("Rows must be at least 1".to_string()),
            Command::Compartment { top: Some(0), .. } => {
                Err("Top must be at least 1".to_string())
            }
            Command::DemoDb {
                genes, conditions, ..
            } if *genes == 0 || *conditions == 0 => {
                Err("Demo data needs at least one gene and one condition".to_string())
            }
            Command::Search { conditions, .. } if conditions.iter().any(|c| c.is_empty()) => {
                Err("Condition names must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Parser for one line typed into the interactive shell.
#[derive(Parser, Debug)]
#[command(no_binary_name = true, name = "protmass>", disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Command,
}
