//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Timegraph - trajectory analysis for archived marker measurements
///
/// Reads a subject's measurements for one module marker from the archive,
/// fits a polynomial trend, classifies every point into health zones and
/// stores the result as a report.
///
/// Examples:
///   timegraph --subject subject_001 --module vtf_stress_test --marker vo2max \
///             --from 2026-01-01T00:00:00Z --to 2026-02-01T00:00:00Z \
///             --healthy-min 35 --healthy-max 60 --margin 5 --degree 2
///   timegraph --subject subject_001 --module vtf_stress_test --marker vo2max \
///             --from 2026-01-01T00:00:00Z --to 2026-02-01T00:00:00Z --dry-run
///   timegraph --list-subjects
///   timegraph --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Subject identifier
    #[arg(long, value_name = "ID", required_unless_present_any = ["init_config", "list_subjects", "list_scopes", "list_reports", "show_registry"])]
    pub subject: Option<String>,

    /// Module identifier
    #[arg(long, value_name = "ID", required_unless_present_any = ["init_config", "list_subjects", "list_scopes", "list_reports", "show_registry"])]
    pub module: Option<String>,

    /// Marker identifier
    #[arg(long, value_name = "ID", required_unless_present_any = ["init_config", "list_subjects", "list_scopes", "list_reports", "show_registry"])]
    pub marker: Option<String>,

    /// Start of the time window (RFC 3339, inclusive)
    #[arg(long, value_name = "TIMESTAMP", required_unless_present_any = ["init_config", "list_subjects", "list_scopes", "list_reports", "show_registry"])]
    pub from: Option<String>,

    /// End of the time window (RFC 3339, inclusive)
    #[arg(long, value_name = "TIMESTAMP", required_unless_present_any = ["init_config", "list_subjects", "list_scopes", "list_reports", "show_registry"])]
    pub to: Option<String>,

    /// Lower bound of the healthy band
    ///
    /// Zone flags must be given together; when omitted, the marker's
    /// defaults from the module registry are used.
    #[arg(long, value_name = "VALUE", allow_hyphen_values = true)]
    pub healthy_min: Option<f64>,

    /// Upper bound of the healthy band
    #[arg(long, value_name = "VALUE", allow_hyphen_values = true)]
    pub healthy_max: Option<f64>,

    /// Width of the vulnerable band on each side of the healthy band
    #[arg(long, value_name = "VALUE")]
    pub margin: Option<f64>,

    /// Polynomial degree of the fitted trend
    #[arg(short, long, value_name = "N")]
    pub degree: Option<usize>,

    /// Root directory of the measurement archive
    #[arg(long, value_name = "DIR", env = "TIMEGRAPH_ARCHIVE")]
    pub archive_root: Option<PathBuf>,

    /// Directory where JSON reports are stored
    #[arg(long, value_name = "DIR", env = "TIMEGRAPH_REPORTS")]
    pub reports_root: Option<PathBuf>,

    /// SQLite metadata database
    #[arg(long, value_name = "FILE", env = "TIMEGRAPH_DB")]
    pub database: Option<PathBuf>,

    /// Module registry JSON file
    #[arg(long, value_name = "FILE", env = "TIMEGRAPH_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .timegraph.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write a rendered copy of the report to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Rendering format for --output (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: read the archive and list the points without fitting
    /// or storing anything
    #[arg(long)]
    pub dry_run: bool,

    /// List subjects present in the archive
    #[arg(long)]
    pub list_subjects: bool,

    /// List every subject/module/marker scope with an index
    #[arg(long)]
    pub list_scopes: bool,

    /// List the reports stored for a subject
    #[arg(long, value_name = "SUBJECT")]
    pub list_reports: Option<String>,

    /// Print the module registry
    #[arg(long)]
    pub show_registry: bool,

    /// Generate a default .timegraph.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the rendered report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
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

    /// True when the invocation only inspects the archive or registry.
    pub fn is_listing(&self) -> bool {
        self.init_config
            || self.list_subjects
            || self.list_scopes
            || self.list_reports.is_some()
            || self.show_registry
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.is_listing() {
            return Ok(());
        }

        let zone_flags = [self.healthy_min, self.healthy_max, self.margin];
        let given = zone_flags.iter().filter(|v| v.is_some()).count();
        if given != 0 && given != zone_flags.len() {
            return Err(
                "--healthy-min, --healthy-max and --margin must be given together".to_string(),
            );
        }

        if let (Some(min), Some(max)) = (self.healthy_min, self.healthy_max) {
            if min > max {
                return Err(format!(
                    "--healthy-min ({}) must not exceed --healthy-max ({})",
                    min, max
                ));
            }
        }

        if let Some(margin) = self.margin {
            if margin < 0.0 {
                return Err("--margin must not be negative".to_string());
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
