//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.timegraph.toml` files.

use crate::analysis::TrendPolicy;
use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".timegraph.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Archive settings.
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Report output settings.
    #[serde(default)]
    pub reports: ReportsConfig,

    /// Metadata database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Module registry settings.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Fitting and trend settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Default rendering format for `--output`.
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Root of the measurement archive.
    #[serde(default = "default_archive_root")]
    pub root: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: default_archive_root(),
        }
    }
}

fn default_archive_root() -> PathBuf {
    PathBuf::from("data/archive")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// Directory that receives one JSON report per run.
    #[serde(default = "default_reports_root")]
    pub root: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            root: default_reports_root(),
        }
    }
}

fn default_reports_root() -> PathBuf {
    PathBuf::from("data/reports")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file holding subject and report metadata.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/timegraph.db")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Path to `module_registry.json`.
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("registry/module_registry.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Polynomial degree used when `--degree` is not given.
    #[serde(default = "default_degree")]
    pub default_degree: usize,

    /// Fraction of the healthy band width below which a trend is stable.
    #[serde(default = "default_stable_tolerance")]
    pub stable_tolerance: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_degree: default_degree(),
            stable_tolerance: default_stable_tolerance(),
        }
    }
}

fn default_degree() -> usize {
    1
}

fn default_stable_tolerance() -> f64 {
    TrendPolicy::default().stable_tolerance
}

impl AnalysisConfig {
    pub fn trend_policy(&self) -> TrendPolicy {
        TrendPolicy {
            stable_tolerance: self.stable_tolerance,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if !(config.analysis.stable_tolerance.is_finite() && config.analysis.stable_tolerance >= 0.0)
        {
            anyhow::bail!(
                "analysis.stable_tolerance must be a non-negative number in {}",
                path.display()
            );
        }

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
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref root) = args.archive_root {
            self.archive.root = root.clone();
        }
        if let Some(ref root) = args.reports_root {
            self.reports.root = root.clone();
        }
        if let Some(ref path) = args.database {
            self.database.path = path.clone();
        }
        if let Some(ref path) = args.registry {
            self.registry.path = path.clone();
        }
        if let Some(degree) = args.degree {
            self.analysis.default_degree = degree;
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.archive.root, PathBuf::from("data/archive"));
        assert_eq!(config.analysis.default_degree, 1);
        assert_eq!(config.analysis.stable_tolerance, 0.01);
        assert_eq!(config.general.format, OutputFormat::Markdown);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true
format = "json"

[archive]
root = "/srv/archive"

[analysis]
default_degree = 2
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.general.format, OutputFormat::Json);
        assert_eq!(config.archive.root, PathBuf::from("/srv/archive"));
        assert_eq!(config.reports.root, PathBuf::from("data/reports"));
        assert_eq!(config.analysis.default_degree, 2);
        assert_eq!(config.analysis.stable_tolerance, 0.01);
    }

    #[test]
    fn test_load_rejects_negative_tolerance() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(&path, "[analysis]\nstable_tolerance = -0.5\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[archive]"));
        assert!(toml_str.contains("[reports]"));
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[analysis]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.database.path, PathBuf::from("data/timegraph.db"));
    }
}
