//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::description::DeviceFamily;
use crate::error::{Result, SchemaError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub families: Vec<FamilyConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One device family and where its descriptions live
#[derive(Debug, Deserialize, Clone)]
pub struct FamilyConfig {
    pub family: DeviceFamily,

    /// Directory holding the `*.xml` description files
    pub directory: PathBuf,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write a daily rolling log file here in addition to stdout
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            file_prefix: default_file_prefix(),
        }
    }
}

// Default value functions
fn default_log_level() -> String { "info".to_string() }
fn default_file_prefix() -> String { "hm-device-schema.log".to_string() }

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn invalid(message: impl std::fmt::Display) -> SchemaError {
    SchemaError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hm_device_schema::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.families.is_empty() {
            return Err(invalid("at least one [[families]] entry is required"));
        }

        let mut seen = BTreeSet::new();
        for entry in &self.families {
            if !seen.insert(entry.family) {
                return Err(invalid(format!("family {} is configured twice", entry.family)));
            }
            if entry.directory.as_os_str().is_empty() {
                return Err(invalid(format!("directory of family {} cannot be empty", entry.family)));
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "logging level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        if self.logging.directory.is_some() && self.logging.file_prefix.is_empty() {
            return Err(invalid("logging file_prefix cannot be empty when a directory is set"));
        }

        Ok(())
    }
}
