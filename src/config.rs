//! Configuration module for the nmapflow scanner front-end

use crate::{Result, ScanError};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// nmap time specification: a number with an optional ms/s/m/h suffix
static TIME_SPEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)?(ms|s|m|h)?$").expect("valid time regex"));

/// Settings for invoking the external nmap binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Path or name of the nmap executable
    pub nmap_path: String,

    /// Arguments prepended to every scan's own arguments
    pub default_args: Vec<String>,

    /// Upper bound for one scan, in seconds
    pub timeout_secs: u64,

    /// Where multi-format output is written; the system temp dir when unset
    pub temp_dir: Option<PathBuf>,

    /// Value for `--stats-every` in background scans
    pub status_interval: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            nmap_path: "nmap".to_string(),
            default_args: Vec::new(),
            timeout_secs: 3600,
            temp_dir: None,
            status_interval: "5s".to_string(),
        }
    }
}

impl ScannerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the nmap executable
    pub fn with_nmap_path(mut self, path: impl Into<String>) -> Self {
        self.nmap_path = path.into();
        self
    }

    /// Set the arguments added to every scan
    pub fn with_default_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the timeout in seconds
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_status_interval(mut self, interval: impl Into<String>) -> Self {
        self.status_interval = interval.into();
        self
    }

    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ScanError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: ScannerConfig = toml::from_str(&content)
            .map_err(|e| ScanError::ConfigError(format!("Failed to parse TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `~/.nmapflow.toml`, or the defaults
    pub fn load_default_config() -> Self {
        let Some(home_dir) = dirs::home_dir() else {
            return Self::default();
        };

        let path = home_dir.join(".nmapflow.toml");
        if path.exists() {
            match Self::from_toml_file(&path) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    return config;
                }
                Err(e) => debug!("Ignoring {}: {}", path.display(), e),
            }
        }

        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.nmap_path.trim().is_empty() {
            return Err(ScanError::ConfigError("nmap path cannot be empty".to_string()));
        }

        if self.timeout_secs == 0 {
            return Err(ScanError::ConfigError(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if !TIME_SPEC.is_match(&self.status_interval) {
            return Err(ScanError::ConfigError(format!(
                "Invalid status interval: {}",
                self.status_interval
            )));
        }

        Ok(())
    }
}
