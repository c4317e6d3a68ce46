//! Configuration management for the mirror.
//!
//! Values come from an optional TOML file, then command-line overrides,
//! then defaults. [`Config::sync_options`] validates the result before any
//! backup directory is touched.

use crate::sync::SyncOptions;
use crate::transfer::TransferMode;
use crate::utils::errors::{MirrorError, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mirror: MirrorConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Directory the backups are taken from
    #[serde(default)]
    pub source: Option<PathBuf>,

    /// Directory the backups are mirrored to
    #[serde(default)]
    pub destination: Option<PathBuf>,

    /// Most recent backups to retain per machine (must be at least 1)
    #[serde(default = "default_keep")]
    pub keep: i64,

    /// Rate limit in KB/s; 0 or anything above 250000000 means unlimited
    #[serde(default)]
    pub rate_limit_kbps: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Values given on the command line; `None` keeps the configured value
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub source: Option<PathBuf>,
    pub destination: Option<PathBuf>,
    pub keep: Option<i64>,
    pub rate_limit_kbps: Option<i64>,
    pub log_level: Option<String>,
}

// Default values
fn default_keep() -> i64 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            source: None,
            destination: None,
            keep: default_keep(),
            rate_limit_kbps: 0,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| MirrorError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MirrorError::Config(e.to_string()))
    }

    /// Apply command-line overrides on top of this configuration
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(source) = overrides.source {
            self.mirror.source = Some(source);
        }
        if let Some(destination) = overrides.destination {
            self.mirror.destination = Some(destination);
        }
        if let Some(keep) = overrides.keep {
            self.mirror.keep = keep;
        }
        if let Some(rate) = overrides.rate_limit_kbps {
            self.mirror.rate_limit_kbps = rate;
        }
        if let Some(level) = overrides.log_level {
            self.log.level = level;
        }
        self
    }

    /// Validate the mirror section into options for a run
    pub fn sync_options(&self) -> Result<SyncOptions> {
        let (Some(source), Some(destination)) =
            (&self.mirror.source, &self.mirror.destination)
        else {
            return Err(MirrorError::Config(
                "source (-s) and destination (-d) are required".to_string(),
            ));
        };

        let keep = usize::try_from(self.mirror.keep)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| {
                MirrorError::Config(format!(
                    "backup count (-c) must be greater than zero, got {}",
                    self.mirror.keep
                ))
            })?;

        if same_directory(source, destination) {
            return Err(MirrorError::Config(format!(
                "source and destination are the same directory: {}",
                source.display()
            )));
        }

        Ok(SyncOptions {
            source: source.clone(),
            destination: destination.clone(),
            keep,
            mode: TransferMode::from_rate_limit(self.mirror.rate_limit_kbps),
        })
    }
}

/// Directories that cannot be resolved are compared as given
fn same_directory(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
