//! Configuration management for the privileged actions.
//!
//! Loads configuration from a TOML file. A missing file means defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::{ActionsError, Result};

/// Location used when no explicit path is configured.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/plinth/actions.toml";

/// Environment variable overriding [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_ENV: &str = "PLINTH_ACTIONS_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backups: BackupsConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Native tar + zstd archives, one file per archive
    Tar,
    /// BorgBackup repository driven through the `borg` CLI
    Borg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupsConfig {
    /// Archive storage backend
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Compression level (1-22 for zstd)
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,

    /// Program used by the borg backend
    #[serde(default = "default_borg_program")]
    pub borg_program: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_backend() -> BackendKind {
    BackendKind::Tar
}

fn default_compression_level() -> i32 {
    3
}

fn default_borg_program() -> String {
    "borg".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for BackupsConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            compression_level: default_compression_level(),
            borg_program: default_borg_program(),
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
        toml::from_str(&content)
            .map_err(|e| ActionsError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load the explicit file, else the environment override, else the
    /// default location if it exists, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }
}
