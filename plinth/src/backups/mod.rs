//! Backup and restore of app data.
//!
//! Apps declare what they own in a [`BackupManifest`]; the orchestrator turns
//! a selection of apps into a packet, writes the archive manifest and drives
//! the `backups` action. Archives themselves are never cached here.

pub mod archive;
pub mod manifest;
pub mod orchestrator;
pub mod packet;
pub mod tracker;

pub use archive::{Archive, Export};
pub use manifest::ArchiveManifest;
pub use orchestrator::{BackupSettings, Backups};
pub use packet::{Operation, Packet};
pub use tracker::{OperationKind, OperationRecord, OperationState, OperationTracker};

use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

use crate::error::{Error, Result};

/// Directory holding exported archives below each export location.
pub const EXPORT_SUBDIR: &str = "FreedomBox-backups";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locations {
    #[serde(default)]
    pub directories: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

impl Locations {
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }

    /// Append the entries of `other` not already present, keeping order.
    pub fn extend(&mut self, other: &Locations) {
        for dir in &other.directories {
            if !self.directories.contains(dir) {
                self.directories.push(dir.clone());
            }
        }
        for file in &other.files {
            if !self.files.contains(file) {
                self.files.push(file.clone());
            }
        }
    }
}

/// What an app wants saved: configuration, data and secrets, plus the
/// services to stop while its files are read or replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupManifest {
    #[serde(default, skip_serializing_if = "Locations::is_empty")]
    pub config: Locations,
    #[serde(default, skip_serializing_if = "Locations::is_empty")]
    pub data: Locations,
    #[serde(default, skip_serializing_if = "Locations::is_empty")]
    pub secrets: Locations,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
}

impl BackupManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.files.extend(files.into_iter().map(Into::into));
        self
    }

    pub fn config_directories<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.directories.extend(dirs.into_iter().map(Into::into));
        self
    }

    pub fn data_directories<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data.directories.extend(dirs.into_iter().map(Into::into));
        self
    }

    pub fn secret_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secrets.files.extend(files.into_iter().map(Into::into));
        self
    }

    pub fn secret_directories<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secrets.directories.extend(dirs.into_iter().map(Into::into));
        self
    }

    pub fn services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services.extend(services.into_iter().map(Into::into));
        self
    }

    /// Union of the config, data and secrets groups.
    pub fn locations(&self) -> Locations {
        let mut locations = Locations::default();
        locations.extend(&self.config);
        locations.extend(&self.data);
        locations.extend(&self.secrets);
        locations
    }

    pub fn validate(&self, app: &str) -> Result<()> {
        let invalid = |reason: String| Error::InvalidManifest {
            app: app.to_string(),
            reason,
        };

        let locations = self.locations();
        for path in locations.directories.iter().chain(&locations.files) {
            if !is_valid_location(path) {
                return Err(invalid(format!("invalid path {path:?}")));
            }
        }

        for service in &self.services {
            if service.trim().is_empty() || service.contains(char::is_whitespace) {
                return Err(invalid(format!("invalid service name {service:?}")));
            }
        }

        Ok(())
    }
}

fn is_valid_location(path: &str) -> bool {
    let path = Path::new(path);
    path.is_absolute()
        && path.parent().is_some()
        && path.components().all(|c| !matches!(c, Component::ParentDir))
}

/// Archive names become file names and `<repository>::<name>` paths.
pub fn is_valid_archive_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
