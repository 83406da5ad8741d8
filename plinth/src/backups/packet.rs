use std::sync::Arc;

use super::{BackupManifest, Locations};
use crate::app::App;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Restore,
}

/// An app taking part in an operation, with the manifest that applies: the
/// app's current declaration on create, or the one stored in the archive on
/// restore.
#[derive(Clone)]
pub struct PacketEntry {
    pub app: Arc<App>,
    pub manifest: BackupManifest,
}

/// Everything one backup or restore needs, built per request.
#[derive(Clone)]
pub struct Packet {
    operation: Operation,
    entries: Vec<PacketEntry>,
    path: String,
    passphrase: Option<String>,
}

impl Packet {
    pub fn new(
        operation: Operation,
        entries: Vec<PacketEntry>,
        path: impl Into<String>,
        passphrase: Option<String>,
    ) -> Self {
        Self {
            operation,
            entries,
            path: path.into(),
            passphrase,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn entries(&self) -> &[PacketEntry] {
        &self.entries
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }

    pub fn app_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.app.id().to_string()).collect()
    }

    pub fn locations(&self) -> Locations {
        let mut locations = Locations::default();
        for entry in &self.entries {
            locations.extend(&entry.manifest.locations());
        }
        locations
    }

    pub fn services(&self) -> Vec<String> {
        let mut services: Vec<String> = Vec::new();
        for entry in &self.entries {
            for service in &entry.manifest.services {
                if !services.contains(service) {
                    services.push(service.clone());
                }
            }
        }
        services
    }
}
