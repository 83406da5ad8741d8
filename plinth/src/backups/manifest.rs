//! The manifest stored inside every archive, listing the apps it contains.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::packet::Packet;
use super::{BackupManifest, Locations};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    pub name: String,
    pub version: u32,
    pub backup: BackupManifest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub apps: Vec<AppEntry>,
}

impl ArchiveManifest {
    pub fn from_packet(packet: &Packet) -> Self {
        let apps = packet
            .entries()
            .iter()
            .map(|entry| AppEntry {
                name: entry.app.id().to_string(),
                version: entry.app.version(),
                backup: entry.manifest.clone(),
            })
            .collect();
        Self { apps }
    }

    /// Parse a manifest read back from an archive. `origin` names the
    /// archive in error messages.
    pub fn parse(bytes: &[u8], origin: &str) -> Result<Self> {
        let malformed = |reason: String| Error::MalformedManifest {
            origin: origin.to_string(),
            reason,
        };

        let manifest: Self =
            serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;
        if manifest.apps.is_empty() {
            return Err(malformed("no apps listed".into()));
        }
        for entry in &manifest.apps {
            entry
                .backup
                .validate(&entry.name)
                .map_err(|e| malformed(e.to_string()))?;
        }
        Ok(manifest)
    }

    pub fn app_names(&self) -> Vec<&str> {
        self.apps.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn locations(&self) -> Locations {
        let mut locations = Locations::default();
        for entry in &self.apps {
            locations.extend(&entry.backup.locations());
        }
        locations
    }
}

/// File name of the manifest written for `archive_path`.
pub fn file_name(archive_path: &str) -> String {
    let sanitized: String = archive_path
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{sanitized}.json")
}

/// Write the manifest next to earlier ones and return its path. The file is
/// replaced atomically so a concurrent reader never sees half a manifest.
pub async fn write(dir: &Path, archive_path: &str, manifest: &ArchiveManifest) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let path = dir.join(file_name(archive_path));
    let tmp = dir.join(format!(".{}.partial", file_name(archive_path)));
    let json = serde_json::to_vec_pretty(manifest)?;

    tokio::fs::write(&tmp, &json).await?;
    if let Err(e) = tokio::fs::rename(&tmp, &path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    tracing::debug!("Wrote backup manifest {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_name_is_sanitized() {
        assert_eq!(
            file_name("/var/lib/freedombox/borgbackup::nightly"),
            "_var_lib_freedombox_borgbackup__nightly.json"
        );
        assert_eq!(file_name("repo::a.b-c_d"), "repo__a.b-c_d.json");
    }

    #[test]
    fn test_parse_wire_format() {
        let manifest = ArchiveManifest::parse(
            br#"{"apps": [{"name": "minidlna", "version": 1,
                 "backup": {"data": {"directories": ["/var/lib/minidlna"]}}}]}"#,
            "repo::a",
        )
        .unwrap();
        assert_eq!(manifest.app_names(), vec!["minidlna"]);
        assert_eq!(manifest.locations().directories, vec!["/var/lib/minidlna"]);
        assert!(manifest.locations().files.is_empty());
    }

    #[test]
    fn test_parse_rejects_corrupt_manifests() {
        for input in [
            &b"not json"[..],
            br#"{"apps": []}"#,
            br#"{"apps": [{"name": "x", "version": 1, "backup": {"data": {"directories": ["relative"]}}}]}"#,
        ] {
            let err = ArchiveManifest::parse(input, "repo::a").unwrap_err();
            assert!(matches!(err, Error::MalformedManifest { .. }));
        }
    }

    #[tokio::test]
    async fn test_write_creates_directory_and_file() {
        let dir = TempDir::new().unwrap();
        let manifests = dir.path().join("manifests");
        let manifest = ArchiveManifest {
            apps: vec![AppEntry {
                name: "ikiwiki".into(),
                version: 1,
                backup: BackupManifest::new().data_directories(["/var/lib/ikiwiki"]),
            }],
        };

        let path = write(&manifests, "/repo::first", &manifest).await.unwrap();
        assert_eq!(path, manifests.join("_repo__first.json"));

        let stored: ArchiveManifest =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(stored, manifest);
        assert_eq!(std::fs::read_dir(&manifests).unwrap().count(), 1);
    }
}
