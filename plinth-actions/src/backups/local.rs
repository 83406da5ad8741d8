//! Native repository: one `<name>.tar.zst` file per archive.
//!
//! Archives are written to a temporary file inside the repository and
//! persisted without clobbering, so a failed or concurrent create never
//! leaves a partial archive under the final name.

use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use super::{tarball, ArchiveEntry, ArchivePath, Backend, Locations};
use crate::utils::{ActionsError, Result};

pub struct LocalBackend {
    compression_level: i32,
}

impl LocalBackend {
    pub fn new(compression_level: i32) -> Self {
        Self { compression_level }
    }

    fn archive_file(archive: &ArchivePath) -> PathBuf {
        archive
            .repository
            .join(format!("{}.{}", archive.name, tarball::EXTENSION))
    }

    fn open(archive: &ArchivePath) -> Result<File> {
        File::open(Self::archive_file(archive)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ActionsError::ArchiveNotFound(archive.to_string()),
            _ => ActionsError::Io(e),
        })
    }

    fn ensure_repository(repository: &Path) -> Result<()> {
        if repository.is_dir() {
            Ok(())
        } else {
            Err(ActionsError::RepositoryNotFound(
                repository.display().to_string(),
            ))
        }
    }
}

fn reject_passphrase(passphrase: Option<&str>) -> Result<()> {
    match passphrase {
        Some(_) => Err(ActionsError::Unsupported(
            "the tar backend does not support encryption".to_string(),
        )),
        None => Ok(()),
    }
}

/// Move a finished temporary file to `target`, failing if it exists.
fn persist_new(tmp: NamedTempFile, target: &Path) -> Result<()> {
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(target).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            ActionsError::ArchiveExists(target.display().to_string())
        } else {
            ActionsError::Io(e.error)
        }
    })?;
    Ok(())
}

impl Backend for LocalBackend {
    fn setup(&self, repository: &Path, passphrase: Option<&str>) -> Result<()> {
        reject_passphrase(passphrase)?;
        fs::create_dir_all(repository)?;
        fs::set_permissions(repository, fs::Permissions::from_mode(0o700))?;
        Ok(())
    }

    fn info(&self, repository: &Path, passphrase: Option<&str>) -> Result<serde_json::Value> {
        let archives = self.list(repository, passphrase)?;
        let size: u64 = WalkDir::new(repository)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.metadata().ok())
            .filter(|metadata| metadata.is_file())
            .map(|metadata| metadata.len())
            .sum();

        Ok(serde_json::json!({
            "backend": "tar",
            "encrypted": false,
            "repository": repository,
            "archives": archives.len(),
            "size": size,
        }))
    }

    fn list(&self, repository: &Path, passphrase: Option<&str>) -> Result<Vec<ArchiveEntry>> {
        reject_passphrase(passphrase)?;
        Self::ensure_repository(repository)?;
        let suffix = format!(".{}", tarball::EXTENSION);

        let mut archives = Vec::new();
        for entry in fs::read_dir(repository)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(name) = file_name.strip_suffix(&suffix) else {
                continue;
            };
            if !super::is_valid_archive_name(name) {
                continue;
            }

            let metadata = entry.metadata()?;
            let time: DateTime<Utc> = metadata.modified()?.into();
            archives.push(ArchiveEntry {
                name: name.to_string(),
                time: time.to_rfc3339(),
                size: Some(metadata.len()),
            });
        }

        archives.sort_by(|a, b| (&a.time, &a.name).cmp(&(&b.time, &b.name)));
        Ok(archives)
    }

    fn create(&self, archive: &ArchivePath, paths: &[PathBuf], passphrase: Option<&str>)
        -> Result<()> {
        reject_passphrase(passphrase)?;
        Self::ensure_repository(&archive.repository)?;

        let target = Self::archive_file(archive);
        if target.exists() {
            return Err(ActionsError::ArchiveExists(archive.to_string()));
        }

        let tmp = NamedTempFile::new_in(&archive.repository)?;
        tarball::write(tmp.as_file(), paths, self.compression_level)?;
        persist_new(tmp, &target)
    }

    fn delete(&self, archive: &ArchivePath, passphrase: Option<&str>) -> Result<()> {
        reject_passphrase(passphrase)?;
        fs::remove_file(Self::archive_file(archive)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ActionsError::ArchiveNotFound(archive.to_string()),
            _ => ActionsError::Io(e),
        })
    }

    fn read_file(&self, archive: &ArchivePath, file: &Path, passphrase: Option<&str>)
        -> Result<Vec<u8>> {
        reject_passphrase(passphrase)?;
        tarball::read_entry(Self::open(archive)?, file)
    }

    fn extract(
        &self,
        archive: &ArchivePath,
        locations: &Locations,
        destination: &Path,
        passphrase: Option<&str>,
    ) -> Result<()> {
        reject_passphrase(passphrase)?;
        tarball::extract(Self::open(archive)?, locations, destination)?;
        Ok(())
    }

    fn export(&self, archive: &ArchivePath, target: &Path, passphrase: Option<&str>)
        -> Result<()> {
        reject_passphrase(passphrase)?;
        let mut source = Self::open(archive)?;
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        std::io::copy(&mut source, tmp.as_file_mut())?;
        persist_new(tmp, target)
    }
}
