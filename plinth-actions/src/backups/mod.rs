//! The `backups` action: archive repository management.
//!
//! Archives are addressed as `<repository>::<name>`. Paths inside an archive
//! are stored relative to `/`, so restoring into `/` puts every file back
//! where it was taken from.

pub mod borg;
pub mod local;
pub mod tarball;

use clap::Subcommand;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::config::{BackendKind, BackupsConfig};
use crate::utils::{ActionsError, Result};

/// Directory created inside an export location to hold exported archives.
pub const EXPORT_SUBDIR: &str = "FreedomBox-backups";

/// An archive address: repository plus archive name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePath {
    pub repository: PathBuf,
    pub name: String,
}

impl FromStr for ArchivePath {
    type Err = ActionsError;

    fn from_str(s: &str) -> Result<Self> {
        let (repository, name) = s
            .rsplit_once("::")
            .ok_or_else(|| ActionsError::InvalidArchivePath(s.to_string()))?;

        if repository.is_empty() || !is_valid_archive_name(name) {
            return Err(ActionsError::InvalidArchivePath(s.to_string()));
        }

        Ok(Self {
            repository: PathBuf::from(repository),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.repository.display(), self.name)
    }
}

/// Archive names become file names, so they are restricted to a safe set.
pub fn is_valid_archive_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Convert an absolute filesystem path into its name inside an archive.
pub fn archive_relative(path: &Path) -> Result<PathBuf> {
    if !path.is_absolute() {
        return Err(ActionsError::InvalidInput(format!(
            "path must be absolute: {}",
            path.display()
        )));
    }

    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::RootDir | Component::CurDir => {}
            _ => {
                return Err(ActionsError::InvalidInput(format!(
                    "path must not contain '..': {}",
                    path.display()
                )))
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(ActionsError::InvalidInput(
            "refusing to use the root directory itself".to_string(),
        ));
    }

    Ok(relative)
}

/// Directories and files selected for a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locations {
    #[serde(default)]
    pub directories: Vec<PathBuf>,
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

impl Locations {
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }

    /// All locations as archive-relative names.
    pub fn relative_names(&self) -> Result<Vec<PathBuf>> {
        self.directories
            .iter()
            .chain(self.files.iter())
            .map(|p| archive_relative(p))
            .collect()
    }
}

/// Stdin payload of actions that only need secrets.
#[derive(Debug, Default, Deserialize)]
pub struct SecretsInput {
    #[serde(default)]
    pub encryption_passphrase: Option<String>,
}

/// Stdin payload of the restore actions.
#[derive(Debug, Default, Deserialize)]
pub struct RestoreInput {
    #[serde(flatten)]
    pub locations: Locations,
    #[serde(default)]
    pub encryption_passphrase: Option<String>,
}

/// One archive in a repository listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub name: String,
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArchiveList {
    pub archives: Vec<ArchiveEntry>,
}

/// One exported archive file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub location: PathBuf,
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportList {
    pub exports: Vec<ExportEntry>,
}

/// Archive storage implementation.
pub trait Backend {
    fn setup(&self, repository: &Path, passphrase: Option<&str>) -> Result<()>;

    fn info(&self, repository: &Path, passphrase: Option<&str>) -> Result<serde_json::Value>;

    fn list(&self, repository: &Path, passphrase: Option<&str>) -> Result<Vec<ArchiveEntry>>;

    fn create(&self, archive: &ArchivePath, paths: &[PathBuf], passphrase: Option<&str>)
        -> Result<()>;

    fn delete(&self, archive: &ArchivePath, passphrase: Option<&str>) -> Result<()>;

    /// Contents of a single file stored in the archive.
    fn read_file(&self, archive: &ArchivePath, file: &Path, passphrase: Option<&str>)
        -> Result<Vec<u8>>;

    fn extract(
        &self,
        archive: &ArchivePath,
        locations: &Locations,
        destination: &Path,
        passphrase: Option<&str>,
    ) -> Result<()>;

    /// Write the archive as a standalone zstd-compressed tarball.
    fn export(&self, archive: &ArchivePath, target: &Path, passphrase: Option<&str>)
        -> Result<()>;
}

/// Backend selected by the configuration.
pub fn backend(config: &BackupsConfig) -> Box<dyn Backend> {
    match config.backend {
        BackendKind::Tar => Box::new(local::LocalBackend::new(config.compression_level)),
        BackendKind::Borg => Box::new(borg::BorgBackend::new(config.borg_program.clone())),
    }
}

#[derive(Subcommand, Debug)]
pub enum BackupsCommand {
    /// Initialize the repository
    Setup {
        #[arg(long)]
        repository: PathBuf,
    },
    /// Print repository information as JSON
    Info {
        #[arg(long)]
        repository: PathBuf,
    },
    /// List archives as JSON
    List {
        #[arg(long)]
        repository: PathBuf,
    },
    /// Create an archive from a list of absolute paths
    CreateArchive {
        #[arg(long)]
        path: ArchivePath,
        #[arg(long, num_args = 1.., required = true)]
        paths: Vec<PathBuf>,
    },
    /// Delete an archive
    DeleteArchive {
        #[arg(long)]
        path: ArchivePath,
    },
    /// Print a single file stored in an archive
    GetArchiveManifest {
        #[arg(long)]
        path: ArchivePath,
        #[arg(long)]
        manifest: PathBuf,
    },
    /// Restore the locations given on stdin from an archive
    RestoreArchive {
        #[arg(long)]
        path: ArchivePath,
        #[arg(long, default_value = "/")]
        destination: PathBuf,
    },
    /// Copy an archive to an export location
    ExportArchive {
        #[arg(long)]
        path: ArchivePath,
        #[arg(long)]
        location: PathBuf,
    },
    /// List exported archives found in the given locations
    ListExports {
        #[arg(long = "location")]
        locations: Vec<PathBuf>,
    },
    /// Restore the locations given on stdin from an exported archive file
    RestoreExportedArchive {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value = "/")]
        destination: PathBuf,
    },
}

pub fn run(
    command: BackupsCommand,
    config: &BackupsConfig,
    input: &mut dyn Read,
    out: &mut dyn Write,
) -> Result<()> {
    let backend = backend(config);

    match command {
        BackupsCommand::Setup { repository } => {
            let secrets: SecretsInput = read_input(input)?;
            backend.setup(&repository, secrets.encryption_passphrase.as_deref())?;
            info!("Repository ready at {}", repository.display());
        }
        BackupsCommand::Info { repository } => {
            let secrets: SecretsInput = read_input(input)?;
            let info = backend.info(&repository, secrets.encryption_passphrase.as_deref())?;
            write_json(out, &info)?;
        }
        BackupsCommand::List { repository } => {
            let secrets: SecretsInput = read_input(input)?;
            let archives = backend.list(&repository, secrets.encryption_passphrase.as_deref())?;
            write_json(out, &ArchiveList { archives })?;
        }
        BackupsCommand::CreateArchive { path, paths } => {
            let secrets: SecretsInput = read_input(input)?;
            backend.create(&path, &paths, secrets.encryption_passphrase.as_deref())?;
            info!("Created archive {} from {} paths", path, paths.len());
        }
        BackupsCommand::DeleteArchive { path } => {
            let secrets: SecretsInput = read_input(input)?;
            backend.delete(&path, secrets.encryption_passphrase.as_deref())?;
            info!("Deleted archive {}", path);
        }
        BackupsCommand::GetArchiveManifest { path, manifest } => {
            let secrets: SecretsInput = read_input(input)?;
            let content =
                backend.read_file(&path, &manifest, secrets.encryption_passphrase.as_deref())?;
            out.write_all(&content)?;
        }
        BackupsCommand::RestoreArchive { path, destination } => {
            let request: RestoreInput = read_input(input)?;
            if request.locations.is_empty() {
                return Err(ActionsError::InvalidInput("no locations to restore".into()));
            }
            backend.extract(
                &path,
                &request.locations,
                &destination,
                request.encryption_passphrase.as_deref(),
            )?;
            info!("Restored {} into {}", path, destination.display());
        }
        BackupsCommand::ExportArchive { path, location } => {
            let secrets: SecretsInput = read_input(input)?;
            let target = export_file(&location, &path.name);
            if target.exists() {
                return Err(ActionsError::ArchiveExists(target.display().to_string()));
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            backend.export(&path, &target, secrets.encryption_passphrase.as_deref())?;
            info!("Exported {} to {}", path, target.display());
        }
        BackupsCommand::ListExports { locations } => {
            let exports = list_exports(&locations)?;
            write_json(out, &ExportList { exports })?;
        }
        BackupsCommand::RestoreExportedArchive { path, destination } => {
            let request: RestoreInput = read_input(input)?;
            if request.encryption_passphrase.is_some() {
                return Err(ActionsError::Unsupported(
                    "exported archives are not encrypted".into(),
                ));
            }
            if request.locations.is_empty() {
                return Err(ActionsError::InvalidInput("no locations to restore".into()));
            }
            let file = fs::File::open(&path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    ActionsError::ArchiveNotFound(path.display().to_string())
                }
                _ => ActionsError::Io(e),
            })?;
            let count = tarball::extract(file, &request.locations, &destination)?;
            info!(
                "Restored {} entries from {} into {}",
                count,
                path.display(),
                destination.display()
            );
        }
    }

    Ok(())
}

/// Path of an exported archive inside an export location.
pub fn export_file(location: &Path, name: &str) -> PathBuf {
    location
        .join(EXPORT_SUBDIR)
        .join(format!("{}.{}", name, tarball::EXTENSION))
}

fn list_exports(locations: &[PathBuf]) -> Result<Vec<ExportEntry>> {
    let suffix = format!(".{}", tarball::EXTENSION);
    let mut exports = Vec::new();

    for location in locations {
        let dir = location.join(EXPORT_SUBDIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(name) = file_name.strip_suffix(&suffix) else {
                continue;
            };
            if !is_valid_archive_name(name) || !entry.file_type()?.is_file() {
                continue;
            }
            exports.push(ExportEntry {
                location: location.clone(),
                name: name.to_string(),
                path: entry.path(),
                size: entry.metadata()?.len(),
            });
        }
    }

    exports.sort_by(|a, b| (&a.location, &a.name).cmp(&(&b.location, &b.name)));
    Ok(exports)
}

fn read_input<T: DeserializeOwned + Default>(input: &mut dyn Read) -> Result<T> {
    let mut content = String::new();
    input.read_to_string(&mut content)?;
    if content.trim().is_empty() {
        Ok(T::default())
    } else {
        Ok(serde_json::from_str(&content)?)
    }
}

fn write_json<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tar_config() -> BackupsConfig {
        BackupsConfig::default()
    }

    fn run_with(command: BackupsCommand, input: &str) -> Result<String> {
        let mut out = Vec::new();
        run(command, &tar_config(), &mut input.as_bytes(), &mut out)?;
        Ok(String::from_utf8_lossy(&out).to_string())
    }

    #[test]
    fn test_parse_archive_path() {
        let path: ArchivePath = "/var/lib/freedombox/borgbackup::daily-1".parse().unwrap();
        assert_eq!(path.repository, PathBuf::from("/var/lib/freedombox/borgbackup"));
        assert_eq!(path.name, "daily-1");
        assert_eq!(path.to_string(), "/var/lib/freedombox/borgbackup::daily-1");

        assert!("no-separator".parse::<ArchivePath>().is_err());
        assert!("::name".parse::<ArchivePath>().is_err());
        assert!("/repo::".parse::<ArchivePath>().is_err());
        assert!("/repo::../escape".parse::<ArchivePath>().is_err());
        assert!("/repo::.hidden".parse::<ArchivePath>().is_err());
    }

    #[test]
    fn test_archive_relative() {
        assert_eq!(
            archive_relative(Path::new("/etc/openvpn/")).unwrap(),
            PathBuf::from("etc/openvpn")
        );
        assert!(archive_relative(Path::new("relative/path")).is_err());
        assert!(archive_relative(Path::new("/var/../etc")).is_err());
        assert!(archive_relative(Path::new("/")).is_err());
    }

    #[test]
    fn test_restore_input_parsing() {
        let input: RestoreInput = serde_json::from_str(
            r#"{"directories": ["/var/lib/ikiwiki"], "files": [], "encryption_passphrase": "x"}"#,
        )
        .unwrap();
        assert_eq!(input.locations.directories, vec![PathBuf::from("/var/lib/ikiwiki")]);
        assert_eq!(input.encryption_passphrase.as_deref(), Some("x"));

        let empty: RestoreInput = read_input(&mut "".as_bytes()).unwrap();
        assert!(empty.locations.is_empty());
    }

    #[test]
    fn test_export_list_and_restore_exported() -> Result<()> {
        let data = TempDir::new()?;
        let repo = TempDir::new()?;
        let disk = TempDir::new()?;
        let restored = TempDir::new()?;

        let source = data.path().join("wiki");
        fs::create_dir_all(&source)?;
        fs::write(source.join("index.mdwn"), b"# Welcome")?;

        let archive: ArchivePath = format!("{}::weekly", repo.path().display()).parse()?;
        run_with(
            BackupsCommand::Setup {
                repository: repo.path().to_path_buf(),
            },
            "",
        )?;
        run_with(
            BackupsCommand::CreateArchive {
                path: archive.clone(),
                paths: vec![source.clone()],
            },
            "",
        )?;
        run_with(
            BackupsCommand::ExportArchive {
                path: archive.clone(),
                location: disk.path().to_path_buf(),
            },
            "",
        )?;

        let listing = run_with(
            BackupsCommand::ListExports {
                locations: vec![disk.path().to_path_buf()],
            },
            "",
        )?;
        let exports: ExportList = serde_json::from_str(&listing)?;
        assert_eq!(exports.exports.len(), 1);
        assert_eq!(exports.exports[0].name, "weekly");
        assert_eq!(exports.exports[0].path, export_file(disk.path(), "weekly"));

        // Exporting twice must not overwrite the first export
        let again = run_with(
            BackupsCommand::ExportArchive {
                path: archive,
                location: disk.path().to_path_buf(),
            },
            "",
        );
        assert!(matches!(again, Err(ActionsError::ArchiveExists(_))));

        let payload = serde_json::json!({ "directories": [source], "files": [] }).to_string();
        run_with(
            BackupsCommand::RestoreExportedArchive {
                path: exports.exports[0].path.clone(),
                destination: restored.path().to_path_buf(),
            },
            &payload,
        )?;

        let restored_file = restored
            .path()
            .join(archive_relative(&source)?)
            .join("index.mdwn");
        assert_eq!(fs::read(restored_file)?, b"# Welcome");
        Ok(())
    }

    #[test]
    fn test_restore_requires_locations() -> Result<()> {
        let repo = TempDir::new()?;
        let archive: ArchivePath = format!("{}::any", repo.path().display()).parse()?;
        let result = run_with(
            BackupsCommand::RestoreArchive {
                path: archive,
                destination: PathBuf::from("/"),
            },
            r#"{"directories": [], "files": []}"#,
        );
        assert!(matches!(result, Err(ActionsError::InvalidInput(_))));
        Ok(())
    }

    /// A `borg` that refuses to open the repository without its key.
    fn keyed_borg(dir: &Path) -> std::io::Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("borg");
        fs::write(
            &script,
            "#!/bin/sh\n\
             if [ \"$BORG_PASSPHRASE\" != pw ]; then echo 'passphrase required' >&2; exit 2; fi\n\
             case \"$1\" in\n\
             list) echo '{\"archives\": [{\"name\": \"nightly\", \"time\": \"\"}]}' ;;\n\
             info) echo '{\"encryption\": {\"mode\": \"repokey\"}}' ;;\n\
             esac\n",
        )?;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
        Ok(script)
    }

    #[test]
    fn test_encrypted_repository_reads_key_from_stdin() -> Result<()> {
        let dir = TempDir::new()?;
        let config = BackupsConfig {
            backend: BackendKind::Borg,
            borg_program: keyed_borg(dir.path())?.display().to_string(),
            ..BackupsConfig::default()
        };
        let secrets = r#"{"encryption_passphrase": "pw"}"#;
        let repository = PathBuf::from("/repo");

        let mut out = Vec::new();
        run(
            BackupsCommand::List { repository: repository.clone() },
            &config,
            &mut secrets.as_bytes(),
            &mut out,
        )?;
        let listing: ArchiveList = serde_json::from_slice(&out)?;
        assert_eq!(listing.archives[0].name, "nightly");

        let mut out = Vec::new();
        run(
            BackupsCommand::Info { repository: repository.clone() },
            &config,
            &mut secrets.as_bytes(),
            &mut out,
        )?;
        let info: serde_json::Value = serde_json::from_slice(&out)?;
        assert_eq!(info["encryption"]["mode"], "repokey");

        run(
            BackupsCommand::DeleteArchive { path: "/repo::nightly".parse()? },
            &config,
            &mut secrets.as_bytes(),
            &mut Vec::new(),
        )?;

        let without_key = run(
            BackupsCommand::List { repository },
            &config,
            &mut "".as_bytes(),
            &mut Vec::new(),
        );
        let error = without_key.unwrap_err();
        assert!(matches!(error, ActionsError::Command { status: Some(2), .. }));
        assert_eq!(error.exit_code(), 1);
        Ok(())
    }

    #[test]
    fn test_restore_exported_rejects_passphrase() -> Result<()> {
        let disk = TempDir::new()?;
        let file = export_file(disk.path(), "weekly");
        let result = run_with(
            BackupsCommand::RestoreExportedArchive {
                path: file,
                destination: PathBuf::from("/"),
            },
            r#"{"directories": ["/var/lib/ikiwiki"], "files": [], "encryption_passphrase": "pw"}"#,
        );
        assert!(matches!(result, Err(ActionsError::Unsupported(_))));
        Ok(())
    }

    #[test]
    fn test_list_exports_skips_missing_locations() -> Result<()> {
        let listing = run_with(
            BackupsCommand::ListExports {
                locations: vec![PathBuf::from("/nonexistent/disk")],
            },
            "",
        )?;
        let exports: ExportList = serde_json::from_str(&listing)?;
        assert!(exports.exports.is_empty());
        Ok(())
    }
}
