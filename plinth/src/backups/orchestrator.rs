//! Drives the `backups` action: packet assembly, manifest handling, service
//! stop/start around reads and writes, and restore hooks.

use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

use super::archive::{Archive, ArchiveList, Export, ExportList};
use super::manifest::{self, ArchiveManifest};
use super::packet::{Operation, Packet, PacketEntry};
use super::tracker::{OperationKind, OperationTracker};
use super::{is_valid_archive_name, Locations, EXPORT_SUBDIR};
use crate::actions::{output_is_true, Actions};
use crate::app::{AppRegistry, Capability};
use crate::error::{Error, Result};

/// Exit code used by the helper when an archive or export is missing.
const NOT_FOUND_EXIT_CODE: i32 = 2;

/// Exit code used by the helper when the target archive already exists.
const EXISTS_EXIT_CODE: i32 = 5;

#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub repository: PathBuf,
    pub manifests_dir: PathBuf,
    pub export_locations: Vec<PathBuf>,
    pub restore_destination: PathBuf,
}

#[derive(Serialize)]
struct Secrets<'a> {
    encryption_passphrase: &'a str,
}

#[derive(Serialize)]
struct RestoreRequest<'a> {
    #[serde(flatten)]
    locations: &'a Locations,
    #[serde(skip_serializing_if = "Option::is_none")]
    encryption_passphrase: Option<&'a str>,
}

pub struct Backups {
    actions: Arc<dyn Actions>,
    apps: Arc<AppRegistry>,
    settings: BackupSettings,
    // Single writer for everything that changes the repository or restores
    // from it. Listing and info are not serialised.
    lock: Mutex<()>,
    // Repository key given to `setup`, used when a caller supplies none.
    key: RwLock<Option<String>>,
    operations: OperationTracker,
}

impl Backups {
    pub fn new(actions: Arc<dyn Actions>, apps: Arc<AppRegistry>, settings: BackupSettings) -> Self {
        Self {
            actions,
            apps,
            settings,
            lock: Mutex::new(()),
            key: RwLock::new(None),
            operations: OperationTracker::new(),
        }
    }

    pub fn settings(&self) -> &BackupSettings {
        &self.settings
    }

    pub fn operations(&self) -> &OperationTracker {
        &self.operations
    }

    fn repository(&self) -> String {
        self.settings.repository.to_string_lossy().to_string()
    }

    pub fn archive_path(&self, name: &str) -> Result<String> {
        if !is_valid_archive_name(name) {
            return Err(Error::InvalidInput(format!("invalid archive name {name:?}")));
        }
        Ok(format!("{}::{name}", self.repository()))
    }

    /// The caller's passphrase, or else the repository key.
    fn passphrase(&self, explicit: Option<&str>) -> Option<String> {
        explicit.map(str::to_string).or_else(|| {
            self.key
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()
        })
    }

    /// Run a `backups` action as superuser, with the passphrase on stdin
    /// when there is one.
    async fn run_backups(&self, args: &[&str], passphrase: Option<&str>) -> Result<Vec<u8>> {
        let output = match passphrase {
            Some(p) => {
                let input = serde_json::to_vec(&Secrets { encryption_passphrase: p })?;
                self.actions.superuser_run_with_input("backups", args, input).await
            }
            None => self.actions.superuser_run("backups", args).await,
        };
        Ok(output?)
    }

    /// Initialize the repository. A passphrase given here becomes the
    /// repository key for later calls.
    pub async fn setup(&self, passphrase: Option<&str>) -> Result<()> {
        let repository = self.repository();
        self.run_backups(&["setup", "--repository", &repository], passphrase)
            .await?;

        if let Some(p) = passphrase {
            *self.key.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(p.to_string());
        }
        Ok(())
    }

    pub async fn get_info(&self) -> Result<serde_json::Value> {
        let repository = self.repository();
        let passphrase = self.passphrase(None);
        let output = self
            .run_backups(&["info", "--repository", &repository], passphrase.as_deref())
            .await?;
        Ok(serde_json::from_slice(&output)?)
    }

    pub async fn list_archives(&self) -> Result<Vec<Archive>> {
        let passphrase = self.passphrase(None);
        self.list_with(passphrase.as_deref()).await
    }

    async fn list_with(&self, passphrase: Option<&str>) -> Result<Vec<Archive>> {
        let repository = self.repository();
        let output = self
            .run_backups(&["list", "--repository", &repository], passphrase)
            .await?;
        let list: ArchiveList = serde_json::from_slice(&output)?;
        Ok(list.archives)
    }

    pub async fn get_archive(&self, name: &str) -> Result<Archive> {
        let passphrase = self.passphrase(None);
        self.find_archive(name, passphrase.as_deref()).await
    }

    async fn find_archive(&self, name: &str, passphrase: Option<&str>) -> Result<Archive> {
        self.list_with(passphrase)
            .await?
            .into_iter()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::ArchiveNotFound(name.to_string()))
    }

    pub async fn list_exports(&self) -> Result<Vec<Export>> {
        let mut args = vec!["list-exports".to_string()];
        for location in &self.settings.export_locations {
            args.push("--location".into());
            args.push(location.to_string_lossy().to_string());
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let output = self.actions.superuser_run("backups", &args).await?;
        let list: ExportList = serde_json::from_slice(&output)?;
        Ok(list.exports)
    }

    /// Back up the given apps into a new archive and return the manifest
    /// stored with it.
    pub async fn create_archive(
        &self,
        name: &str,
        app_ids: &[String],
        passphrase: Option<&str>,
    ) -> Result<ArchiveManifest> {
        let path = self.archive_path(name)?;
        let passphrase = self.passphrase(passphrase);
        let packet = self
            .select_packet(Operation::Create, app_ids, &path, passphrase.as_deref())
            .await?;

        self.tracked(OperationKind::Create, &path, async {
            let _guard = self.lock.lock().await;
            self.run_create(&packet).await
        })
        .await
    }

    /// Build a packet from the current declarations of the selected apps.
    async fn select_packet(
        &self,
        operation: Operation,
        app_ids: &[String],
        path: &str,
        passphrase: Option<&str>,
    ) -> Result<Packet> {
        if app_ids.is_empty() {
            return Err(Error::InvalidInput("no apps selected".into()));
        }

        let mut entries: Vec<PacketEntry> = Vec::new();
        for id in app_ids {
            if entries.iter().any(|e| e.app.id() == id) {
                continue;
            }
            let app = self.apps.get(id).await?;
            let manifest = app
                .backup()
                .cloned()
                .ok_or_else(|| Error::InvalidInput(format!("app {id} does not support backups")))?;
            entries.push(PacketEntry { app, manifest });
        }

        Ok(Packet::new(operation, entries, path, passphrase.map(str::to_string)))
    }

    async fn run_create(&self, packet: &Packet) -> Result<ArchiveManifest> {
        // The manifest of an existing archive must survive a rejected create.
        let existing = self.settings.manifests_dir.join(manifest::file_name(packet.path()));
        if tokio::fs::try_exists(&existing).await? {
            return Err(Error::ArchiveExists(packet.path().to_string()));
        }

        let manifest = ArchiveManifest::from_packet(packet);
        let manifest_path = manifest::write(&self.settings.manifests_dir, packet.path(), &manifest).await?;

        let locations = packet.locations();
        let mut args: Vec<String> = vec![
            "create-archive".into(),
            "--path".into(),
            packet.path().to_string(),
            "--paths".into(),
        ];
        args.extend(locations.directories.iter().cloned());
        args.extend(locations.files.iter().cloned());
        args.push(manifest_path.to_string_lossy().to_string());
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let result = self
            .with_services_stopped(packet, async {
                self.run_backups(&args, packet.passphrase())
                    .await
                    .map_err(|e| match exit_code(&e) {
                        Some(EXISTS_EXIT_CODE) => Error::ArchiveExists(packet.path().to_string()),
                        _ => e,
                    })
            })
            .await;

        if let Err(e) = result {
            if let Err(rm) = tokio::fs::remove_file(&manifest_path).await {
                tracing::warn!("Failed to remove manifest {}: {rm}", manifest_path.display());
            }
            return Err(e);
        }

        tracing::info!(
            "Created archive {} with apps {:?}",
            packet.path(),
            packet.app_ids()
        );
        Ok(manifest)
    }

    pub async fn delete_archive(&self, name: &str) -> Result<()> {
        let path = self.archive_path(name)?;
        let passphrase = self.passphrase(None);
        self.tracked(OperationKind::Delete, &path, async {
            let _guard = self.lock.lock().await;
            self.find_archive(name, passphrase.as_deref()).await?;
            self.run_backups(&["delete-archive", "--path", &path], passphrase.as_deref())
                .await
                .map_err(|e| not_found_as(e, name))?;

            let manifest_path = self.settings.manifests_dir.join(manifest::file_name(&path));
            if let Err(e) = tokio::fs::remove_file(&manifest_path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove manifest {}: {e}", manifest_path.display());
                }
            }
            tracing::info!("Deleted archive {path}");
            Ok(())
        })
        .await
    }

    /// Copy an archive to one of the configured export locations.
    pub async fn export_archive(
        &self,
        name: &str,
        location: &Path,
        passphrase: Option<&str>,
    ) -> Result<PathBuf> {
        let path = self.archive_path(name)?;
        if !self.settings.export_locations.iter().any(|l| l == location) {
            return Err(Error::InvalidInput(format!(
                "{} is not an export location",
                location.display()
            )));
        }

        let passphrase = self.passphrase(passphrase);
        self.tracked(OperationKind::Export, &path, async {
            let _guard = self.lock.lock().await;
            self.find_archive(name, passphrase.as_deref()).await?;

            let location_arg = location.to_string_lossy().to_string();
            let args = ["export-archive", "--path", path.as_str(), "--location", location_arg.as_str()];
            self.run_backups(&args, passphrase.as_deref())
                .await
                .map_err(|e| match exit_code(&e) {
                    Some(EXISTS_EXIT_CODE) => Error::ArchiveExists(format!("{name} in {}", location.display())),
                    _ => not_found_as(e, name),
                })?;

            let exported = location
                .join(EXPORT_SUBDIR)
                .join(format!("{name}.tar.zst"));
            tracing::info!("Exported archive {path} to {}", exported.display());
            Ok(exported)
        })
        .await
    }

    /// Restore apps from a local archive. Locations come from the manifest
    /// stored in the archive; `app_ids` narrows the restore to a subset.
    /// Returns the restored apps in manifest order.
    pub async fn restore_archive(
        &self,
        name: &str,
        app_ids: Option<&[String]>,
        passphrase: Option<&str>,
    ) -> Result<Vec<String>> {
        let path = self.archive_path(name)?;
        let passphrase = self.passphrase(passphrase);
        let passphrase = passphrase.as_deref();
        self.tracked(OperationKind::Restore, &path, async {
            let _guard = self.lock.lock().await;
            self.find_archive(name, passphrase).await?;

            let stored = self.read_archive_manifest(&path, passphrase).await?;
            let packet = self
                .restore_packet(&stored, app_ids, &path, passphrase)
                .await?;
            self.run_restore(&packet, &["restore-archive", "--path", &path]).await
        })
        .await
    }

    async fn read_archive_manifest(&self, path: &str, passphrase: Option<&str>) -> Result<ArchiveManifest> {
        let manifest_path = self.settings.manifests_dir.join(manifest::file_name(path));
        let manifest_arg = manifest_path.to_string_lossy().to_string();
        let args = ["get-archive-manifest", "--path", path, "--manifest", manifest_arg.as_str()];

        let output = self
            .run_backups(&args, passphrase)
            .await
            .map_err(|e| match exit_code(&e) {
                Some(NOT_FOUND_EXIT_CODE) => Error::MalformedManifest {
                    origin: path.to_string(),
                    reason: "archive has no manifest".into(),
                },
                _ => e,
            })?;

        ArchiveManifest::parse(&output, path)
    }

    async fn restore_packet(
        &self,
        stored: &ArchiveManifest,
        app_ids: Option<&[String]>,
        path: &str,
        passphrase: Option<&str>,
    ) -> Result<Packet> {
        if let Some(ids) = app_ids {
            if let Some(missing) = ids.iter().find(|id| !stored.apps.iter().any(|a| &a.name == *id)) {
                return Err(Error::InvalidInput(format!(
                    "app {missing} is not in archive {path}"
                )));
            }
        }

        let mut entries = Vec::new();
        for entry in &stored.apps {
            if let Some(ids) = app_ids {
                if !ids.contains(&entry.name) {
                    continue;
                }
            }
            let app = self.apps.get(&entry.name).await.map_err(|_| Error::MalformedManifest {
                origin: path.to_string(),
                reason: format!("unknown app {}", entry.name),
            })?;
            entries.push(PacketEntry {
                app,
                manifest: entry.backup.clone(),
            });
        }

        if entries.is_empty() {
            return Err(Error::InvalidInput("no apps selected".into()));
        }
        Ok(Packet::new(Operation::Restore, entries, path, passphrase.map(str::to_string)))
    }

    /// Restore apps from an exported archive file. Locations come from the
    /// current declarations of the named apps.
    pub async fn restore_exported(
        &self,
        file: &Path,
        app_ids: &[String],
        passphrase: Option<&str>,
    ) -> Result<Vec<String>> {
        let in_export_location = self.settings.export_locations.iter().any(|l| {
            file.parent() == Some(l.join(EXPORT_SUBDIR).as_path())
                && file.to_string_lossy().ends_with(".tar.zst")
        });
        if !in_export_location {
            return Err(Error::InvalidInput(format!(
                "{} is not an exported archive",
                file.display()
            )));
        }

        let file_arg = file.to_string_lossy().to_string();
        let packet = self
            .select_packet(Operation::Restore, app_ids, &file_arg, passphrase)
            .await?;

        self.tracked(OperationKind::RestoreExported, &file_arg, async {
            let _guard = self.lock.lock().await;
            self.run_restore(&packet, &["restore-exported-archive", "--path", &file_arg])
                .await
                .map_err(|e| not_found_as(e, &file_arg))
        })
        .await
    }

    async fn run_restore(&self, packet: &Packet, command: &[&str]) -> Result<Vec<String>> {
        let locations = packet.locations();
        let input = serde_json::to_vec(&RestoreRequest {
            locations: &locations,
            encryption_passphrase: packet.passphrase(),
        })?;

        let destination = self.settings.restore_destination.to_string_lossy().to_string();
        let mut args: Vec<&str> = command.to_vec();
        args.extend(["--destination", destination.as_str()]);

        self.with_services_stopped(packet, async {
            self.actions
                .superuser_run_with_input("backups", &args, input)
                .await?;
            Ok(())
        })
        .await?;

        let mut restored = Vec::new();
        for entry in packet.entries() {
            if entry.app.has_capability(Capability::RestoreHook) {
                entry.app.post_restore(self.actions.as_ref()).await?;
            }
            restored.push(entry.app.id().to_string());
        }

        tracing::info!("Restored apps {:?} from {}", restored, packet.path());
        Ok(restored)
    }

    /// Stop the running services of the packet's apps, run `work`, then
    /// start again whatever was stopped, whether or not `work` succeeded.
    async fn with_services_stopped<T, F>(&self, packet: &Packet, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let services = packet.services();
        let mut stopped: Vec<&str> = Vec::new();
        for service in &services {
            let running = self.actions.run("service", &["is-running", service]).await;
            let running = match running {
                Ok(output) => output_is_true(&output),
                Err(e) => {
                    self.start_services(&stopped).await;
                    return Err(e.into());
                }
            };
            if !running {
                continue;
            }
            tracing::info!("Stopping {service} for {:?} of {}", packet.operation(), packet.path());
            if let Err(e) = self.actions.superuser_run("service", &["stop", service]).await {
                self.start_services(&stopped).await;
                return Err(e.into());
            }
            stopped.push(service.as_str());
        }

        let result = work.await;
        self.start_services(&stopped).await;
        result
    }

    async fn start_services(&self, services: &[&str]) {
        for service in services {
            if let Err(e) = self.actions.superuser_run("service", &["start", service]).await {
                tracing::error!("Failed to start service {service}: {e}");
            }
        }
    }

    async fn tracked<T, F>(&self, kind: OperationKind, target: &str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let id = self.operations.request(kind, target);
        self.operations.start(id);
        let result = operation.await;
        match &result {
            Ok(_) => self.operations.succeed(id),
            Err(e) => {
                tracing::error!("Backup operation {kind:?} on {target} failed: {e}");
                self.operations.fail(id, e);
            }
        }
        result
    }
}

fn exit_code(error: &Error) -> Option<i32> {
    match error {
        Error::Action(e) => e.code(),
        _ => None,
    }
}

fn not_found_as(error: Error, name: &str) -> Error {
    match exit_code(&error) {
        Some(NOT_FOUND_EXIT_CODE) => Error::ArchiveNotFound(name.to_string()),
        _ => error,
    }
}
