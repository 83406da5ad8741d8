//! BorgBackup repository driven through the `borg` command line.

use serde::Deserialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use super::{archive_relative, ArchiveEntry, ArchivePath, Backend, Locations};
use crate::exec::SystemCommand;
use crate::utils::{ActionsError, Result};

pub struct BorgBackend {
    program: String,
}

#[derive(Debug, Deserialize)]
struct BorgList {
    archives: Vec<BorgArchive>,
}

#[derive(Debug, Deserialize)]
struct BorgArchive {
    name: String,
    #[serde(default)]
    time: String,
}

impl BorgBackend {
    pub fn new(program: String) -> Self {
        Self { program }
    }

    fn command(&self, args: Vec<OsString>, passphrase: Option<&str>) -> SystemCommand<'_> {
        let command = SystemCommand::new(&self.program, args);
        match passphrase {
            Some(passphrase) => command.env("BORG_PASSPHRASE", passphrase),
            None => command,
        }
    }
}

fn args<I, S>(items: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    items.into_iter().map(Into::into).collect()
}

impl Backend for BorgBackend {
    fn setup(&self, repository: &Path, passphrase: Option<&str>) -> Result<()> {
        if repository.join("config").exists() {
            return Ok(());
        }

        let encryption = if passphrase.is_some() {
            "--encryption=repokey"
        } else {
            "--encryption=none"
        };
        self.command(
            args([OsString::from("init"), encryption.into(), repository.into()]),
            passphrase,
        )
        .run()
    }

    fn info(&self, repository: &Path, passphrase: Option<&str>) -> Result<serde_json::Value> {
        let output = self
            .command(
                args([OsString::from("info"), "--json".into(), repository.into()]),
                passphrase,
            )
            .output()?;
        Ok(serde_json::from_slice(&output)?)
    }

    fn list(&self, repository: &Path, passphrase: Option<&str>) -> Result<Vec<ArchiveEntry>> {
        let output = self
            .command(
                args([OsString::from("list"), "--json".into(), repository.into()]),
                passphrase,
            )
            .output()?;
        let listing: BorgList = serde_json::from_slice(&output)?;

        Ok(listing
            .archives
            .into_iter()
            .map(|archive| ArchiveEntry {
                name: archive.name,
                time: archive.time,
                size: None,
            })
            .collect())
    }

    fn create(&self, archive: &ArchivePath, paths: &[PathBuf], passphrase: Option<&str>)
        -> Result<()> {
        for path in paths {
            archive_relative(path)?;
        }

        let mut command = args(["create".to_string(), archive.to_string()]);
        command.extend(paths.iter().map(OsString::from));
        self.command(command, passphrase).run()
    }

    fn delete(&self, archive: &ArchivePath, passphrase: Option<&str>) -> Result<()> {
        self.command(args(["delete".to_string(), archive.to_string()]), passphrase)
            .run()
    }

    fn read_file(&self, archive: &ArchivePath, file: &Path, passphrase: Option<&str>)
        -> Result<Vec<u8>> {
        let relative = archive_relative(file)?;
        self.command(
            args([
                OsString::from("extract"),
                "--stdout".into(),
                archive.to_string().into(),
                relative.into(),
            ]),
            passphrase,
        )
        .output()
    }

    fn extract(
        &self,
        archive: &ArchivePath,
        locations: &Locations,
        destination: &Path,
        passphrase: Option<&str>,
    ) -> Result<()> {
        let names = locations.relative_names()?;
        if names.is_empty() {
            return Err(ActionsError::InvalidInput("no locations to restore".into()));
        }

        fs::create_dir_all(destination)?;
        let mut command = args(["extract".to_string(), archive.to_string()]);
        command.extend(names.into_iter().map(OsString::from));
        self.command(command, passphrase)
            .current_dir(destination)
            .run()
    }

    fn export(&self, archive: &ArchivePath, target: &Path, passphrase: Option<&str>)
        -> Result<()> {
        let partial = target.with_extension("partial");
        let result = self
            .command(
                args([
                    OsString::from("export-tar"),
                    "--tar-filter=zstd".into(),
                    archive.to_string().into(),
                    partial.clone().into(),
                ]),
                passphrase,
            )
            .run();

        match result {
            Ok(()) => Ok(fs::rename(&partial, target)?),
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// A stand-in `borg` that records its arguments and prints a canned listing.
    fn fake_borg(dir: &Path) -> std::io::Result<PathBuf> {
        let script = dir.join("borg");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$@\" >> {log}\necho \"pass=$BORG_PASSPHRASE\" >> {log}\n\
                 if [ \"$1\" = list ]; then echo '{{\"archives\": [{{\"name\": \"a1\", \"time\": \"2019-01-01T00:00:00.000000\"}}]}}'; fi\n",
                log = dir.join("calls.log").display()
            ),
        )?;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
        Ok(script)
    }

    #[test]
    fn test_list_parses_borg_json() -> Result<()> {
        let dir = TempDir::new()?;
        let borg = BorgBackend::new(fake_borg(dir.path())?.display().to_string());

        let archives = borg.list(Path::new("/repo"), None)?;
        assert_eq!(archives.len(), 1);
        assert_eq!(archives[0].name, "a1");
        assert_eq!(archives[0].size, None);
        Ok(())
    }

    #[test]
    fn test_create_passes_paths_and_passphrase() -> Result<()> {
        let dir = TempDir::new()?;
        let borg = BorgBackend::new(fake_borg(dir.path())?.display().to_string());
        let archive: ArchivePath = "/repo::nightly".parse()?;

        borg.create(
            &archive,
            &[PathBuf::from("/var/lib/ikiwiki"), PathBuf::from("/etc/ikiwiki")],
            Some("s3cret"),
        )?;

        let log = fs::read_to_string(dir.path().join("calls.log"))?;
        assert!(log.contains("create /repo::nightly /var/lib/ikiwiki /etc/ikiwiki"));
        assert!(log.contains("pass=s3cret"));
        Ok(())
    }

    #[test]
    fn test_extract_uses_relative_names() -> Result<()> {
        let dir = TempDir::new()?;
        let dest = TempDir::new()?;
        let borg = BorgBackend::new(fake_borg(dir.path())?.display().to_string());
        let archive: ArchivePath = "/repo::nightly".parse()?;

        borg.extract(
            &archive,
            &Locations {
                directories: vec![PathBuf::from("/var/lib/ikiwiki/")],
                files: vec![PathBuf::from("/etc/coquelicot/settings.yml")],
            },
            dest.path(),
            None,
        )?;

        let log = fs::read_to_string(dir.path().join("calls.log"))?;
        assert!(log.contains("extract /repo::nightly var/lib/ikiwiki etc/coquelicot/settings.yml"));
        Ok(())
    }

    #[test]
    fn test_missing_program_is_io_error() {
        let borg = BorgBackend::new("/nonexistent/borg".to_string());
        assert!(matches!(
            borg.list(Path::new("/repo"), None),
            Err(ActionsError::Io(_))
        ));
    }
}
