use std::path::PathBuf;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub log_level: String,
    pub hostname: String,
    /// Directory holding one executable per privileged action
    pub actions_dir: PathBuf,
    /// Program and arguments prefixed to superuser actions
    pub superuser_command: Vec<String>,
    pub manifests_dir: PathBuf,
    pub backup_repository: PathBuf,
    pub export_locations: Vec<PathBuf>,
    pub restore_destination: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(v) => v
                .parse()
                .map_err(|_| Error::Config(format!("invalid PORT: {v}")))?,
            None => 8000,
        };

        let superuser_command = lookup("PLINTH_SUPERUSER_COMMAND")
            .unwrap_or_else(|| "sudo -n".into())
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let export_locations = lookup("PLINTH_EXPORT_LOCATIONS")
            .unwrap_or_else(|| "/media".into())
            .split(':')
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();

        let hostname = lookup("PLINTH_HOSTNAME")
            .or_else(|| hostname::get().ok().and_then(|h| h.into_string().ok()))
            .unwrap_or_else(|| "freedombox".into());

        let config = Self {
            port,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            hostname,
            actions_dir: PathBuf::from(
                lookup("PLINTH_ACTIONS_DIR").unwrap_or_else(|| "/usr/share/plinth/actions".into()),
            ),
            superuser_command,
            manifests_dir: PathBuf::from(
                lookup("PLINTH_MANIFESTS_DIR")
                    .unwrap_or_else(|| "/var/lib/plinth/backups-manifests".into()),
            ),
            backup_repository: PathBuf::from(
                lookup("PLINTH_BACKUP_REPOSITORY")
                    .unwrap_or_else(|| "/var/lib/freedombox/borgbackup".into()),
            ),
            export_locations,
            restore_destination: PathBuf::from(
                lookup("PLINTH_RESTORE_DESTINATION").unwrap_or_else(|| "/".into()),
            ),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("PLINTH_ACTIONS_DIR", &self.actions_dir),
            ("PLINTH_MANIFESTS_DIR", &self.manifests_dir),
            ("PLINTH_BACKUP_REPOSITORY", &self.backup_repository),
            ("PLINTH_RESTORE_DESTINATION", &self.restore_destination),
        ] {
            if !path.is_absolute() {
                return Err(Error::Config(format!(
                    "{name} must be an absolute path: {}",
                    path.display()
                )));
            }
        }

        if self.backup_repository.to_string_lossy().contains("::") {
            return Err(Error::Config(
                "PLINTH_BACKUP_REPOSITORY must not contain '::'".into(),
            ));
        }

        Ok(())
    }
}
