use crate::app::{ActionHook, App, Component, Info, Menu};
use crate::backups::BackupManifest;
use crate::config::AppConfig;
use crate::error::Result;

pub const APP_ID: &str = "backups";

pub fn app(config: &AppConfig) -> Result<App> {
    let repository = config.backup_repository.to_string_lossy().to_string();
    App::builder(Info::new(APP_ID, 1, "Backups").description("Backups allows creating and managing backup archives."))
        .packages(&["borgbackup"])
        .component(Component::Menu(Menu::new("menu-backups", "Backups", "fa-files-o", "backups:index", "system")))
        .backup(BackupManifest::new().data_directories([config.manifests_dir.to_string_lossy().to_string()]))
        .on_setup(ActionHook::new("backups", &["setup", "--repository", &repository]))
        .build()
}
