use crate::app::{ActionHook, App, Component, Info, Menu};
use crate::backups::BackupManifest;
use crate::error::Result;

pub fn app() -> Result<App> {
    App::builder(Info::new("security", 6, "Security").essential())
        .packages(&["fail2ban", "debsecan"])
        .component(Component::Menu(Menu::new("menu-security", "Security", "fa-lock", "security:index", "system")))
        .backup(BackupManifest::new().config_files(["/etc/security/access.d/50freedombox.conf"]))
        .on_setup(ActionHook::new("service", &["unmask", "fail2ban"]))
        .on_setup(ActionHook::new("service", &["enable", "fail2ban"]))
        .on_setup(ActionHook::new("service", &["reload", "fail2ban"]))
        .on_restore(ActionHook::new("service", &["reload", "fail2ban"]))
        .build()
}
