use crate::app::{App, Component, Daemon, Firewall, Info, Menu};
use crate::backups::BackupManifest;
use crate::error::Result;

pub fn app() -> Result<App> {
    App::builder(Info::new("coquelicot", 1, "Coquelicot").description("File Sharing"))
        .packages(&["coquelicot"])
        .component(Component::Menu(Menu::new("menu-coquelicot", "Coquelicot", "coquelicot", "coquelicot:index", "apps")))
        .component(Component::Firewall(Firewall::new("firewall-coquelicot", "Coquelicot", &["http", "https"], true)))
        .component(Component::Daemon(Daemon::new("daemon-coquelicot", "coquelicot")))
        .backup(
            BackupManifest::new()
                .data_directories(["/var/lib/coquelicot"])
                .secret_files(["/etc/coquelicot/settings.yml"])
                .services(["coquelicot"]),
        )
        .enable_after_setup()
        .build()
}
