use crate::app::{App, Component, Daemon, Firewall, Info, Menu};
use crate::backups::BackupManifest;
use crate::error::Result;

pub fn app() -> Result<App> {
    App::builder(Info::new("minidlna", 1, "MiniDLNA").description("Simple Media Server"))
        .packages(&["minidlna"])
        .component(Component::Menu(Menu::new("menu-minidlna", "MiniDLNA", "minidlna", "minidlna:index", "apps")))
        .component(Component::Firewall(Firewall::new("firewall-minidlna", "MiniDLNA", &["minidlna"], false)))
        .component(Component::Daemon(Daemon::new("daemon-minidlna", "minidlna")))
        .backup(BackupManifest::new().data_directories(["/var/lib/minidlna"]).services(["minidlna"]))
        .enable_after_setup()
        .build()
}
