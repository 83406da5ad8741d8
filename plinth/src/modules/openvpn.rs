use crate::app::{App, Component, Daemon, Firewall, Info, Menu, Shortcut};
use crate::backups::BackupManifest;
use crate::error::Result;

pub fn app() -> Result<App> {
    App::builder(Info::new("openvpn", 4, "OpenVPN").description("Virtual Private Network"))
        .packages(&["openvpn", "easy-rsa"])
        .component(Component::Menu(Menu::new("menu-openvpn", "OpenVPN", "openvpn", "openvpn:index", "apps")))
        .component(Component::Shortcut(Shortcut {
            component_id: "shortcut-openvpn".into(),
            name: "OpenVPN".into(),
            url: None,
            login_required: true,
        }))
        .component(Component::Firewall(Firewall::new("firewall-openvpn", "OpenVPN", &["openvpn"], true)))
        .component(Component::Daemon(Daemon::new("daemon-openvpn", "openvpn-server@freedombox")))
        .backup(
            BackupManifest::new()
                .secret_directories(["/etc/openvpn/"])
                .services(["openvpn-server@freedombox"]),
        )
        .build()
}
