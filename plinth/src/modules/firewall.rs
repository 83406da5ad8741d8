use crate::app::{ActionHook, App, Component, Daemon, Info, Menu};
use crate::error::Result;

pub fn app() -> Result<App> {
    App::builder(Info::new("firewall", 2, "Firewall").essential())
        .packages(&["firewalld", "nftables"])
        .component(Component::Menu(Menu::new("menu-firewall", "Firewall", "fa-shield", "firewall:index", "system")))
        .component(Component::Daemon(Daemon::new("daemon-firewall", "firewalld")))
        .on_setup(ActionHook::new("firewall", &["setup"]))
        .build()
}
