use crate::app::{App, Component, Daemon, Info, Menu};
use crate::error::Result;

pub fn app() -> Result<App> {
    App::builder(Info::new("datetime", 2, "Date & Time").essential())
        .component(Component::Menu(Menu::new("menu-datetime", "Date & Time", "fa-clock-o", "datetime:index", "system")))
        .component(Component::Daemon(Daemon::new("daemon-datetime", "systemd-timesyncd")))
        .enable_after_setup()
        .build()
}
