use crate::app::{App, Component, Firewall, Info, Menu};
use crate::backups::BackupManifest;
use crate::error::Result;

pub fn app() -> Result<App> {
    App::builder(Info::new("ikiwiki", 1, "ikiwiki").description("Wiki and Blog"))
        .packages(&[
            "ikiwiki",
            "libdigest-sha-perl",
            "libxml-writer-perl",
            "xapian-omega",
            "libsearch-xapian-perl",
            "libimage-magick-perl",
        ])
        .component(Component::Menu(Menu::new("menu-ikiwiki", "ikiwiki", "ikiwiki", "ikiwiki:index", "apps")))
        .component(Component::Firewall(Firewall::new("firewall-ikiwiki", "ikiwiki", &["http", "https"], true)))
        .backup(BackupManifest::new().data_directories(["/var/lib/ikiwiki"]))
        .enable_after_setup()
        .build()
}
