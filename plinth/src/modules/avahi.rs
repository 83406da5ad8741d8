//! Service discovery on the local network.

use crate::app::{ActionHook, App, Component, Daemon, Firewall, Info, Menu};
use crate::error::Result;
use crate::names::{all_services, DomainRegistry};

pub const APP_ID: &str = "avahi";
pub const DOMAIN_TYPE: &str = "domain-type-local";
const DOMAIN_DESCRIPTION: &str = "Local Network Domain";

pub fn app() -> Result<App> {
    App::builder(
        Info::new(APP_ID, 1, "Service Discovery")
            .essential()
            .description("Discover devices and services on the local network"),
    )
    .packages(&["avahi-daemon", "avahi-utils"])
    .component(Component::Menu(Menu::new("menu-avahi", "Service Discovery", "fa-compass", "avahi:index", "system")))
    .component(Component::Firewall(Firewall::new("firewall-avahi", "Service Discovery", &["mdns"], false)))
    .component(Component::Daemon(Daemon::new("daemon-avahi", "avahi-daemon")))
    .on_setup(ActionHook::new("service", &["reload", "avahi-daemon"]))
    .build()
}

fn local_domain(hostname: &str) -> String {
    format!("{hostname}.local")
}

pub fn publish(domains: &DomainRegistry, hostname: &str) {
    domains.add_domain(APP_ID, DOMAIN_TYPE, &local_domain(hostname), DOMAIN_DESCRIPTION, all_services());
}

/// Move the `.local` name over to a new hostname.
pub fn hostname_changed(domains: &DomainRegistry, old_hostname: &str, new_hostname: &str) {
    domains.remove_domain(APP_ID, DOMAIN_TYPE, &local_domain(old_hostname));
    publish(domains, new_hostname);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_change_republishes() {
        let domains = DomainRegistry::new();
        publish(&domains, "freedombox");
        hostname_changed(&domains, "freedombox", "mybox");

        assert_eq!(domains.get_domain(DOMAIN_TYPE).as_deref(), Some("mybox.local"));
        assert_eq!(domains.entries().len(), 1);
    }
}
