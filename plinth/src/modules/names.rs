use std::sync::Arc;

use crate::app::{App, Component, Info, Menu};
use crate::error::Result;
use crate::names::{DomainEvent, DomainRegistry};

pub fn app() -> Result<App> {
    App::builder(
        Info::new("names", 1, "Name Services")
            .essential()
            .description("Ways the box can be reached from the public Internet"),
    )
    .component(Component::Menu(Menu::new("menu-names", "Name Services", "fa-tags", "names:index", "system")))
    .build()
}

pub fn init(domains: &DomainRegistry) {
    domains.subscribe(Arc::new(|event: &DomainEvent| match event {
        DomainEvent::Added { sender, name, .. } => {
            tracing::debug!("Domain {name} published by {sender}");
        }
        DomainEvent::Removed { sender, domain_type, .. } => {
            tracing::debug!("Domains of type {domain_type} withdrawn by {sender}");
        }
    }));
}
