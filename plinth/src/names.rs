//! Names under which the box can be reached, published by the apps that
//! provide them (e.g. avahi publishes `<hostname>.local`).

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Services whose reachability is reported per domain.
pub const SERVICES: &[(&str, &str, u16)] = &[("http", "HTTP", 80), ("https", "HTTPS", 443), ("ssh", "SSH", 22)];

/// Every entry of [`SERVICES`].
pub fn all_services() -> Vec<String> {
    SERVICES.iter().map(|(id, _, _)| id.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum DomainEvent {
    Added {
        sender: String,
        domain_type: String,
        name: String,
        services: Vec<String>,
    },
    Removed {
        sender: String,
        domain_type: String,
        /// `None` when every domain of the type was removed.
        name: Option<String>,
    },
}

pub type Observer = Arc<dyn Fn(&DomainEvent) + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct DomainEntry {
    pub domain_type: String,
    pub description: String,
    pub name: String,
    pub services: Vec<String>,
    pub services_status: Vec<bool>,
}

#[derive(Default)]
struct Domains {
    // domain type -> description
    types: BTreeMap<String, String>,
    // domain type -> name -> enabled services, names in insertion order
    domains: BTreeMap<String, Vec<(String, Vec<String>)>>,
}

#[derive(Default)]
pub struct DomainRegistry {
    domains: Mutex<Domains>,
    observers: Mutex<Vec<Observer>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observers are called synchronously, in subscription order, after the
    /// registry has been updated. They must not subscribe from the callback.
    pub fn subscribe(&self, observer: Observer) {
        lock(&self.observers).push(observer);
    }

    pub fn clear_observers(&self) {
        lock(&self.observers).clear();
    }

    pub fn add_domain(
        &self,
        sender: &str,
        domain_type: &str,
        name: &str,
        description: &str,
        services: Vec<String>,
    ) {
        if domain_type.is_empty() {
            return;
        }

        {
            let mut state = lock(&self.domains);
            state
                .types
                .insert(domain_type.to_string(), description.to_string());
            if name.is_empty() {
                return;
            }

            let names = state.domains.entry(domain_type.to_string()).or_default();
            match names.iter_mut().find(|(n, _)| n == name) {
                Some(entry) => entry.1 = services.clone(),
                None => names.push((name.to_string(), services.clone())),
            }
        }

        tracing::info!("Added domain {name} of type {domain_type} with services {services:?}");
        self.notify(&DomainEvent::Added {
            sender: sender.to_string(),
            domain_type: domain_type.to_string(),
            name: name.to_string(),
            services,
        });
    }

    /// Remove one domain, or all domains of the type when `name` is empty.
    pub fn remove_domain(&self, sender: &str, domain_type: &str, name: &str) {
        {
            let mut state = lock(&self.domains);
            let Some(names) = state.domains.get_mut(domain_type) else {
                return;
            };
            if name.is_empty() {
                names.clear();
                tracing::info!("Removed all domains of type {domain_type}");
            } else if let Some(pos) = names.iter().position(|(n, _)| n == name) {
                names.remove(pos);
                tracing::info!("Removed domain {name} of type {domain_type}");
            } else {
                return;
            }
        }

        self.notify(&DomainEvent::Removed {
            sender: sender.to_string(),
            domain_type: domain_type.to_string(),
            name: (!name.is_empty()).then(|| name.to_string()),
        });
    }

    pub fn domain_types(&self) -> Vec<String> {
        lock(&self.domains).types.keys().cloned().collect()
    }

    /// Description of a domain type, or the type itself when unknown.
    pub fn description(&self, domain_type: &str) -> String {
        lock(&self.domains)
            .types
            .get(domain_type)
            .cloned()
            .unwrap_or_else(|| domain_type.to_string())
    }

    /// First domain of the type, for single-domain types.
    pub fn get_domain(&self, domain_type: &str) -> Option<String> {
        lock(&self.domains)
            .domains
            .get(domain_type)
            .and_then(|names| names.first())
            .map(|(name, _)| name.clone())
    }

    pub fn enabled_services(&self, domain_type: &str, name: &str) -> Vec<String> {
        lock(&self.domains)
            .domains
            .get(domain_type)
            .and_then(|names| names.iter().find(|(n, _)| n == name))
            .map(|(_, services)| services.clone())
            .unwrap_or_default()
    }

    /// Whether each of [`SERVICES`] is enabled for the domain, in order.
    pub fn services_status(&self, domain_type: &str, name: &str) -> Vec<bool> {
        let enabled = self.enabled_services(domain_type, name);
        SERVICES
            .iter()
            .map(|(id, _, _)| enabled.iter().any(|s| s == id))
            .collect()
    }

    pub fn entries(&self) -> Vec<DomainEntry> {
        let state = lock(&self.domains);
        let mut entries = Vec::new();
        for (domain_type, names) in &state.domains {
            let description = state
                .types
                .get(domain_type)
                .cloned()
                .unwrap_or_else(|| domain_type.clone());
            for (name, services) in names {
                entries.push(DomainEntry {
                    domain_type: domain_type.clone(),
                    description: description.clone(),
                    name: name.clone(),
                    services: services.clone(),
                    services_status: SERVICES
                        .iter()
                        .map(|(id, _, _)| services.iter().any(|s| s == id))
                        .collect(),
                });
            }
        }
        entries
    }

    fn notify(&self, event: &DomainEvent) {
        let observers = lock(&self.observers);
        for observer in observers.iter() {
            observer(event);
        }
    }
}
