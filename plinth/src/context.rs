use std::sync::{Arc, RwLock};

use crate::actions::Actions;
use crate::app::{App, AppRegistry, Capability};
use crate::backups::{BackupSettings, Backups};
use crate::config::AppConfig;
use crate::error::Result;
use crate::modules;
use crate::names::DomainRegistry;

/// Everything the service shares between requests, built once at startup.
pub struct Context {
    pub config: AppConfig,
    pub actions: Arc<dyn Actions>,
    pub apps: Arc<AppRegistry>,
    pub domains: Arc<DomainRegistry>,
    pub backups: Backups,
    hostname: RwLock<String>,
}

impl Context {
    pub fn new(config: AppConfig, actions: Arc<dyn Actions>) -> Self {
        let apps = Arc::new(AppRegistry::new());
        let backups = Backups::new(
            actions.clone(),
            apps.clone(),
            BackupSettings {
                repository: config.backup_repository.clone(),
                manifests_dir: config.manifests_dir.clone(),
                export_locations: config.export_locations.clone(),
                restore_destination: config.restore_destination.clone(),
            },
        );
        let hostname = RwLock::new(config.hostname.clone());

        Self {
            config,
            actions,
            apps,
            domains: Arc::new(DomainRegistry::new()),
            backups,
            hostname,
        }
    }

    /// Register the built-in apps and bring their follower state in line
    /// with the system. A failing app is logged and skipped.
    pub async fn init(&self) -> Result<()> {
        modules::names::init(&self.domains);

        for app in modules::builtin(&self.config)? {
            let app = self.apps.register(app).await;
            if let Err(e) = self.init_app(&app).await {
                tracing::warn!("Failed to initialize app {}: {e}", app.id());
            }
        }

        tracing::info!("Initialized {} apps", self.apps.len().await);
        Ok(())
    }

    async fn init_app(&self, app: &App) -> Result<()> {
        let enabled = app.info().is_essential || app.is_enabled(self.actions.as_ref()).await?;
        if !enabled {
            return Ok(());
        }
        app.set_enabled(true);

        if app.id() == modules::avahi::APP_ID {
            modules::avahi::publish(&self.domains, &self.hostname());
        }
        Ok(())
    }

    pub async fn apps_with(&self, capability: Capability) -> Vec<Arc<App>> {
        self.apps.with_capability(capability).await
    }

    pub fn hostname(&self) -> String {
        self.hostname
            .read()
            .map(|h| h.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Record a new hostname and republish the names derived from it.
    pub fn set_hostname(&self, hostname: &str) {
        let old = {
            let mut current = self
                .hostname
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *current, hostname.to_string())
        };
        if old != hostname {
            tracing::info!("Hostname changed from {old} to {hostname}");
            modules::avahi::hostname_changed(&self.domains, &old, hostname);
        }
    }

    pub async fn shutdown(&self) {
        self.domains.clear_observers();
        tracing::info!("Context shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::RecordingActions;
    use crate::modules::avahi;

    fn config() -> AppConfig {
        AppConfig::from_lookup(|key| match key {
            "PLINTH_HOSTNAME" => Some("freedombox".into()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_init_registers_builtin_apps_and_publishes_local_name() {
        let actions = Arc::new(RecordingActions::default());
        let ctx = Context::new(config(), actions.clone());
        ctx.init().await.unwrap();

        assert_eq!(ctx.apps.len().await, 11);
        assert_eq!(
            ctx.domains.get_domain(avahi::DOMAIN_TYPE).as_deref(),
            Some("freedombox.local")
        );
        assert!(ctx.apps_with(Capability::Backup).await.iter().any(|a| a.id() == "ikiwiki"));

        ctx.set_hostname("mybox");
        assert_eq!(ctx.domains.get_domain(avahi::DOMAIN_TYPE).as_deref(), Some("mybox.local"));
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_init_survives_failing_queries() {
        let actions = Arc::new(RecordingActions::default());
        actions.fail("service is-enabled", 1);
        let ctx = Context::new(config(), actions);
        ctx.init().await.unwrap();
        assert_eq!(ctx.apps.len().await, 11);
    }
}
