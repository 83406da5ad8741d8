use std::sync::Arc;
use tokio::sync::RwLock;

use super::{App, Capability};
use crate::error::{Error, Result};

/// Registered apps, kept in registration order.
#[derive(Default)]
pub struct AppRegistry {
    apps: RwLock<Vec<Arc<App>>>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an app. An app registered again under the same id replaces
    /// the earlier one in place.
    pub async fn register(&self, app: App) -> Arc<App> {
        let app = Arc::new(app);
        let mut apps = self.apps.write().await;
        if let Some(existing) = apps.iter_mut().find(|a| a.id() == app.id()) {
            tracing::info!("Replacing registered app {}", app.id());
            *existing = app.clone();
        } else {
            tracing::debug!("Registered app {}", app.id());
            apps.push(app.clone());
        }
        app
    }

    pub async fn get(&self, app_id: &str) -> Result<Arc<App>> {
        self.apps
            .read()
            .await
            .iter()
            .find(|a| a.id() == app_id)
            .cloned()
            .ok_or_else(|| Error::AppNotFound(app_id.to_string()))
    }

    pub async fn list(&self) -> Vec<Arc<App>> {
        self.apps.read().await.clone()
    }

    pub async fn with_capability(&self, capability: Capability) -> Vec<Arc<App>> {
        self.apps
            .read()
            .await
            .iter()
            .filter(|a| a.has_capability(capability))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.apps.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Info;
    use crate::backups::BackupManifest;

    fn app(id: &str, version: u32) -> App {
        App::builder(Info::new(id, version, id)).build().unwrap()
    }

    #[tokio::test]
    async fn test_list_in_registration_order() {
        let registry = AppRegistry::new();
        for id in ["names", "avahi", "backups"] {
            registry.register(app(id, 1)).await;
        }
        let ids: Vec<String> = registry.list().await.iter().map(|a| a.id().to_string()).collect();
        assert_eq!(ids, vec!["names", "avahi", "backups"]);
    }

    #[tokio::test]
    async fn test_reregistration_replaces_in_place() {
        let registry = AppRegistry::new();
        registry.register(app("a", 1)).await;
        registry.register(app("b", 1)).await;
        registry.register(app("a", 2)).await;

        assert_eq!(registry.len().await, 2);
        assert_eq!(registry.list().await[0].version(), 2);
        assert_eq!(registry.get("a").await.unwrap().version(), 2);
    }

    #[tokio::test]
    async fn test_get_unknown_app() {
        let registry = AppRegistry::new();
        assert!(matches!(
            registry.get("missing").await,
            Err(Error::AppNotFound(id)) if id == "missing"
        ));
    }

    #[tokio::test]
    async fn test_with_capability() {
        let registry = AppRegistry::new();
        registry.register(app("names", 1)).await;
        registry
            .register(
                App::builder(Info::new("ikiwiki", 1, "ikiwiki"))
                    .backup(BackupManifest::new().data_directories(["/var/lib/ikiwiki"]))
                    .build()
                    .unwrap(),
            )
            .await;

        let apps = registry.with_capability(Capability::Backup).await;
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].id(), "ikiwiki");
    }
}
