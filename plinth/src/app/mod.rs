//! Apps and their registry.
//!
//! An app is a bundle of components (menu entries, daemons, firewall rules)
//! plus the packages it needs and the files it wants backed up. Whether an
//! app is enabled is read back from its leader components through actions,
//! so enabling and disabling are safe to repeat.

pub mod component;
mod registry;

pub use component::{Component, Daemon, Firewall, Menu, Shortcut};
pub use registry::AppRegistry;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::actions::Actions;
use crate::backups::BackupManifest;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct Info {
    pub app_id: String,
    pub version: u32,
    pub name: String,
    pub is_essential: bool,
    pub short_description: Option<String>,
}

impl Info {
    pub fn new(app_id: &str, version: u32, name: &str) -> Self {
        Self {
            app_id: app_id.into(),
            version,
            name: name.into(),
            is_essential: false,
            short_description: None,
        }
    }

    pub fn essential(mut self) -> Self {
        self.is_essential = true;
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.short_description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    ManagedPackages,
    ManagedServices,
    Firewall,
    Menu,
    Backup,
    SetupHook,
    RestoreHook,
}

/// Work run after setup or after a restore of the app's files.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, actions: &dyn Actions) -> Result<()>;
}

/// A hook that runs one superuser action with fixed arguments.
pub struct ActionHook {
    action: String,
    args: Vec<String>,
}

impl ActionHook {
    pub fn new(action: &str, args: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            action: action.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        })
    }
}

#[async_trait]
impl Hook for ActionHook {
    async fn call(&self, actions: &dyn Actions) -> Result<()> {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        actions.superuser_run(&self.action, &args).await?;
        Ok(())
    }
}

pub struct App {
    info: Info,
    managed_packages: Vec<String>,
    components: Vec<Component>,
    backup: Option<BackupManifest>,
    setup_hooks: Vec<Arc<dyn Hook>>,
    restore_hooks: Vec<Arc<dyn Hook>>,
    enable_after_setup: bool,
    capabilities: BTreeSet<Capability>,
    // Follower state: menu entries and shortcuts are shown while set.
    enabled: AtomicBool,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("id", &self.info.app_id)
            .field("version", &self.info.version)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl App {
    pub fn builder(info: Info) -> AppBuilder {
        AppBuilder {
            app: App {
                info,
                managed_packages: Vec::new(),
                components: Vec::new(),
                backup: None,
                setup_hooks: Vec::new(),
                restore_hooks: Vec::new(),
                enable_after_setup: false,
                capabilities: BTreeSet::new(),
                enabled: AtomicBool::new(false),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.info.app_id
    }

    pub fn version(&self) -> u32 {
        self.info.version
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn managed_packages(&self) -> &[String] {
        &self.managed_packages
    }

    pub fn managed_services(&self) -> Vec<&str> {
        self.components
            .iter()
            .filter_map(|c| match c {
                Component::Daemon(d) => Some(d.unit.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn backup(&self) -> Option<&BackupManifest> {
        self.backup.as_ref()
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Set the follower flag without touching system state.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub async fn is_enabled(&self, actions: &dyn Actions) -> Result<bool> {
        let mut has_leader = false;
        for component in &self.components {
            if let Some(enabled) = component.is_enabled(actions).await? {
                has_leader = true;
                if !enabled {
                    return Ok(false);
                }
            }
        }

        if has_leader {
            Ok(true)
        } else {
            Ok(self.enabled.load(Ordering::Relaxed))
        }
    }

    pub async fn enable(&self, actions: &dyn Actions) -> Result<()> {
        if self.is_enabled(actions).await? {
            tracing::debug!("App {} already enabled", self.id());
            self.set_enabled(true);
            return Ok(());
        }

        for component in &self.components {
            component.enable(actions).await?;
        }
        self.set_enabled(true);
        tracing::info!("Enabled app {}", self.id());
        Ok(())
    }

    pub async fn disable(&self, actions: &dyn Actions) -> Result<()> {
        if self.info.is_essential {
            return Err(Error::InvalidInput(format!(
                "App {} is essential and cannot be disabled",
                self.id()
            )));
        }

        if !self.is_enabled(actions).await? {
            tracing::debug!("App {} already disabled", self.id());
            self.set_enabled(false);
            return Ok(());
        }

        for component in self.components.iter().rev() {
            component.disable(actions).await?;
        }
        self.set_enabled(false);
        tracing::info!("Disabled app {}", self.id());
        Ok(())
    }

    /// Install packages, run setup hooks and, for apps that ask for it,
    /// enable the app.
    pub async fn setup(&self, actions: &dyn Actions) -> Result<()> {
        tracing::info!("Setting up app {} version {}", self.id(), self.version());

        if !self.managed_packages.is_empty() {
            let mut args = vec!["install"];
            args.extend(self.managed_packages.iter().map(String::as_str));
            actions.superuser_run("packages", &args).await?;
        }

        for hook in &self.setup_hooks {
            hook.call(actions).await?;
        }

        if self.enable_after_setup {
            self.enable(actions).await?;
        }
        Ok(())
    }

    pub async fn post_restore(&self, actions: &dyn Actions) -> Result<()> {
        for hook in &self.restore_hooks {
            hook.call(actions).await?;
        }
        Ok(())
    }
}

pub struct AppBuilder {
    app: App,
}

impl AppBuilder {
    pub fn packages(mut self, packages: &[&str]) -> Self {
        self.app
            .managed_packages
            .extend(packages.iter().map(|p| p.to_string()));
        self
    }

    pub fn component(mut self, component: Component) -> Self {
        self.app.components.push(component);
        self
    }

    pub fn backup(mut self, manifest: BackupManifest) -> Self {
        self.app.backup = Some(manifest);
        self
    }

    pub fn on_setup(mut self, hook: Arc<dyn Hook>) -> Self {
        self.app.setup_hooks.push(hook);
        self
    }

    pub fn on_restore(mut self, hook: Arc<dyn Hook>) -> Self {
        self.app.restore_hooks.push(hook);
        self
    }

    pub fn enable_after_setup(mut self) -> Self {
        self.app.enable_after_setup = true;
        self
    }

    pub fn build(self) -> Result<App> {
        let mut app = self.app;

        if app.info.app_id.is_empty() {
            return Err(Error::InvalidInput("app id must not be empty".into()));
        }

        let mut ids = BTreeSet::new();
        for component in &app.components {
            if !ids.insert(component.id()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate component {} in app {}",
                    component.id(),
                    app.info.app_id
                )));
            }
        }

        if let Some(manifest) = &app.backup {
            manifest.validate(&app.info.app_id)?;
        }

        app.capabilities = derive_capabilities(&app);
        Ok(app)
    }
}

fn derive_capabilities(app: &App) -> BTreeSet<Capability> {
    let mut capabilities = BTreeSet::new();
    if !app.managed_packages.is_empty() {
        capabilities.insert(Capability::ManagedPackages);
    }
    for component in &app.components {
        capabilities.insert(match component {
            Component::Daemon(_) => Capability::ManagedServices,
            Component::Firewall(_) => Capability::Firewall,
            Component::Menu(_) | Component::Shortcut(_) => Capability::Menu,
        });
    }
    if app.backup.is_some() {
        capabilities.insert(Capability::Backup);
    }
    if !app.setup_hooks.is_empty() {
        capabilities.insert(Capability::SetupHook);
    }
    if !app.restore_hooks.is_empty() {
        capabilities.insert(Capability::RestoreHook);
    }
    capabilities
}
