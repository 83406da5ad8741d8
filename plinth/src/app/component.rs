//! Pieces an app is made of. Leader components reflect system state through
//! actions; followers (menu entries, shortcuts) only track a flag.

use serde::Serialize;

use crate::actions::{output_is_true, Actions};
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct Menu {
    pub component_id: String,
    pub name: String,
    pub icon: String,
    pub url_name: String,
    pub parent_url_name: String,
}

impl Menu {
    pub fn new(component_id: &str, name: &str, icon: &str, url_name: &str, parent: &str) -> Self {
        Self {
            component_id: component_id.into(),
            name: name.into(),
            icon: icon.into(),
            url_name: url_name.into(),
            parent_url_name: parent.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Shortcut {
    pub component_id: String,
    pub name: String,
    pub url: Option<String>,
    pub login_required: bool,
}

/// A systemd unit managed through the `service` action.
#[derive(Debug, Clone, Serialize)]
pub struct Daemon {
    pub component_id: String,
    pub unit: String,
}

impl Daemon {
    pub fn new(component_id: &str, unit: &str) -> Self {
        Self {
            component_id: component_id.into(),
            unit: unit.into(),
        }
    }

    pub async fn is_enabled(&self, actions: &dyn Actions) -> Result<bool> {
        let output = actions.run("service", &["is-enabled", &self.unit]).await?;
        Ok(output_is_true(&output))
    }

    async fn enable(&self, actions: &dyn Actions) -> Result<()> {
        actions.superuser_run("service", &["enable", &self.unit]).await?;
        Ok(())
    }

    async fn disable(&self, actions: &dyn Actions) -> Result<()> {
        actions.superuser_run("service", &["disable", &self.unit]).await?;
        Ok(())
    }
}

/// Firewall services opened while the app is enabled.
#[derive(Debug, Clone, Serialize)]
pub struct Firewall {
    pub component_id: String,
    pub name: String,
    pub ports: Vec<String>,
    pub is_external: bool,
}

pub const INTERNAL_ZONE: &str = "internal";
pub const EXTERNAL_ZONE: &str = "external";

impl Firewall {
    pub fn new(component_id: &str, name: &str, ports: &[&str], is_external: bool) -> Self {
        Self {
            component_id: component_id.into(),
            name: name.into(),
            ports: ports.iter().map(|p| p.to_string()).collect(),
            is_external,
        }
    }

    fn zones(&self) -> Vec<&'static str> {
        if self.is_external {
            vec![INTERNAL_ZONE, EXTERNAL_ZONE]
        } else {
            vec![INTERNAL_ZONE]
        }
    }

    pub async fn enabled_services(actions: &dyn Actions, zone: &str) -> Result<Vec<String>> {
        let output = actions
            .superuser_run("firewall", &["get-enabled-services", "--zone", zone])
            .await?;
        Ok(serde_json::from_slice(&output)?)
    }

    pub async fn is_enabled(&self, actions: &dyn Actions) -> Result<bool> {
        for zone in self.zones() {
            let enabled = Self::enabled_services(actions, zone).await?;
            if !self.ports.iter().all(|port| enabled.contains(port)) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn enable(&self, actions: &dyn Actions) -> Result<()> {
        for zone in self.zones() {
            let enabled = Self::enabled_services(actions, zone).await?;
            for port in self.ports.iter().filter(|p| !enabled.contains(p)) {
                actions
                    .superuser_run("firewall", &["add-service", "--port", port, "--zone", zone])
                    .await?;
            }
        }
        Ok(())
    }

    /// Closes the ports in both zones, whatever `is_external` says.
    async fn disable(&self, actions: &dyn Actions) -> Result<()> {
        for zone in [INTERNAL_ZONE, EXTERNAL_ZONE] {
            let enabled = Self::enabled_services(actions, zone).await?;
            for port in self.ports.iter().filter(|p| enabled.contains(p)) {
                actions
                    .superuser_run("firewall", &["remove-service", "--port", port, "--zone", zone])
                    .await?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Component {
    Menu(Menu),
    Shortcut(Shortcut),
    Daemon(Daemon),
    Firewall(Firewall),
}

impl Component {
    pub fn id(&self) -> &str {
        match self {
            Component::Menu(c) => &c.component_id,
            Component::Shortcut(c) => &c.component_id,
            Component::Daemon(c) => &c.component_id,
            Component::Firewall(c) => &c.component_id,
        }
    }

    pub async fn is_enabled(&self, actions: &dyn Actions) -> Result<Option<bool>> {
        match self {
            Component::Daemon(c) => c.is_enabled(actions).await.map(Some),
            Component::Firewall(c) => c.is_enabled(actions).await.map(Some),
            Component::Menu(_) | Component::Shortcut(_) => Ok(None),
        }
    }

    pub async fn enable(&self, actions: &dyn Actions) -> Result<()> {
        match self {
            Component::Daemon(c) => c.enable(actions).await,
            Component::Firewall(c) => c.enable(actions).await,
            Component::Menu(_) | Component::Shortcut(_) => Ok(()),
        }
    }

    pub async fn disable(&self, actions: &dyn Actions) -> Result<()> {
        match self {
            Component::Daemon(c) => c.disable(actions).await,
            Component::Firewall(c) => c.disable(actions).await,
            Component::Menu(_) | Component::Shortcut(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::RecordingActions;

    #[tokio::test]
    async fn test_firewall_enable_adds_missing_ports_only() {
        let actions = RecordingActions::default();
        actions.respond("firewall get-enabled-services", r#"["http"]"#);

        let firewall = Firewall::new("firewall-ikiwiki", "ikiwiki", &["http", "https"], true);
        firewall.enable(&actions).await.unwrap();

        let added: Vec<String> = actions
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("firewall add-service"))
            .collect();
        assert_eq!(
            added,
            vec![
                "firewall add-service --port https --zone internal",
                "firewall add-service --port https --zone external",
            ]
        );
    }

    #[tokio::test]
    async fn test_daemon_state_is_queried_unprivileged() {
        let actions = RecordingActions::default();
        actions.respond("service is-enabled", "true\n");

        let daemon = Daemon::new("daemon-minidlna", "minidlna");
        assert!(daemon.is_enabled(&actions).await.unwrap());
        assert!(!actions.calls()[0].superuser);
    }

    #[tokio::test]
    async fn test_followers_have_no_system_state() {
        let actions = RecordingActions::default();
        let menu = Component::Menu(Menu::new("menu-names", "Name Services", "", "names:index", "system"));
        assert_eq!(menu.is_enabled(&actions).await.unwrap(), None);
        assert!(actions.calls().is_empty());
    }
}
