//! Restart and shutdown of the box.

use crate::actions::Actions;
use crate::app::{App, Component, Info, Menu};
use crate::error::Result;

pub fn app() -> Result<App> {
    App::builder(Info::new("power", 1, "Power").essential())
        .component(Component::Menu(Menu::new("menu-power", "Power", "fa-power-off", "power:index", "system")))
        .build()
}

/// Start a reboot without waiting for it.
pub async fn restart(actions: &dyn Actions) -> Result<()> {
    tracing::warn!("Restart requested");
    actions.superuser_run_in_background("power", &["restart"]).await?;
    Ok(())
}

pub async fn shutdown(actions: &dyn Actions) -> Result<()> {
    tracing::warn!("Shutdown requested");
    actions.superuser_run_in_background("power", &["shutdown"]).await?;
    Ok(())
}

/// The action exits with failure when no package manager holds the lock.
pub async fn is_package_manager_busy(actions: &dyn Actions) -> bool {
    actions
        .superuser_run("packages", &["is-package-manager-busy"])
        .await
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::RecordingActions;

    #[tokio::test]
    async fn test_package_manager_busy() {
        let actions = RecordingActions::default();
        assert!(is_package_manager_busy(&actions).await);

        actions.fail("packages is-package-manager-busy", 1);
        assert!(!is_package_manager_busy(&actions).await);
    }

    #[tokio::test]
    async fn test_restart_runs_in_background() {
        let actions = RecordingActions::default();
        restart(&actions).await.unwrap();
        let calls = actions.calls();
        assert_eq!(calls[0].args, vec!["restart"]);
        assert!(calls[0].superuser);
    }
}
