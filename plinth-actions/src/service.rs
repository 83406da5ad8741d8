//! The `service` action: systemd unit management.

use clap::Subcommand;
use std::io::Write;
use tracing::info;

use crate::exec::SystemCommand;
use crate::utils::{ActionsError, Result};

const SYSTEMCTL: &str = "systemctl";

#[derive(Subcommand, Debug)]
pub enum ServiceCommand {
    /// Enable and start a unit
    Enable { unit: String },
    /// Disable and stop a unit
    Disable { unit: String },
    Start { unit: String },
    Stop { unit: String },
    Restart { unit: String },
    Reload { unit: String },
    Unmask { unit: String },
    /// Print `true` or `false`
    IsEnabled { unit: String },
    /// Print `true` or `false`
    IsRunning { unit: String },
}

/// Unit names are handed to systemctl, so keep them to the characters
/// systemd itself allows.
pub fn validate_unit(unit: &str) -> Result<()> {
    let valid = !unit.is_empty()
        && !unit.starts_with('-')
        && unit
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@' | ':' | '\\'));

    if valid {
        Ok(())
    } else {
        Err(ActionsError::InvalidInput(format!("invalid unit name: {unit}")))
    }
}

fn systemctl(args: &[&str]) -> Result<()> {
    SystemCommand::new(SYSTEMCTL, args).run()
}

pub fn run(command: ServiceCommand, out: &mut dyn Write) -> Result<()> {
    match command {
        ServiceCommand::Enable { unit } => {
            validate_unit(&unit)?;
            systemctl(&["enable", "--now", &unit])?;
            info!("Enabled {unit}");
        }
        ServiceCommand::Disable { unit } => {
            validate_unit(&unit)?;
            systemctl(&["disable", "--now", &unit])?;
            info!("Disabled {unit}");
        }
        ServiceCommand::Start { unit } => {
            validate_unit(&unit)?;
            systemctl(&["start", &unit])?;
        }
        ServiceCommand::Stop { unit } => {
            validate_unit(&unit)?;
            systemctl(&["stop", &unit])?;
        }
        ServiceCommand::Restart { unit } => {
            validate_unit(&unit)?;
            systemctl(&["restart", &unit])?;
        }
        ServiceCommand::Reload { unit } => {
            validate_unit(&unit)?;
            systemctl(&["reload-or-restart", &unit])?;
        }
        ServiceCommand::Unmask { unit } => {
            validate_unit(&unit)?;
            systemctl(&["unmask", &unit])?;
        }
        ServiceCommand::IsEnabled { unit } => {
            validate_unit(&unit)?;
            let enabled = SystemCommand::new(SYSTEMCTL, ["is-enabled", "--quiet", unit.as_str()]).succeeds()?;
            writeln!(out, "{enabled}")?;
        }
        ServiceCommand::IsRunning { unit } => {
            validate_unit(&unit)?;
            let running = SystemCommand::new(SYSTEMCTL, ["is-active", "--quiet", unit.as_str()]).succeeds()?;
            writeln!(out, "{running}")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_unit() {
        assert!(validate_unit("openvpn-server@freedombox").is_ok());
        assert!(validate_unit("systemd-timesyncd.service").is_ok());
        assert!(validate_unit("").is_err());
        assert!(validate_unit("--global").is_err());
        assert!(validate_unit("avahi daemon").is_err());
        assert!(validate_unit("a;reboot").is_err());
    }

    #[test]
    fn test_invalid_unit_is_rejected_before_running() {
        let mut out = Vec::new();
        let result = run(
            ServiceCommand::IsEnabled {
                unit: "$(reboot)".into(),
            },
            &mut out,
        );
        assert!(matches!(result, Err(ActionsError::InvalidInput(_))));
        assert!(out.is_empty());
    }
}
