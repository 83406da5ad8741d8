//! The `firewall` action: firewalld zone services through firewall-cmd.

use clap::Subcommand;
use std::io::Write;
use tracing::{info, warn};

use crate::exec::SystemCommand;
use crate::utils::{ActionsError, Result};

const FIREWALL_CMD: &str = "firewall-cmd";

/// Services opened on the internal and external zones during setup.
const DEFAULT_SERVICES: &[(&str, &str)] = &[
    ("http", "external"),
    ("http", "internal"),
    ("https", "external"),
    ("https", "internal"),
    ("dns", "internal"),
    ("dhcp", "internal"),
];

#[derive(Subcommand, Debug)]
pub enum FirewallCommand {
    /// Set the default zone and open the base services
    Setup,
    /// Print `running` or `not running`
    GetStatus,
    /// Print the services enabled in a zone as a JSON list
    GetEnabledServices {
        #[arg(long)]
        zone: String,
    },
    AddService {
        #[arg(long)]
        port: String,
        #[arg(long)]
        zone: String,
    },
    RemoveService {
        #[arg(long)]
        port: String,
        #[arg(long)]
        zone: String,
    },
}

fn validate_name(kind: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && !value.starts_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ActionsError::InvalidInput(format!("invalid {kind}: {value}")))
    }
}

/// Apply a service change to both the runtime and the permanent configuration.
fn change_service(operation: &str, port: &str, zone: &str) -> Result<()> {
    validate_name("service", port)?;
    validate_name("zone", zone)?;

    let zone_arg = format!("--zone={zone}");
    let service_arg = format!("--{operation}-service={port}");
    SystemCommand::new(FIREWALL_CMD, [zone_arg.as_str(), service_arg.as_str()]).run()?;
    SystemCommand::new(
        FIREWALL_CMD,
        ["--permanent", zone_arg.as_str(), service_arg.as_str()],
    )
    .run()
}

/// Parse the whitespace separated output of `--list-services`.
pub fn parse_services(output: &str) -> Vec<String> {
    output.split_whitespace().map(str::to_string).collect()
}

pub fn run(command: FirewallCommand, out: &mut dyn Write) -> Result<()> {
    match command {
        FirewallCommand::Setup => {
            SystemCommand::new(FIREWALL_CMD, ["--set-default-zone=external"]).run()?;
            for (port, zone) in DEFAULT_SERVICES {
                change_service("add", port, zone)?;
            }
            info!("Firewall configured");
        }
        FirewallCommand::GetStatus => {
            let running = SystemCommand::new(FIREWALL_CMD, ["--state"]).succeeds()?;
            writeln!(out, "{}", if running { "running" } else { "not running" })?;
        }
        FirewallCommand::GetEnabledServices { zone } => {
            validate_name("zone", &zone)?;
            let zone_arg = format!("--zone={zone}");
            let services =
                match SystemCommand::new(FIREWALL_CMD, [zone_arg.as_str(), "--list-services"])
                    .output()
                {
                    Ok(output) => parse_services(&String::from_utf8_lossy(&output)),
                    Err(ActionsError::Command { stderr, .. }) => {
                        // firewalld not running
                        warn!("Unable to list services of zone {zone}: {stderr}");
                        Vec::new()
                    }
                    Err(e) => return Err(e),
                };
            serde_json::to_writer(&mut *out, &services)?;
            writeln!(out)?;
        }
        FirewallCommand::AddService { port, zone } => {
            change_service("add", &port, &zone)?;
            info!("Added service {port} to zone {zone}");
        }
        FirewallCommand::RemoveService { port, zone } => {
            change_service("remove", &port, &zone)?;
            info!("Removed service {port} from zone {zone}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_services() {
        assert_eq!(
            parse_services("dhcp dns http https mdns\n"),
            vec!["dhcp", "dns", "http", "https", "mdns"]
        );
        assert!(parse_services("\n").is_empty());
    }

    #[test]
    fn test_rejects_option_like_names() {
        assert!(change_service("add", "--panic-on", "internal").is_err());
        assert!(change_service("add", "http", "internal;x").is_err());
    }
}
