//! The `packages` action: Debian package installation.

use clap::Subcommand;
use tracing::info;

use crate::exec::SystemCommand;
use crate::utils::{ActionsError, Result};

const DPKG_LOCK: &str = "/var/lib/dpkg/lock";

#[derive(Subcommand, Debug)]
pub enum PackagesCommand {
    /// Install packages non-interactively
    Install {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Exit successfully only while a package manager holds the dpkg lock
    IsPackageManagerBusy,
}

/// Debian package names: lowercase alphanumerics plus `+ - .`
pub fn validate_package(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(ActionsError::InvalidInput(format!("invalid package name: {name}")))
    }
}

pub fn run(command: PackagesCommand) -> Result<()> {
    match command {
        PackagesCommand::Install { packages } => {
            for package in &packages {
                validate_package(package)?;
            }

            let mut args = vec![
                "install",
                "--yes",
                "--no-install-recommends",
                "-o",
                "Dpkg::Options::=--force-confdef",
                "-o",
                "Dpkg::Options::=--force-confold",
            ];
            args.extend(packages.iter().map(String::as_str));

            SystemCommand::new("apt-get", args)
                .env("DEBIAN_FRONTEND", "noninteractive")
                .run()?;
            info!("Installed packages: {}", packages.join(", "));
        }
        PackagesCommand::IsPackageManagerBusy => {
            if !SystemCommand::new("fuser", [DPKG_LOCK]).succeeds()? {
                return Err(ActionsError::ConditionFalse(
                    "package manager is not busy".to_string(),
                ));
            }
        }
    }

    Ok(())
}
