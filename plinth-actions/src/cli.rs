//! Command line of the helper and dispatch to the individual actions.
//!
//! The binary is multi-call: installed as `<actions dir>/backups` (a symlink
//! to `plinth-actions`), it behaves like `plinth-actions backups`.

use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::backups::BackupsCommand;
use crate::config::Config;
use crate::firewall::FirewallCommand;
use crate::packages::PackagesCommand;
use crate::power::PowerCommand;
use crate::service::ServiceCommand;
use crate::utils::Result;

pub const BINARY_NAME: &str = "plinth-actions";

#[derive(Parser, Debug)]
#[command(name = BINARY_NAME, author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub action: Action,
}

#[derive(Subcommand, Debug)]
pub enum Action {
    #[command(subcommand)]
    Backups(BackupsCommand),
    #[command(subcommand)]
    Service(ServiceCommand),
    #[command(subcommand)]
    Firewall(FirewallCommand),
    #[command(subcommand)]
    Packages(PackagesCommand),
    #[command(subcommand)]
    Power(PowerCommand),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Backups(_) => "backups",
            Action::Service(_) => "service",
            Action::Firewall(_) => "firewall",
            Action::Packages(_) => "packages",
            Action::Power(_) => "power",
        }
    }
}

/// Rewrite `backups list ...` style invocations (argv[0] is the action
/// name) into `plinth-actions backups list ...`.
pub fn multicall_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().collect();
    let invoked_as = args
        .first()
        .and_then(|arg0| Path::new(arg0).file_name())
        .map(|name| name.to_string_lossy().to_string());

    if let Some(name) = invoked_as {
        if name != BINARY_NAME {
            args[0] = OsString::from(name);
            args.insert(0, OsString::from(BINARY_NAME));
        }
    }

    args
}

/// Run one action. Results are written to `out`; `input` carries the JSON
/// payload some actions accept on stdin.
pub fn dispatch(
    action: Action,
    config: &Config,
    input: &mut dyn Read,
    out: &mut dyn Write,
) -> Result<()> {
    match action {
        Action::Backups(command) => crate::backups::run(command, &config.backups, input, out),
        Action::Service(command) => crate::service::run(command, out),
        Action::Firewall(command) => crate::firewall::run(command, out),
        Action::Packages(command) => crate::packages::run(command),
        Action::Power(command) => crate::power::run(command),
    }
}
