//! The `power` action.

use clap::Subcommand;
use tracing::info;

use crate::exec::SystemCommand;
use crate::utils::Result;

#[derive(Subcommand, Debug)]
pub enum PowerCommand {
    Restart,
    Shutdown,
}

pub fn run(command: PowerCommand) -> Result<()> {
    let verb = match command {
        PowerCommand::Restart => "reboot",
        PowerCommand::Shutdown => "poweroff",
    };
    info!("Requesting system {verb}");
    SystemCommand::new("systemctl", [verb]).run()
}
