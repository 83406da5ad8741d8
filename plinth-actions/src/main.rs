//! plinth-actions - privileged helper entry point.

use clap::Parser;
use plinth_actions::{cli, utils, Config};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = cli::Cli::parse_from(cli::multicall_args(std::env::args_os()));

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(e.exit_code());
        }
    };

    if let Err(e) = utils::logger::init(&config.log.level) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let name = args.action.name();
    tracing::debug!("Running action {name}");

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let result = cli::dispatch(args.action, &config, &mut stdin.lock(), &mut stdout.lock());

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Action {name} failed: {e}");
            eprintln!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}
