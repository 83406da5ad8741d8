//! Privileged helper actions for the plinth control panel.
//!
//! Every action runs as a short-lived superuser process started by the
//! service through `sudo`. Arguments arrive on the command line, optional
//! JSON payloads on stdin, results leave on stdout and failures are reported
//! through the exit code and stderr.

pub mod backups;
pub mod cli;
pub mod config;
pub mod exec;
pub mod firewall;
pub mod packages;
pub mod power;
pub mod service;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::{ActionsError, Result};
