//! plinth: the unprivileged side of the control panel.
//!
//! Apps are declared at startup and registered in a [`context::Context`].
//! Anything that needs root goes through [`actions::Actions`], which runs the
//! privileged helper as a separate process.

pub mod actions;
pub mod app;
pub mod backups;
pub mod config;
pub mod context;
pub mod error;
pub mod modules;
pub mod names;
pub mod routes;

pub use context::Context;
pub use error::{Error, Result};
