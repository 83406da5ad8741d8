//! Utility modules for the privileged actions.

pub mod errors;
pub mod logger;

pub use errors::{ActionsError, Result};
