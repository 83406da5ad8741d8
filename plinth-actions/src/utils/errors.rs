//! Custom error types for the privileged actions.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActionsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid archive path: {0}")]
    InvalidArchivePath(String),

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Archive not found: {0}")]
    ArchiveNotFound(String),

    #[error("Archive already exists: {0}")]
    ArchiveExists(String),

    #[error("File not found in archive: {0}")]
    MissingEntry(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("{0}")]
    ConditionFalse(String),

    #[error("Command {program} failed ({}): {stderr}", .status.map_or("killed".to_string(), |c| format!("exit code {c}")))]
    Command {
        program: String,
        status: Option<i32>,
        stderr: String,
    },
}

impl ActionsError {
    /// Process exit code reported back to the calling service.
    pub fn exit_code(&self) -> u8 {
        match self {
            ActionsError::RepositoryNotFound(_)
            | ActionsError::ArchiveNotFound(_)
            | ActionsError::MissingEntry(_) => 2,
            ActionsError::Config(_)
            | ActionsError::InvalidInput(_)
            | ActionsError::InvalidArchivePath(_) => 3,
            ActionsError::Unsupported(_) => 4,
            ActionsError::ArchiveExists(_) => 5,
            // External tools use their own codes; only the variants above
            // may claim 2-5.
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ActionsError>;
