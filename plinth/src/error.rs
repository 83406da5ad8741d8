use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::actions::ActionError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("App not found: {0}")]
    AppNotFound(String),

    #[error("Archive not found: {0}")]
    ArchiveNotFound(String),

    #[error("Archive already exists: {0}")]
    ArchiveExists(String),

    #[error("Malformed manifest in {origin}: {reason}")]
    MalformedManifest { origin: String, reason: String },

    #[error("Invalid backup manifest for {app}: {reason}")]
    InvalidManifest { app: String, reason: String },

    #[error("{0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::AppNotFound(_) | Error::ArchiveNotFound(_) => StatusCode::NOT_FOUND,
            Error::ArchiveExists(_) => StatusCode::CONFLICT,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::MalformedManifest { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Action(_) => StatusCode::BAD_GATEWAY,
            Error::InvalidManifest { .. }
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let msg = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error: {self:#}");
            "Internal server error".to_string()
        } else {
            if let Error::Action(e) = &self {
                tracing::warn!("Action failed: {e}");
            }
            self.to_string()
        };

        (status, Json(json!({ "error": msg }))).into_response()
    }
}
