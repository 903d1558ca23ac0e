//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how each
//! failure is rendered as an HTTP response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use progression_core::error::{EngineError, ErrorKind};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An error raised by the progression engine.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A malformed or incomplete request.
    #[error("{0}")]
    Validation(String),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error from running the schema migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(e) => match e.kind() {
                ErrorKind::Validation | ErrorKind::Precondition => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Upstream => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Invariant => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            match &self {
                ApiError::Engine(e) if e.kind() == ErrorKind::Upstream => warn!("{}", e),
                other => error!("Request failed: {}", other),
            }
        } else {
            debug!("Request rejected ({}): {}", status, self);
        }

        let body = match &self {
            ApiError::Engine(EngineError::ChallengeInProgress(progress)) => json!({
                "error": self.to_string(),
                "allCompleted": progress.all_completed,
                "timerExpired": progress.timer_expired,
                "participantsCompleted": progress.participants_completed,
                "totalParticipants": progress.total_participants,
            }),
            // Internal details stay in the log.
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => {
                json!({ "error": "Internal server error" })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
