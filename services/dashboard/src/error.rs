//! services/dashboard/src/error.rs
//!
//! Defines the primary error type for the dashboard service, and the mapping of
//! port errors onto HTTP statuses used by the handlers.

use crate::config::ConfigError;
use axum::http::StatusCode;
use tracker_core::ports::PortError;
use tracker_core::ValidationError;

/// The primary error type for the `dashboard` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error building the backend HTTP client.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The error shape returned by every handler.
pub type HandlerError = (StatusCode, String);

pub fn port_status(err: &PortError) -> StatusCode {
    match err {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Unauthorized => StatusCode::UNAUTHORIZED,
        PortError::Invalid(_) => StatusCode::BAD_REQUEST,
        PortError::Unexpected(_) => StatusCode::BAD_GATEWAY,
    }
}

pub fn from_port(err: PortError) -> HandlerError {
    (port_status(&err), err.to_string())
}

pub fn from_validation(err: ValidationError) -> HandlerError {
    (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
}
