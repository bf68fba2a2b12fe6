//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered as an HTTP response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;
use asset_cleaner_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// No site in the session carries a token.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The session never authorized the requested site.
    #[error("Site {0} is not authorized in this session")]
    SiteNotAuthorized(String),

    /// A request parameter that cannot be forwarded as-is.
    #[error("Invalid {0}")]
    InvalidInput(&'static str),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ApiError::SiteNotAuthorized(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Port(PortError::Unauthorized) => StatusCode::UNAUTHORIZED,
            ApiError::Port(PortError::Forbidden(_)) => StatusCode::FORBIDDEN,
            ApiError::Port(PortError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Port(PortError::Upstream { status, .. }) => match StatusCode::from_u16(*status)
            {
                Ok(code) if code.is_client_error() => code,
                _ => StatusCode::BAD_GATEWAY,
            },
            ApiError::Port(PortError::MalformedJson(_)) | ApiError::Port(PortError::Transport(_)) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Unhandled error: {}", self);
            "Internal server error".to_string()
        } else {
            match &self {
                ApiError::Port(PortError::Upstream { body, .. }) => body.clone(),
                other => other.to_string(),
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
