//! Error types for the Keka MCP implementation.
//!
//! This module contains the error types shared by the token provider and the
//! tool layer. It provides:
//! - `AuthError`: typed failures of credential resolution and token acquisition
//! - `KekaError`: the gateway error enum that covers every tool-call failure
//! - Conversion to RMCP's `ErrorData` for MCP protocol compliance
//!
//! None of the messages produced here carry a client secret, api key or
//! bearer token. Only tenant keys, URLs and upstream response text appear.

use std::time::Duration;

use reqwest::StatusCode;
use rmcp::{ErrorData, model::ErrorCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing required configuration: {}", .missing.join(", "))]
    Configuration { missing: Vec<&'static str> },

    #[error("Invalid {key}: expected a single host label of ASCII letters, digits and hyphens")]
    InvalidTenant { key: &'static str },

    #[error("Token acquisition failed: {status} - {detail}")]
    TokenAcquisition { status: StatusCode, detail: String },

    #[error("Token endpoint unreachable: {0}")]
    Network(#[source] reqwest_middleware::Error),

    #[error("Token request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Invalid token endpoint: {0}")]
    InvalidEndpoint(String),
}

impl AuthError {
    /// Whether a caller may reasonably try the same request again.
    ///
    /// Configuration problems and 4xx rejections never heal on their own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::TokenAcquisition { status, .. } => status.is_server_error(),
            Self::Configuration { .. } | Self::InvalidTenant { .. } | Self::InvalidEndpoint(_) => {
                false
            }
        }
    }

    /// Upstream status attached to the failure, if the token endpoint answered.
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::TokenAcquisition { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum KekaError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("{method} {url} failed: {status}{}", render_body(.body))]
    Upstream {
        method: reqwest::Method,
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP middleware error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

fn render_body(body: &str) -> String {
    if body.trim().is_empty() {
        String::new()
    } else {
        format!("\nResponse: {body}")
    }
}

impl From<AuthError> for ErrorData {
    fn from(err: AuthError) -> Self {
        KekaError::from(err).into()
    }
}

impl From<KekaError> for ErrorData {
    fn from(err: KekaError) -> Self {
        match err {
            KekaError::InvalidParams(msg) => Self::new(ErrorCode::INVALID_PARAMS, msg, None),
            KekaError::Auth(
                err @ (AuthError::Configuration { .. } | AuthError::InvalidTenant { .. }),
            ) => Self::new(ErrorCode::INVALID_REQUEST, err.to_string(), None),
            KekaError::Http(e) => {
                Self::new(ErrorCode::INTERNAL_ERROR, format!("HTTP error: {e}"), None)
            }
            KekaError::HttpMiddleware(e) => Self::new(
                ErrorCode::INTERNAL_ERROR,
                format!("HTTP middleware error: {e}"),
                None,
            ),
            other => Self::new(ErrorCode::INTERNAL_ERROR, other.to_string(), None),
        }
    }
}
