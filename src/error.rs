//! Error types for the worker proxy
//!
//! Every failure a call can hit is an [`AppError`]. Handlers return it directly and
//! the streaming path folds it into the terminal event, so a caller sees the same
//! `code` in both places.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Upstream error bodies are cut to this many characters in messages
const MAX_BODY_SNIPPET: usize = 512;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid or missing proxy credential")]
    Unauthorized,

    #[error("The model '{0}' does not exist")]
    UnknownModel(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upstream {provider} unreachable: {message}")]
    UpstreamUnreachable { provider: String, message: String },

    #[error("Upstream {provider} timed out")]
    UpstreamTimeout { provider: String },

    #[error("Upstream {provider} returned HTTP {status}")]
    UpstreamError {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response from upstream {provider}: {message}")]
    MalformedUpstreamResponse { provider: String, message: String },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Coarse failure category, used for the call state machine and metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    UnknownModel,
    UnsupportedFeature,
    BadRequest,
    UpstreamUnreachable,
    UpstreamTimeout,
    UpstreamError,
    MalformedUpstreamResponse,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::UnknownModel => "unknown_model",
            ErrorKind::UnsupportedFeature => "unsupported_feature",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::UpstreamUnreachable => "upstream_unreachable",
            ErrorKind::UpstreamTimeout => "upstream_timeout",
            ErrorKind::UpstreamError => "upstream_error",
            ErrorKind::MalformedUpstreamResponse => "malformed_upstream_response",
            ErrorKind::Internal => "internal",
        }
    }

    /// Kind for a caller-visible error code, as carried by failed stream events
    pub fn from_code(code: &str) -> Option<Self> {
        let kind = match code {
            "invalid_api_key" => ErrorKind::Unauthorized,
            "model_not_found" => ErrorKind::UnknownModel,
            "unsupported_feature" => ErrorKind::UnsupportedFeature,
            "invalid_request" => ErrorKind::BadRequest,
            "upstream_unreachable" => ErrorKind::UpstreamUnreachable,
            "upstream_timeout" => ErrorKind::UpstreamTimeout,
            "upstream_error" => ErrorKind::UpstreamError,
            "malformed_upstream_response" => ErrorKind::MalformedUpstreamResponse,
            "internal_error" => ErrorKind::Internal,
            _ => return None,
        };
        Some(kind)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Unauthorized => ErrorKind::Unauthorized,
            AppError::UnknownModel(_) => ErrorKind::UnknownModel,
            AppError::UnsupportedFeature(_) => ErrorKind::UnsupportedFeature,
            AppError::BadRequest(_) => ErrorKind::BadRequest,
            AppError::UpstreamUnreachable { .. } => ErrorKind::UpstreamUnreachable,
            AppError::UpstreamTimeout { .. } => ErrorKind::UpstreamTimeout,
            AppError::UpstreamError { .. } => ErrorKind::UpstreamError,
            AppError::MalformedUpstreamResponse { .. } => ErrorKind::MalformedUpstreamResponse,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Machine-readable error code, shared by JSON bodies and stream terminal events
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "invalid_api_key",
            AppError::UnknownModel(_) => "model_not_found",
            AppError::UnsupportedFeature(_) => "unsupported_feature",
            AppError::BadRequest(_) => "invalid_request",
            AppError::UpstreamUnreachable { .. } => "upstream_unreachable",
            AppError::UpstreamTimeout { .. } => "upstream_timeout",
            AppError::UpstreamError { .. } => "upstream_error",
            AppError::MalformedUpstreamResponse { .. } => "malformed_upstream_response",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::UnknownModel(_) => StatusCode::NOT_FOUND,
            AppError::UnsupportedFeature(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamUnreachable { .. } => StatusCode::BAD_GATEWAY,
            AppError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::UpstreamError { status, .. } if *status == 429 => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::UpstreamError { .. } => StatusCode::BAD_GATEWAY,
            AppError::MalformedUpstreamResponse { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to callers. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::UpstreamError { body, .. } if !body.is_empty() => {
                let snippet: String = body.chars().take(MAX_BODY_SNIPPET).collect();
                format!("{}: {}", self, snippet)
            }
            other => other.to_string(),
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "authentication_error",
            AppError::UnknownModel(_)
            | AppError::UnsupportedFeature(_)
            | AppError::BadRequest(_) => "invalid_request_error",
            AppError::UpstreamUnreachable { .. }
            | AppError::UpstreamTimeout { .. }
            | AppError::UpstreamError { .. }
            | AppError::MalformedUpstreamResponse { .. } => "upstream_error",
            AppError::Internal(_) => "server_error",
        }
    }

    fn provider(&self) -> Option<&str> {
        match self {
            AppError::UpstreamUnreachable { provider, .. }
            | AppError::UpstreamTimeout { provider }
            | AppError::UpstreamError { provider, .. }
            | AppError::MalformedUpstreamResponse { provider, .. } => Some(provider),
            _ => None,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// OpenAI-style error details
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_body: Option<String>,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        let (upstream_status, upstream_body) = match err {
            AppError::UpstreamError { status, body, .. } => (Some(*status), Some(body.clone())),
            _ => (None, None),
        };

        ErrorResponse {
            error: ErrorBody {
                message: err.public_message(),
                error_type: err.error_type().to_string(),
                code: err.code().to_string(),
                param: matches!(err, AppError::UnknownModel(_)).then(|| "model".to_string()),
                provider: err.provider().map(str::to_string),
                upstream_status,
                upstream_body,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(ref e) = self {
            tracing::error!(error = %e, "Internal error while handling request");
        }

        let body = ErrorResponse::from(&self);
        (self.status_code(), Json(body)).into_response()
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
