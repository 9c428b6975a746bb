//! Error types for the Fabric Deployer
//!
//! Provides structured error types for request validation, backend access,
//! configuration loading and the REST surface.

use axum::http::StatusCode;
use thiserror::Error;

/// Unified error type for the deployer
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Backend Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("Resource already exists: {kind}/{name}")]
    ResourceExists { kind: String, name: String },

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("invalid {kind} version: {version}")]
    InvalidVersion { kind: String, version: String },

    #[error("no default version configured for {kind}")]
    NoDefaultVersion { kind: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    ConflictingActions(String),

    #[error("{0}")]
    ReplicasNotAllowed(String),

    #[error("section '{section}' is not supported for {operation}")]
    UnsupportedSection { operation: String, section: String },

    #[error("Quantity parse error: {0}")]
    QuantityParse(String),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error was raised before any backend mutation, from the
    /// request alone
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidVersion { .. }
                | Error::NoDefaultVersion { .. }
                | Error::InvalidRequest(_)
                | Error::ConflictingActions(_)
                | Error::ReplicasNotAllowed(_)
                | Error::UnsupportedSection { .. }
                | Error::QuantityParse(_)
        )
    }

    /// Check if this error is transient (a backend read may be retried)
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Kube(_) | Error::Backend(_) => {
                !matches!(
                    self.status_code(),
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST
                )
            }
            _ => false,
        }
    }

    /// HTTP status code reported to the caller for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            Error::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            Error::ResourceExists { .. } => StatusCode::CONFLICT,
            Error::Kube(e) => classify_backend_message(&e.to_string()),
            Error::Backend(msg) => classify_backend_message(msg),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code for API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidVersion { .. } => "invalid_version",
            Error::NoDefaultVersion { .. } => "no_default_version",
            Error::InvalidRequest(_) | Error::QuantityParse(_) => "invalid_request",
            Error::ConflictingActions(_) => "conflicting_actions",
            Error::ReplicasNotAllowed(_) => "replicas_not_allowed",
            Error::UnsupportedSection { .. } => "unsupported_section",
            Error::ResourceNotFound { .. } => "not_found",
            Error::ResourceExists { .. } => "already_exists",
            Error::Kube(_) | Error::Backend(_) => "backend_error",
            _ => "internal_error",
        }
    }
}

/// Map a backend error message onto a response status by matching the
/// substrings the Kubernetes API server uses in its failure reasons.
pub fn classify_backend_message(message: &str) -> StatusCode {
    let lower = message.to_lowercase();
    if lower.contains("not found") || lower.contains("notfound") {
        StatusCode::NOT_FOUND
    } else if lower.contains("already exists")
        || lower.contains("alreadyexists")
        || lower.contains("conflict")
    {
        StatusCode::CONFLICT
    } else if lower.contains("unauthorized") {
        StatusCode::UNAUTHORIZED
    } else if lower.contains("forbidden") {
        StatusCode::FORBIDDEN
    } else if lower.contains("bad request") || lower.contains("badrequest") {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Result type alias for the deployer
pub type Result<T> = std::result::Result<T, Error>;
