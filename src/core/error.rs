//! Typed error handling for the gateway
//!
//! Errors are split by the phase in which they occur:
//!
//! - [`QueryError`]: failures while resolving a single field (backend job,
//!   row mapping, argument lookup). These never abort a whole request; the
//!   async dispatch boundary downgrades them to `null`.
//! - [`MetadataError`]: malformed field descriptor metadata. Fatal at startup.
//! - [`SchemaError`]: SDL that cannot be parsed or wiring that does not match it.
//!   Fatal at startup.
//! - [`ConfigError`]: invalid process configuration. Fatal at startup.
//! - [`RequestError`]: a GraphQL request that cannot be executed at all.
//!
//! [`Error`] aggregates them for callers that do not care about the phase.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Aggregate error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Request(#[from] RequestError),
}

// =============================================================================
// Field resolution errors
// =============================================================================

/// Errors raised while resolving one field against the query backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The backend rejected the job or the job failed while running
    #[error("backend query failed: {message}")]
    Backend { message: String },

    /// Waiting on the backend job was interrupted before results arrived
    #[error("backend query interrupted: {message}")]
    Interrupted { message: String },

    /// A configured result column is absent from a returned row
    #[error("column '{column}' is missing from the result row")]
    MissingColumn { column: String },

    /// The source argument or parent attribute was not present in the call
    #[error("argument or attribute '{name}' is missing from the call context")]
    MissingArgument { name: String },
}

impl QueryError {
    pub fn backend(message: impl Into<String>) -> Self {
        QueryError::Backend {
            message: message.into(),
        }
    }

    pub fn interrupted(message: impl Into<String>) -> Self {
        QueryError::Interrupted {
            message: message.into(),
        }
    }

    /// Short machine-readable code, used in log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            QueryError::Backend { .. } => "BACKEND_QUERY_ERROR",
            QueryError::Interrupted { .. } => "BACKEND_QUERY_INTERRUPTED",
            QueryError::MissingColumn { .. } => "MISSING_COLUMN",
            QueryError::MissingArgument { .. } => "MISSING_ARGUMENT",
        }
    }
}

// =============================================================================
// Startup errors
// =============================================================================

/// Errors raised while loading field descriptor metadata
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read metadata file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse metadata document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid field descriptor at index {index}: {reason}")]
    Invalid { index: usize, reason: String },
}

/// Errors raised while building the executable schema
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to parse schema: {0}")]
    Parse(String),

    #[error("unknown type '{type_name}'")]
    UnknownType { type_name: String },

    #[error("unknown field '{type_name}.{field_name}'")]
    UnknownField {
        type_name: String,
        field_name: String,
    },

    #[error("invalid @{directive} on '{type_name}.{field_name}': {reason}")]
    InvalidDirective {
        directive: String,
        type_name: String,
        field_name: String,
        reason: String,
    },
}

/// Errors raised while loading process configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// =============================================================================
// Request errors
// =============================================================================

/// Errors that prevent a GraphQL request from executing at all
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Failed to parse query: {0}")]
    Parse(String),

    #[error("No operation found in query")]
    NoOperation,

    #[error("Unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("{0} operations are not supported")]
    UnsupportedOperation(&'static str),

    #[error("Unknown field '{field_name}' on type '{type_name}'")]
    UnknownField {
        type_name: String,
        field_name: String,
    },

    #[error("Unknown fragment '{0}'")]
    UnknownFragment(String),
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "errors": [{ "message": self.to_string() }]
        }));
        (self.status_code(), body).into_response()
    }
}
