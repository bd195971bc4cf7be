//! Error types for reconciliation passes.
//!
//! Handler failures keep their original cause so callers can inspect the
//! root error without parsing messages.

use crate::resource::Operation;
use thiserror::Error;

/// Errors that can occur while building or running a reconciliation pass
#[derive(Debug, Error)]
pub enum Error {
    /// A required dependency was missing at construction time
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The pass could not start (e.g. the handler chain was empty)
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// A handler operation failed
    #[error("resource '{resource}' failed during {operation}: {source:#}")]
    Resource {
        /// Name of the handler that failed
        resource: String,
        /// The operation that returned the error
        operation: Operation,
        /// The handler's error, with its full causal chain
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// Build an error for a failed handler operation.
    pub fn resource(resource: &str, operation: Operation, source: anyhow::Error) -> Self {
        Error::Resource {
            resource: resource.to_string(),
            operation,
            source,
        }
    }

    /// The innermost cause of a handler failure, if this is one.
    pub fn root_cause(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Resource { source, .. } => Some(source.root_cause()),
            _ => None,
        }
    }

    /// The handler's error as returned, if this is a handler failure.
    ///
    /// Use `downcast_ref` on the result to recover a typed error.
    pub fn handler_error(&self) -> Option<&anyhow::Error> {
        match self {
            Error::Resource { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether this is an execution-failed error
    pub fn is_execution_failed(&self) -> bool {
        matches!(self, Error::ExecutionFailed(_))
    }

    /// Whether this is an invalid-config error
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }
}

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;
