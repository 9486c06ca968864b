//! crates/lorelog_core/src/error.rs
//!
//! Errors surfaced by core operations to their callers.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Missing or malformed input. The caller's fault, never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The article does not exist or is not owned by the caller.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The underlying store is unreachable or rejected the operation.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<PortError> for CoreError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => CoreError::NotFound(what),
            other => CoreError::Storage(other.to_string()),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
