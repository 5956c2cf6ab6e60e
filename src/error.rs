// Error types for task operations

use crate::models::TaskId;
use std::fmt;
use thiserror::Error;

/// Reasons an input is rejected before any mutation happens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task text cannot be empty")]
    EmptyText,
}

/// Errors returned by TaskStore operations
///
/// An operation that returns one of these has not touched the list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("task not found: {0}")]
    NotFound(TaskId),
}

/// Storage read or write failure
///
/// Never fatal: the in-memory list stays authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceWarning {
    pub operation: &'static str,
    pub message: String,
}

impl PersistenceWarning {
    pub(crate) fn new(operation: &'static str, err: &eyre::Report) -> Self {
        Self {
            operation,
            message: format!("{:#}", err),
        }
    }
}

impl fmt::Display for PersistenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.message)
    }
}
