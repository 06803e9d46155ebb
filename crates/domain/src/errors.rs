//! Error types used throughout the allocation engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for crewplan
///
/// Every public engine operation is all-or-nothing: any error aborts and
/// rolls back the operation's writes. `Persistence` is the only kind a
/// caller should retry.
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ScheduleError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// One or more overlapping allocations cannot be overridden (or an
    /// equivalent booking already exists). `blocking_ids` carries the ids of
    /// the blocking rows so callers can surface them for manual resolution.
    #[error("Scheduling conflict: {message}")]
    Conflict {
        message: String,
        blocking_ids: Vec<String>,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScheduleError {
    /// Whether a caller may reasonably retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

/// Result type alias for crewplan operations
pub type Result<T> = std::result::Result<T, ScheduleError>;
