use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad error category used for user-facing handling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RosterErrorCategory {
    /// Invalid input or configuration issue.
    Config,
    /// Settings store or member source failure.
    Storage,
    /// Serialization/deserialization failure.
    Serialization,
    /// Background task failed or was dropped before completing.
    Task,
    /// Internal bug or invariant break.
    Internal,
}

/// Stable error payload surfaced by roster operations that can fail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct RosterError {
    /// High-level error category.
    pub category: RosterErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl RosterError {
    /// Construct a new roster error.
    pub fn new(
        category: RosterErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build the error reported when a background task panicked or was cancelled.
    pub fn task_failed(message: impl Into<String>) -> Self {
        Self::new(RosterErrorCategory::Task, "task_failed", message)
    }

    /// Build the error reported when a member source could not be read.
    pub fn source_unavailable(group_id: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            RosterErrorCategory::Storage,
            "member_source_unavailable",
            format!("cannot load members of group '{group_id}': {message}"),
        )
    }

    /// Whether a retry of the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.category,
            RosterErrorCategory::Storage | RosterErrorCategory::Task
        )
    }
}
