//! Error types for the merge crate.

use crate::conflict::Conflict;

/// Errors that can occur during merge operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MergeError {
    /// The merge left per-property conflicts the caller must resolve.
    #[error("{} unresolved merge conflict(s)", .0.len())]
    Conflicts(Vec<Conflict>),
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
