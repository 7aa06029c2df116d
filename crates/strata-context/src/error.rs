use strata_merge::{Conflict, MergeError};
use strata_store::StoreError;
use strata_types::ItemId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    /// The UUID resolves neither in the object cache nor in the base
    /// revision's graph.
    #[error("unknown object: {0}")]
    UnknownObject(ItemId),

    /// The operation needs a backing store but the context is transient.
    #[error("editing context is not persistent")]
    NotPersistent,

    /// A merge or selective undo left conflicts; nothing was applied.
    #[error("{} unresolved merge conflict(s)", .0.len())]
    MergeConflict(Vec<Conflict>),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A live object could not be built from or loaded with item data.
    #[error("object error: {0}")]
    Object(String),
}

impl From<MergeError> for ContextError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::Conflicts(conflicts) => Self::MergeConflict(conflicts),
        }
    }
}

pub type ContextResult<T> = Result<T, ContextError>;
