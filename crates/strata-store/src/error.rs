use std::io;
use std::path::{Path, PathBuf};

use strata_types::{BranchId, ItemId, PersistentRootId, RevisionId, RevisionNumber};

/// Errors from backing store and store directory operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No revision with this number exists.
    #[error("unknown revision: {0}")]
    UnknownRevision(RevisionNumber),

    /// No revision with this UUID exists.
    #[error("unknown revision id: {0}")]
    UnknownRevisionId(RevisionId),

    /// A parent or merge parent named by a write does not exist.
    #[error("invalid parent revision: {0}")]
    InvalidParent(RevisionNumber),

    /// A genesis write named a different root object than the persistent
    /// root already has.
    #[error("root object mismatch: persistent root has {expected}, write names {found}")]
    RootObjectMismatch { expected: ItemId, found: ItemId },

    /// `from` is not an ancestor of `to` along first-parent edges.
    #[error("revision {from} is not an ancestor of {to}")]
    NotAncestor {
        from: RevisionNumber,
        to: RevisionNumber,
    },

    /// The store or backing store was closed.
    #[error("store is closed")]
    Closed,

    /// A write could not be carried out.
    #[error("write failed: {0}")]
    Write(String),

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A delete would remove a revision that a surviving revision names as
    /// its parent or merge parent.
    #[error("revision {revision} is still referenced by revision {referenced_by}")]
    InUse {
        revision: RevisionNumber,
        referenced_by: RevisionNumber,
    },

    #[error("unknown branch: {0}")]
    UnknownBranch(BranchId),

    #[error("invalid branch name {name:?}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    #[error("unknown persistent root: {0}")]
    UnknownPersistentRoot(PersistentRootId),

    /// The store directory does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A storage file could not be decoded.
    #[error("corrupt store file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Classify an I/O error raised while opening `path`.
    pub(crate) fn from_open(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }

    /// Report storage I/O failures during a write as `Write`.
    pub(crate) fn into_write(self) -> Self {
        match self {
            Self::Io(err) => Self::Write(err.to_string()),
            other => other,
        }
    }

    pub(crate) fn poisoned() -> Self {
        Self::Write("lock poisoned".into())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
