//! Revision ledger and storage for Strata.
//!
//! A persistent root is a versioned object graph. Its history lives in a
//! [`BackingStore`]: an append-only ledger of revisions, each holding only
//! the items that changed relative to its parent. Any revision's full
//! graph is rebuilt by walking parent edges and applying deltas.
//!
//! # Key Types
//!
//! - [`Store`] -- a directory (or in-memory set) of persistent roots
//! - [`BackingStore`] -- the revision ledger of one persistent root
//! - [`RevisionWrite`] -- builder for a new revision
//! - [`Revision`] / [`RevisionInfo`] -- read-only revision views
//! - [`Branch`] -- a named or anonymous movable head
//!
//! # Storage Backends
//!
//! All backends implement the [`RevisionStorage`] trait:
//!
//! - [`InMemoryRevisionStorage`] -- for tests and transient stores
//! - [`FileRevisionStorage`] -- CRC-framed, zstd-compressed log file
//!
//! # Design Rules
//!
//! 1. Revisions are immutable once written; numbers are never reused.
//! 2. Persist first, then publish: a failed write changes nothing.
//! 3. A delete that would orphan a surviving revision is rejected whole.
//! 4. Snapshots only shorten reconstruction; they never change results.

pub mod backing;
pub mod branch;
pub mod config;
pub mod error;
pub mod record;
pub mod revision;
pub mod snapshot;
pub mod storage;
pub mod store;

pub use backing::{BackingStore, RevisionWrite};
pub use branch::{validate_branch_name, Branch};
pub use config::{StoreConfig, SyncMode, CONFIG_FILE_NAME};
pub use error::{StoreError, StoreResult};
pub use record::{LogEntry, RevisionRecord};
pub use revision::{
    Revision, RevisionInfo, RevisionInfoOptions, RevisionRef, LONG_DESCRIPTION_KEY,
    SHORT_DESCRIPTION_KEY,
};
pub use snapshot::SnapshotCache;
pub use storage::{
    FileRevisionStorage, InMemoryRevisionStorage, LogFile, RevisionStorage, StorageSnapshot,
};
pub use store::Store;
