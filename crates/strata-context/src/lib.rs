//! The editing context (working copy) for Strata.
//!
//! An [`EditingContext`] holds a base revision, a cache of live objects
//! loaded lazily from that revision, and the set of objects changed since.
//! It drives commit, revert, rollback, selective undo, and merges against a
//! [`BackingStore`](strata_store::BackingStore).
//!
//! Live objects implement [`VersionedObject`]; [`ItemObject`] is a ready
//! made object backed by a single item.

pub mod context;
pub mod error;
pub mod object;
pub mod observer;

pub use context::{ContextState, EditingContext};
pub use error::{ContextError, ContextResult};
pub use object::{ItemObject, VersionedObject};
pub use observer::{BaseRevisionChange, BaseRevisionObserver};
