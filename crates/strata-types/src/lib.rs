//! Foundation types for Strata, the versioned object-graph store.
//!
//! This crate provides the item graph model and the identity and temporal
//! types used throughout Strata. Every other Strata crate depends on
//! `strata-types`.
//!
//! # Key Types
//!
//! - [`ItemId`], [`RevisionId`], [`BranchId`], [`PersistentRootId`] — UUID identities
//! - [`Scalar`] / [`Value`] — typed property values, including item references
//! - [`Item`] — a record: UUID plus property values
//! - [`ItemGraph`] — a complete or partial snapshot of an object graph
//! - [`Timestamp`] — monotonic commit timestamp
//! - [`CommitType`] — classification of a revision
//! - [`RevisionNumber`] — dense, store-local revision index

pub mod commit;
pub mod error;
pub mod graph;
pub mod ids;
pub mod item;
pub mod temporal;
pub mod value;

pub use commit::CommitType;
pub use error::TypeError;
pub use graph::ItemGraph;
pub use ids::{BranchId, ItemId, PersistentRootId, RevisionId};
pub use item::Item;
pub use temporal::Timestamp;
pub use value::{Scalar, Value};

/// Dense, store-local revision index. Never a portable identity; use
/// [`RevisionId`] to refer to a revision across stores.
pub type RevisionNumber = u64;

/// Opaque commit metadata, stored and returned verbatim.
pub type Metadata = serde_json::Value;
