//! Merge engine for Strata.
//!
//! Implements two-way (last-writer-wins) and three-way item merges, the
//! inverse construction used by selective undo, and explicit conflict
//! results. Conflicts are never resolved implicitly: callers either take the
//! error or pass a [`ConflictResolver`].

pub mod conflict;
pub mod error;
pub mod inverse;
pub mod outcome;
pub mod three_way;
pub mod two_way;

pub use conflict::{Conflict, ConflictResolver, PreferOurs, PreferTheirs};
pub use error::{MergeError, MergeResult};
pub use inverse::{invert_revision_delta, undo_item_change};
pub use outcome::{ItemMerge, MergeOutcome};
pub use three_way::three_way_merge_items;
pub use two_way::two_way_merge_items;
