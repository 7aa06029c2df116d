//! Structural diff for Strata item graphs.
//!
//! Compares item versions property by property and item graphs item by
//! item, producing change sets used by the editing context's `changes()`
//! query and by revision inspection.
//!
//! # Key Types
//!
//! - [`ItemDiff`] / [`PropertyChange`] -- per-item property changes
//! - [`GraphDiff`] -- per-graph item changes

pub mod graph_diff;
pub mod item_diff;

pub use graph_diff::{diff_graphs, GraphDiff};
pub use item_diff::{
    diff_items, diff_properties, diff_removed_item, DiffKind, ItemDiff, PropertyChange,
};
