//! Graph-level diff: compare two item graphs item by item.

use serde::{Deserialize, Serialize};
use strata_types::{ItemGraph, ItemId};

use crate::item_diff::{diff_items, diff_removed_item, DiffKind, ItemDiff};

/// The result of comparing two item graphs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDiff {
    /// One entry per differing item, sorted by UUID.
    pub items: Vec<ItemDiff>,
}

impl GraphDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the graphs hold the same items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// The diff for `uuid`, if that item differs.
    pub fn get(&self, uuid: &ItemId) -> Option<&ItemDiff> {
        self.items.iter().find(|d| d.uuid == *uuid)
    }

    pub fn additions(&self) -> usize {
        self.count(DiffKind::Added)
    }

    pub fn removals(&self) -> usize {
        self.count(DiffKind::Removed)
    }

    pub fn modifications(&self) -> usize {
        self.count(DiffKind::Modified)
    }

    /// Total number of property changes across all items.
    pub fn property_changes(&self) -> usize {
        self.items.iter().map(ItemDiff::len).sum()
    }

    fn count(&self, kind: DiffKind) -> usize {
        self.items.iter().filter(|d| d.kind == kind).count()
    }
}

/// Compare two graphs.
///
/// Items only in `new` are reported as `Added`, items only in `old` as
/// `Removed`, and items in both with different properties as `Modified`.
pub fn diff_graphs(old: &ItemGraph, new: &ItemGraph) -> GraphDiff {
    let mut uuids: Vec<ItemId> = old.differing_uuids(new).into_iter().collect();
    uuids.sort();

    let items = uuids
        .into_iter()
        .filter_map(|uuid| match (old.item(&uuid), new.item(&uuid)) {
            (old_item, Some(new_item)) => Some(diff_items(old_item, new_item)),
            (Some(old_item), None) => Some(diff_removed_item(old_item)),
            (None, None) => None,
        })
        .collect();

    GraphDiff { items }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::{Item, Value};

    #[test]
    fn identical_graphs_no_diff() {
        let a = ItemId::new();
        let graph = ItemGraph::from_items(a, [Item::new(a).with_property("x", 1)]);
        assert!(diff_graphs(&graph, &graph).is_empty());
    }

    #[test]
    fn added_removed_and_modified_items() {
        let root = ItemId::new();
        let gone = ItemId::new();
        let fresh = ItemId::new();
        let old = ItemGraph::from_items(
            root,
            [
                Item::new(root).with_property("x", 1),
                Item::new(gone).with_property("y", 2),
            ],
        );
        let new = ItemGraph::from_items(
            root,
            [
                Item::new(root).with_property("x", 2),
                Item::new(fresh).with_property("z", 3),
            ],
        );

        let diff = diff_graphs(&old, &new);
        assert_eq!(diff.len(), 3);
        assert_eq!(diff.additions(), 1);
        assert_eq!(diff.removals(), 1);
        assert_eq!(diff.modifications(), 1);
        assert_eq!(diff.property_changes(), 3);
        assert_eq!(
            diff.get(&root).unwrap().changed_values()["x"],
            Value::from(2)
        );
    }

    #[test]
    fn entries_sorted_by_uuid() {
        let ids: Vec<ItemId> = (0..5).map(|_| ItemId::new()).collect();
        let old = ItemGraph::new(ids[0]);
        let new = ItemGraph::from_items(
            ids[0],
            ids.iter().rev().map(|id| Item::new(*id).with_property("n", 1)),
        );
        let diff = diff_graphs(&old, &new);
        let uuids: Vec<ItemId> = diff.items.iter().map(|d| d.uuid).collect();
        let mut sorted = uuids.clone();
        sorted.sort();
        assert_eq!(uuids, sorted);
    }
}
