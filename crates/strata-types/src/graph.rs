//! Item graphs: complete or partial snapshots of an object graph.
//!
//! An [`ItemGraph`] maps [`ItemId`]s to [`Item`]s and names a root item.
//! The same type carries full reconstructions, revision deltas, and the
//! fragments exchanged with live objects; a partial graph simply holds fewer
//! items. References that do not resolve inside the graph are external
//! references and are reported by [`ItemGraph::dangling_references`].

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::ids::ItemId;
use crate::item::Item;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemGraph {
    root: ItemId,
    items: BTreeMap<ItemId, Item>,
}

impl ItemGraph {
    /// An empty graph with the given root.
    pub fn new(root: ItemId) -> Self {
        Self {
            root,
            items: BTreeMap::new(),
        }
    }

    /// Build a graph from items. Duplicate UUIDs keep the last item.
    pub fn from_items(root: ItemId, items: impl IntoIterator<Item = Item>) -> Self {
        let mut graph = Self::new(root);
        graph.extend(items);
        graph
    }

    pub fn root(&self) -> ItemId {
        self.root
    }

    pub fn set_root(&mut self, root: ItemId) {
        self.root = root;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, uuid: &ItemId) -> Option<&Item> {
        self.items.get(uuid)
    }

    pub fn contains(&self, uuid: &ItemId) -> bool {
        self.items.contains_key(uuid)
    }

    /// All item UUIDs.
    pub fn uuids(&self) -> BTreeSet<ItemId> {
        self.items.keys().copied().collect()
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn into_items(self) -> impl Iterator<Item = Item> {
        self.items.into_values()
    }

    /// Insert or replace an item. Returns the previous item with that UUID.
    pub fn insert(&mut self, item: Item) -> Option<Item> {
        self.items.insert(item.uuid(), item)
    }

    pub fn remove(&mut self, uuid: &ItemId) -> Option<Item> {
        self.items.remove(uuid)
    }

    /// Insert every item, replacing existing items with the same UUID.
    pub fn extend(&mut self, items: impl IntoIterator<Item = Item>) {
        for item in items {
            self.insert(item);
        }
    }

    /// Overlay `other` onto this graph: items in `other` win. The root of
    /// this graph is kept.
    pub fn merge_from(&mut self, other: &ItemGraph) {
        self.extend(other.items().cloned());
    }

    /// A copy holding only the items whose UUID is in `uuids`.
    pub fn restricted_to(&self, uuids: &HashSet<ItemId>) -> ItemGraph {
        ItemGraph {
            root: self.root,
            items: self
                .items
                .iter()
                .filter(|(id, _)| uuids.contains(id))
                .map(|(id, item)| (*id, item.clone()))
                .collect(),
        }
    }

    /// UUIDs whose items differ between the two graphs, including UUIDs
    /// present on only one side.
    pub fn differing_uuids(&self, other: &ItemGraph) -> HashSet<ItemId> {
        let mut result: HashSet<ItemId> = self
            .items
            .iter()
            .filter(|(id, item)| other.item(id) != Some(*item))
            .map(|(id, _)| *id)
            .collect();
        result.extend(other.items.keys().filter(|id| !self.contains(id)));
        result
    }

    /// Every UUID referenced by some property in the graph.
    pub fn references(&self) -> BTreeSet<ItemId> {
        self.items.values().flat_map(Item::references).collect()
    }

    /// Referenced UUIDs with no item in this graph.
    pub fn dangling_references(&self) -> BTreeSet<ItemId> {
        self.references()
            .into_iter()
            .filter(|id| !self.contains(id))
            .collect()
    }
}
