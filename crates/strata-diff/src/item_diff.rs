//! Item-level diff: compare two versions of one item property by property.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_types::{Item, ItemId, Value};

/// How an item differs between two versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiffKind {
    /// The item has no old version.
    Added,
    /// The item has no new version.
    Removed,
    /// Both versions exist.
    Modified,
}

/// A single property change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyChange {
    /// A property was added.
    Added { property: String, value: Value },
    /// A property was removed.
    Removed { property: String, value: Value },
    /// A property's value was replaced.
    Modified {
        property: String,
        old: Value,
        new: Value,
    },
}

impl PropertyChange {
    pub fn property(&self) -> &str {
        match self {
            Self::Added { property, .. }
            | Self::Removed { property, .. }
            | Self::Modified { property, .. } => property,
        }
    }

    /// The value after the change, `None` for a removal.
    pub fn new_value(&self) -> Option<&Value> {
        match self {
            Self::Added { value, .. } => Some(value),
            Self::Modified { new, .. } => Some(new),
            Self::Removed { .. } => None,
        }
    }

    /// The value before the change, `None` for an addition.
    pub fn old_value(&self) -> Option<&Value> {
        match self {
            Self::Added { .. } => None,
            Self::Modified { old, .. } => Some(old),
            Self::Removed { value, .. } => Some(value),
        }
    }
}

/// The differences between two versions of one item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDiff {
    pub uuid: ItemId,
    pub kind: DiffKind,
    /// Property changes, sorted by property name.
    pub changes: Vec<PropertyChange>,
}

impl ItemDiff {
    /// Returns `true` if no property changed.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// The change for `property`, if any.
    pub fn change(&self, property: &str) -> Option<&PropertyChange> {
        self.changes.iter().find(|c| c.property() == property)
    }

    /// New values of every added or modified property.
    pub fn changed_values(&self) -> BTreeMap<String, Value> {
        self.changes
            .iter()
            .filter_map(|c| c.new_value().map(|v| (c.property().to_string(), v.clone())))
            .collect()
    }

    /// Names of every property that changed, including removals.
    pub fn changed_properties(&self) -> Vec<&str> {
        self.changes.iter().map(PropertyChange::property).collect()
    }
}

/// Compare two property maps.
///
/// Properties only in `new` are `Added`, only in `old` are `Removed`, and
/// present in both with different values are `Modified`. The result is
/// sorted by property name.
pub fn diff_properties(
    old: &BTreeMap<String, Value>,
    new: &BTreeMap<String, Value>,
) -> Vec<PropertyChange> {
    let mut changes = Vec::new();

    for (property, old_val) in old {
        match new.get(property) {
            Some(new_val) if new_val != old_val => changes.push(PropertyChange::Modified {
                property: property.clone(),
                old: old_val.clone(),
                new: new_val.clone(),
            }),
            Some(_) => {}
            None => changes.push(PropertyChange::Removed {
                property: property.clone(),
                value: old_val.clone(),
            }),
        }
    }

    for (property, new_val) in new {
        if !old.contains_key(property) {
            changes.push(PropertyChange::Added {
                property: property.clone(),
                value: new_val.clone(),
            });
        }
    }

    changes.sort_by(|a, b| a.property().cmp(b.property()));
    changes
}

/// Diff `new` against its previous version.
///
/// A missing `old` is treated as an item with no properties and yields an
/// `Added` diff listing every property of `new`.
pub fn diff_items(old: Option<&Item>, new: &Item) -> ItemDiff {
    let empty = BTreeMap::new();
    let (kind, old_props) = match old {
        Some(item) => (DiffKind::Modified, item.properties()),
        None => (DiffKind::Added, &empty),
    };
    ItemDiff {
        uuid: new.uuid(),
        kind,
        changes: diff_properties(old_props, new.properties()),
    }
}

/// Diff for an item that no longer exists: every property is `Removed`.
pub fn diff_removed_item(old: &Item) -> ItemDiff {
    ItemDiff {
        uuid: old.uuid(),
        kind: DiffKind::Removed,
        changes: diff_properties(old.properties(), &BTreeMap::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: ItemId) -> Item {
        Item::new(id)
    }

    #[test]
    fn identical_items_have_empty_diff() {
        let a = item(ItemId::new()).with_property("x", 1);
        let diff = diff_items(Some(&a), &a);
        assert!(diff.is_empty());
        assert_eq!(diff.kind, DiffKind::Modified);
    }

    #[test]
    fn missing_old_is_added() {
        let a = item(ItemId::new()).with_property("x", 1).with_property("y", "b");
        let diff = diff_items(None, &a);
        assert_eq!(diff.kind, DiffKind::Added);
        assert_eq!(diff.len(), 2);
        assert!(diff
            .changes
            .iter()
            .all(|c| matches!(c, PropertyChange::Added { .. })));
    }

    #[test]
    fn mixed_changes_sorted_by_property() {
        let id = ItemId::new();
        let old = item(id)
            .with_property("keep", true)
            .with_property("modify", "old")
            .with_property("remove", 42);
        let new = item(id)
            .with_property("keep", true)
            .with_property("modify", "new")
            .with_property("added", 7);

        let diff = diff_items(Some(&old), &new);
        assert_eq!(diff.changed_properties(), vec!["added", "modify", "remove"]);

        match diff.change("modify") {
            Some(PropertyChange::Modified { old, new, .. }) => {
                assert_eq!(*old, Value::from("old"));
                assert_eq!(*new, Value::from("new"));
            }
            other => panic!("expected Modified, got {:?}", other),
        }
    }

    #[test]
    fn changed_values_excludes_removals() {
        let id = ItemId::new();
        let old = item(id).with_property("x", 1).with_property("gone", 0);
        let new = item(id).with_property("x", 2).with_property("fresh", 3);

        let values = diff_items(Some(&old), &new).changed_values();
        assert_eq!(values.len(), 2);
        assert_eq!(values["x"], Value::from(2));
        assert_eq!(values["fresh"], Value::from(3));
    }

    #[test]
    fn removed_item_lists_every_property() {
        let old = item(ItemId::new()).with_property("x", 1).with_property("y", 2);
        let diff = diff_removed_item(&old);
        assert_eq!(diff.kind, DiffKind::Removed);
        assert_eq!(diff.len(), 2);
        assert!(diff.changed_values().is_empty());
    }
}
