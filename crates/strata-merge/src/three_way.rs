//! Three-way merge of item versions against a common base.
//!
//! Each property is decided independently:
//!
//! | ours vs base | theirs vs base | result                 |
//! |--------------|----------------|------------------------|
//! | unchanged    | unchanged      | base                   |
//! | changed      | unchanged      | ours                   |
//! | unchanged    | changed        | theirs                 |
//! | changed      | changed, equal | the shared value       |
//! | changed      | changed, other | conflict (ours kept)   |
//!
//! Removing a property counts as a change.

use std::collections::BTreeSet;

use strata_types::{Item, Value};
use tracing::debug;

use crate::conflict::Conflict;
use crate::outcome::ItemMerge;

/// Merge `theirs` into `ours` relative to `base`.
///
/// A missing `base` means the item did not exist in the common ancestor, so
/// every property either side holds counts as a change.
pub fn three_way_merge_items(ours: &Item, theirs: &Item, base: Option<&Item>) -> ItemMerge {
    let mut properties: BTreeSet<&String> = ours.properties().keys().collect();
    properties.extend(theirs.properties().keys());
    if let Some(base) = base {
        properties.extend(base.properties().keys());
    }

    let mut merged = ours.clone();
    let mut conflicts = Vec::new();

    for property in properties {
        let o = ours.get(property);
        let t = theirs.get(property);
        let b = base.and_then(|item| item.get(property));

        if o == t || t == b {
            continue;
        }
        if o == b {
            merged = set(merged, property, t);
            continue;
        }
        conflicts.push(Conflict {
            item: ours.uuid(),
            property: property.clone(),
            base: b.cloned(),
            ours: o.cloned(),
            theirs: t.cloned(),
        });
    }

    if !conflicts.is_empty() {
        debug!(item = %ours.uuid(), conflicts = conflicts.len(), "three-way merge conflicts");
    }
    ItemMerge {
        item: merged,
        conflicts,
    }
}

fn set(item: Item, property: &str, value: Option<&Value>) -> Item {
    match value {
        Some(v) => item.with_property(property, v.clone()),
        None => item.without_property(property),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::ItemId;

    fn versions(base: i64, ours: i64, theirs: i64) -> (Item, Item, Item) {
        let id = ItemId::new();
        (
            Item::new(id).with_property("x", base),
            Item::new(id).with_property("x", ours),
            Item::new(id).with_property("x", theirs),
        )
    }

    // ----- one-sided changes -----

    #[test]
    fn only_theirs_changed() {
        let (base, ours, theirs) = versions(1, 1, 2);
        let merge = three_way_merge_items(&ours, &theirs, Some(&base));
        assert!(merge.is_clean());
        assert_eq!(merge.item.get("x"), Some(&Value::from(2)));
    }

    #[test]
    fn only_ours_changed() {
        let (base, ours, theirs) = versions(1, 3, 1);
        let merge = three_way_merge_items(&ours, &theirs, Some(&base));
        assert!(merge.is_clean());
        assert_eq!(merge.item.get("x"), Some(&Value::from(3)));
    }

    #[test]
    fn removal_on_one_side_is_taken() {
        let id = ItemId::new();
        let base = Item::new(id).with_property("x", 1).with_property("y", 1);
        let ours = base.clone();
        let theirs = base.clone().without_property("y");
        let merge = three_way_merge_items(&ours, &theirs, Some(&base));
        assert!(merge.is_clean());
        assert!(merge.item.get("y").is_none());
        assert_eq!(merge.item.get("x"), Some(&Value::from(1)));
    }

    // ----- both sides changed -----

    #[test]
    fn same_change_on_both_sides_is_clean() {
        let (base, ours, theirs) = versions(1, 7, 7);
        let merge = three_way_merge_items(&ours, &theirs, Some(&base));
        assert!(merge.is_clean());
        assert_eq!(merge.item.get("x"), Some(&Value::from(7)));
    }

    #[test]
    fn divergent_changes_conflict_and_keep_ours() {
        let (base, ours, theirs) = versions(2, 3, 4);
        let merge = three_way_merge_items(&ours, &theirs, Some(&base));
        assert_eq!(merge.conflicts.len(), 1);
        let conflict = &merge.conflicts[0];
        assert_eq!(conflict.property, "x");
        assert_eq!(conflict.base, Some(Value::from(2)));
        assert_eq!(conflict.ours, Some(Value::from(3)));
        assert_eq!(conflict.theirs, Some(Value::from(4)));
        assert_eq!(merge.item.get("x"), Some(&Value::from(3)));
    }

    #[test]
    fn missing_base_with_different_values_conflicts() {
        let id = ItemId::new();
        let ours = Item::new(id).with_property("x", 1);
        let theirs = Item::new(id).with_property("x", 2);
        let merge = three_way_merge_items(&ours, &theirs, None);
        assert_eq!(merge.conflicts.len(), 1);
        assert_eq!(merge.conflicts[0].base, None);
    }

    #[test]
    fn conflicts_are_per_property() {
        let id = ItemId::new();
        let base = Item::new(id).with_property("x", 1).with_property("y", 1);
        let ours = Item::new(id).with_property("x", 2).with_property("y", 1);
        let theirs = Item::new(id).with_property("x", 3).with_property("y", 5);
        let merge = three_way_merge_items(&ours, &theirs, Some(&base));
        assert_eq!(merge.conflicts.len(), 1);
        assert_eq!(merge.item.get("y"), Some(&Value::from(5)));
    }
}
