use std::collections::BTreeMap;

use strata_types::{Item, ItemId};

use crate::conflict::{Conflict, ConflictResolver};
use crate::error::{MergeError, MergeResult};

/// Result of merging one item.
///
/// For every conflicting property `item` holds the working copy's value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemMerge {
    pub item: Item,
    pub conflicts: Vec<Conflict>,
}

impl ItemMerge {
    pub fn clean(item: Item) -> Self {
        Self {
            item,
            conflicts: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Merged items plus every conflict found while merging them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub items: BTreeMap<ItemId, Item>,
    pub conflicts: Vec<Conflict>,
}

impl MergeOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the result of one item merge.
    pub fn push(&mut self, merge: ItemMerge) {
        self.conflicts.extend(merge.conflicts);
        self.items.insert(merge.item.uuid(), merge.item);
    }

    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// The merged items, or every conflict if any remain.
    pub fn into_result(self) -> MergeResult<BTreeMap<ItemId, Item>> {
        if self.conflicts.is_empty() {
            Ok(self.items)
        } else {
            Err(MergeError::Conflicts(self.conflicts))
        }
    }

    /// Resolve every conflict with `resolver` and return the merged items.
    pub fn resolve_with(self, resolver: &dyn ConflictResolver) -> BTreeMap<ItemId, Item> {
        let mut items = self.items;
        for conflict in &self.conflicts {
            let Some(item) = items.remove(&conflict.item) else {
                continue;
            };
            let resolved = match resolver.resolve(conflict) {
                Some(value) => item.with_property(conflict.property.clone(), value),
                None => item.without_property(&conflict.property),
            };
            items.insert(conflict.item, resolved);
        }
        items
    }
}

impl FromIterator<ItemMerge> for MergeOutcome {
    fn from_iter<I: IntoIterator<Item = ItemMerge>>(iter: I) -> Self {
        let mut outcome = Self::new();
        for merge in iter {
            outcome.push(merge);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::{PreferOurs, PreferTheirs};
    use strata_types::Value;

    fn conflicted() -> (ItemId, MergeOutcome) {
        let id = ItemId::new();
        let merge = ItemMerge {
            item: Item::new(id).with_property("x", 3).with_property("y", 1),
            conflicts: vec![Conflict {
                item: id,
                property: "x".into(),
                base: Some(Value::from(2)),
                ours: Some(Value::from(3)),
                theirs: Some(Value::from(4)),
            }],
        };
        (id, std::iter::once(merge).collect())
    }

    #[test]
    fn into_result_surfaces_conflicts() {
        let (_, outcome) = conflicted();
        assert!(!outcome.is_clean());
        match outcome.into_result() {
            Err(MergeError::Conflicts(conflicts)) => assert_eq!(conflicts.len(), 1),
            other => panic!("expected conflicts, got {:?}", other),
        }
    }

    #[test]
    fn resolve_with_applies_resolver() {
        let (id, outcome) = conflicted();
        let ours = outcome.clone().resolve_with(&PreferOurs);
        assert_eq!(ours[&id].get("x"), Some(&Value::from(3)));

        let theirs = outcome.resolve_with(&PreferTheirs);
        assert_eq!(theirs[&id].get("x"), Some(&Value::from(4)));
        assert_eq!(theirs[&id].get("y"), Some(&Value::from(1)));
    }

    #[test]
    fn resolver_returning_none_removes_property() {
        let (id, outcome) = conflicted();
        let drop_all = |_: &Conflict| -> Option<Value> { None };
        let items = outcome.resolve_with(&drop_all);
        assert!(items[&id].get("x").is_none());
    }

    #[test]
    fn clean_outcome_returns_items() {
        let id = ItemId::new();
        let outcome: MergeOutcome = [ItemMerge::clean(Item::new(id))].into_iter().collect();
        assert_eq!(outcome.into_result().unwrap().len(), 1);
    }
}
