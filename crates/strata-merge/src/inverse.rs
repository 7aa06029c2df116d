use strata_diff::{diff_items, PropertyChange};
use strata_types::Item;

use crate::outcome::ItemMerge;
use crate::three_way::three_way_merge_items;

/// The inverse of one revision's change to an item.
///
/// `after` is the item as the revision left it and `before` the item in the
/// revision's parent (`None` when the revision created it). The result is
/// `after` with every property the revision touched set back to its earlier
/// value, or removed when the revision added it.
pub fn invert_revision_delta(after: &Item, before: Option<&Item>) -> Item {
    let mut inverse = after.clone();
    for change in diff_items(before, after).changes {
        inverse = match change {
            PropertyChange::Added { property, .. } => inverse.without_property(&property),
            PropertyChange::Removed { property, value } => inverse.with_property(property, value),
            PropertyChange::Modified { property, old, .. } => inverse.with_property(property, old),
        };
    }
    inverse
}

/// Apply the inverse of a revision's change onto the `current` item.
///
/// Runs a three-way merge with the revision's state as base and the
/// inverse as the incoming side, so later edits to the same property show
/// up as conflicts instead of being overwritten.
pub fn undo_item_change(current: &Item, after: &Item, before: Option<&Item>) -> ItemMerge {
    let inverse = invert_revision_delta(after, before);
    three_way_merge_items(current, &inverse, Some(after))
}
