use std::collections::BTreeSet;

use strata_types::Item;

/// Last-writer-wins merge of `theirs` into `ours`.
///
/// For every property present in either item, the value from `theirs` wins
/// when it differs, including its absence. Never reports conflicts.
pub fn two_way_merge_items(ours: &Item, theirs: &Item) -> Item {
    let properties: BTreeSet<&str> = ours
        .property_names()
        .chain(theirs.property_names())
        .collect();
    let mut merged = ours.clone();
    for property in properties {
        match (ours.get(property), theirs.get(property)) {
            (ours_value, Some(value)) if ours_value != Some(value) => {
                merged = merged.with_property(property, value.clone());
            }
            (Some(_), None) => merged = merged.without_property(property),
            _ => {}
        }
    }
    merged
}
