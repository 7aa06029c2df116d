use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::ItemId;
use crate::value::Value;

/// A record in an object graph: an identity plus named property values.
///
/// Items are value snapshots. The builder-style methods return new items;
/// nothing mutates an item that another context may be holding.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    uuid: ItemId,
    properties: BTreeMap<String, Value>,
}

impl Item {
    /// An item with no properties.
    pub fn new(uuid: ItemId) -> Self {
        Self {
            uuid,
            properties: BTreeMap::new(),
        }
    }

    /// An item with the given properties.
    pub fn with_properties(uuid: ItemId, properties: BTreeMap<String, Value>) -> Self {
        Self { uuid, properties }
    }

    pub fn uuid(&self) -> ItemId {
        self.uuid
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn into_properties(self) -> BTreeMap<String, Value> {
        self.properties
    }

    /// Property names in sorted order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    /// A copy of this item with `property` set to `value`.
    pub fn with_property(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(property.into(), value.into());
        self
    }

    /// A copy of this item without `property`.
    pub fn without_property(mut self, property: &str) -> Self {
        self.properties.remove(property);
        self
    }

    /// Every item referenced from any property.
    pub fn references(&self) -> Vec<ItemId> {
        self.properties.values().flat_map(Value::references).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_and_removes() {
        let id = ItemId::new();
        let item = Item::new(id).with_property("x", 1).with_property("label", "a");
        assert_eq!(item.get("x"), Some(&Value::from(1)));
        assert_eq!(item.property_names().collect::<Vec<_>>(), vec!["label", "x"]);

        let trimmed = item.clone().without_property("x");
        assert!(trimmed.get("x").is_none());
        // The original value is untouched.
        assert!(item.get("x").is_some());
    }

    #[test]
    fn equality_is_structural() {
        let id = ItemId::new();
        let a = Item::new(id).with_property("x", 1);
        let b = Item::new(id).with_property("x", 1);
        let c = Item::new(id).with_property("x", 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, Item::new(ItemId::new()).with_property("x", 1));
    }

    #[test]
    fn references_span_properties() {
        let target = ItemId::new();
        let item = Item::new(ItemId::new())
            .with_property("parent", target)
            .with_property("children", Value::set([ItemId::new()]));
        assert_eq!(item.references().len(), 2);
        assert!(item.references().contains(&target));
    }
}
