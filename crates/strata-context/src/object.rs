//! The contract between live domain objects and the editing context.

use strata_types::{Item, ItemGraph, ItemId, Value};

use crate::error::{ContextError, ContextResult};

/// A live object the editing context can cache, persist, and reload.
///
/// The context never looks inside an object. It only asks for the UUID,
/// for the current state as items, and to (re)load state from items. The
/// fragment passed to [`load`](Self::load) and
/// [`instantiate`](Self::instantiate) always contains the object's own item.
pub trait VersionedObject: Sized {
    fn uuid(&self) -> ItemId;

    /// Current state as an item graph fragment. Must include the item whose
    /// UUID is [`uuid`](Self::uuid); may include further items the object
    /// owns.
    fn externalize(&self) -> ItemGraph;

    /// Replace the current state with the state in `fragment`.
    fn load(&mut self, fragment: &ItemGraph) -> ContextResult<()>;

    /// Build an object from `fragment`.
    fn instantiate(uuid: ItemId, fragment: &ItemGraph) -> ContextResult<Self>;
}

/// The object's own item in its externalized state.
pub(crate) fn own_item<O: VersionedObject>(object: &O) -> ContextResult<Item> {
    let uuid = object.uuid();
    object
        .externalize()
        .item(&uuid)
        .cloned()
        .ok_or_else(|| ContextError::Object(format!("object {uuid} did not externalize its item")))
}

/// A single fragment holding `item`.
pub(crate) fn fragment_of(item: Item) -> ItemGraph {
    ItemGraph::from_items(item.uuid(), [item])
}

/// A live object backed directly by one item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemObject {
    item: Item,
}

impl ItemObject {
    pub fn new(uuid: ItemId) -> Self {
        Self {
            item: Item::new(uuid),
        }
    }

    pub fn from_item(item: Item) -> Self {
        Self { item }
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.item.get(property)
    }

    pub fn set(&mut self, property: impl Into<String>, value: impl Into<Value>) {
        self.item = self.item.clone().with_property(property, value);
    }

    pub fn remove(&mut self, property: &str) -> Option<Value> {
        let old = self.item.get(property).cloned();
        self.item = self.item.clone().without_property(property);
        old
    }
}

impl VersionedObject for ItemObject {
    fn uuid(&self) -> ItemId {
        self.item.uuid()
    }

    fn externalize(&self) -> ItemGraph {
        fragment_of(self.item.clone())
    }

    fn load(&mut self, fragment: &ItemGraph) -> ContextResult<()> {
        let uuid = self.item.uuid();
        self.item = fragment
            .item(&uuid)
            .cloned()
            .ok_or(ContextError::UnknownObject(uuid))?;
        Ok(())
    }

    fn instantiate(uuid: ItemId, fragment: &ItemGraph) -> ContextResult<Self> {
        fragment
            .item(&uuid)
            .cloned()
            .map(Self::from_item)
            .ok_or(ContextError::UnknownObject(uuid))
    }
}
