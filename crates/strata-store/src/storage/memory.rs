//! In-memory revision storage for tests, transient stores, and embedding.
//!
//! [`InMemoryRevisionStorage`] applies every change to a
//! [`StorageSnapshot`] behind a `RwLock`. Data is lost when it is dropped.

use std::collections::BTreeSet;
use std::sync::RwLock;

use strata_types::{PersistentRootId, RevisionNumber};

use crate::branch::Branch;
use crate::error::{StoreError, StoreResult};
use crate::record::{LogEntry, RevisionRecord};
use crate::storage::{RevisionStorage, StorageSnapshot};

#[derive(Debug)]
pub struct InMemoryRevisionStorage {
    root: PersistentRootId,
    state: RwLock<StorageSnapshot>,
}

impl InMemoryRevisionStorage {
    pub fn new(root: PersistentRootId) -> Self {
        Self {
            root,
            state: RwLock::new(StorageSnapshot::default()),
        }
    }

    fn apply(&self, entry: LogEntry) -> StoreResult<()> {
        let mut state = self.state.write().map_err(|_| StoreError::poisoned())?;
        state.apply(entry);
        Ok(())
    }
}

impl RevisionStorage for InMemoryRevisionStorage {
    fn load(&self) -> StoreResult<StorageSnapshot> {
        let state = self.state.read().map_err(|_| StoreError::poisoned())?;
        Ok(state.clone())
    }

    fn append_revision(&self, record: &RevisionRecord) -> StoreResult<()> {
        self.apply(LogEntry::Revision(record.clone()))
    }

    fn delete_revisions(&self, revisions: &BTreeSet<RevisionNumber>) -> StoreResult<()> {
        self.apply(LogEntry::Delete {
            root: self.root,
            revisions: revisions.clone(),
        })
    }

    fn write_branch(&self, branch: &Branch) -> StoreResult<()> {
        self.apply(LogEntry::Branch {
            root: self.root,
            branch: branch.clone(),
        })
    }

    fn clear(&self) -> StoreResult<()> {
        self.apply(LogEntry::Clear { root: self.root })
    }

    fn size_in_bytes(&self) -> StoreResult<u64> {
        let state = self.state.read().map_err(|_| StoreError::poisoned())?;
        state
            .records
            .values()
            .map(|r| bincode::serialized_size(r).map_err(|e| StoreError::Serialization(e.to_string())))
            .sum()
    }

    fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::{BranchId, CommitType, Item, ItemGraph, ItemId, RevisionId, Timestamp};

    fn record(root: PersistentRootId, number: RevisionNumber) -> RevisionRecord {
        let item = ItemId::new();
        RevisionRecord {
            number,
            uuid: RevisionId::new(),
            parent: None,
            merge_parent: None,
            branch: BranchId::new(),
            persistent_root: root,
            timestamp: Timestamp::new(1, 0),
            commit_type: CommitType::Creation,
            metadata: serde_json::Value::Null,
            delta: ItemGraph::from_items(item, [Item::new(item).with_property("x", 1)]),
        }
    }

    #[test]
    fn load_reflects_writes() {
        let root = PersistentRootId::new();
        let storage = InMemoryRevisionStorage::new(root);
        assert!(storage.load().unwrap().is_empty());

        let rec = record(root, 0);
        storage.append_revision(&rec).unwrap();
        let snapshot = storage.load().unwrap();
        assert_eq!(snapshot.records[&0], rec);
        assert_eq!(snapshot.branches[&rec.branch].head, 0);
    }

    #[test]
    fn size_grows_with_records() {
        let root = PersistentRootId::new();
        let storage = InMemoryRevisionStorage::new(root);
        assert_eq!(storage.size_in_bytes().unwrap(), 0);
        storage.append_revision(&record(root, 0)).unwrap();
        assert!(storage.size_in_bytes().unwrap() > 0);
    }
}
