//! Revision storage backends.
//!
//! A [`RevisionStorage`] persists the records and branch heads of one
//! persistent root. The backing store keeps its own in-memory index and
//! only calls into storage to load at open and to persist each change
//! before publishing it.

pub mod file;
pub mod memory;

use std::collections::{BTreeMap, BTreeSet};

use strata_types::{BranchId, RevisionNumber};

use crate::branch::Branch;
use crate::error::StoreResult;
use crate::record::{LogEntry, RevisionRecord};

pub use file::{FileRevisionStorage, LogFile};
pub use memory::InMemoryRevisionStorage;

/// Persistence boundary of a backing store.
pub trait RevisionStorage: Send + Sync {
    /// Read every live record and branch.
    fn load(&self) -> StoreResult<StorageSnapshot>;

    /// Persist a revision. Also moves the head of its branch.
    fn append_revision(&self, record: &RevisionRecord) -> StoreResult<()>;

    /// Remove a set of revisions in one step.
    fn delete_revisions(&self, revisions: &BTreeSet<RevisionNumber>) -> StoreResult<()>;

    /// Create or update a branch.
    fn write_branch(&self, branch: &Branch) -> StoreResult<()>;

    /// Drop every revision and branch.
    fn clear(&self) -> StoreResult<()>;

    fn size_in_bytes(&self) -> StoreResult<u64>;

    fn close(&self) -> StoreResult<()>;
}

/// Live state of one persistent root, rebuilt from log entries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StorageSnapshot {
    pub records: BTreeMap<RevisionNumber, RevisionRecord>,
    pub branches: BTreeMap<BranchId, Branch>,
    /// One past the highest revision number ever written, deleted or not.
    pub next_number: RevisionNumber,
}

impl StorageSnapshot {
    /// Apply one log entry. Entries must be applied in append order.
    pub fn apply(&mut self, entry: LogEntry) {
        match entry {
            LogEntry::Revision(record) => {
                self.next_number = self.next_number.max(record.number + 1);
                self.branches
                    .entry(record.branch)
                    .and_modify(|b| b.head = record.number)
                    .or_insert_with(|| Branch::new(record.branch, record.number));
                self.records.insert(record.number, record);
            }
            LogEntry::Delete { revisions, .. } => {
                for number in &revisions {
                    self.records.remove(number);
                }
            }
            LogEntry::Branch { branch, .. } => {
                self.branches.insert(branch.id, branch);
            }
            LogEntry::Clear { .. } => {
                self.records.clear();
                self.branches.clear();
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
