//! Read-only views of revisions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strata_diff::{diff_items, ItemDiff};
use strata_types::{
    BranchId, CommitType, ItemGraph, ItemId, Metadata, PersistentRootId, RevisionId,
    RevisionNumber, Timestamp, Value,
};

use crate::record::RevisionRecord;

/// Metadata key holding a revision's one-line description.
pub const SHORT_DESCRIPTION_KEY: &str = "shortDescription";
/// Metadata key holding a revision's full description.
pub const LONG_DESCRIPTION_KEY: &str = "longDescription";

/// Store-local number plus portable UUID of a revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevisionRef {
    pub number: RevisionNumber,
    pub uuid: RevisionId,
}

impl fmt::Display for RevisionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{} ({})", self.number, self.uuid.short_id())
    }
}

/// Identity, lineage, and metadata of a revision. Cheap: built from the
/// record header without touching item data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevisionInfo {
    pub number: RevisionNumber,
    pub uuid: RevisionId,
    pub parent: Option<RevisionNumber>,
    pub merge_parent: Option<RevisionNumber>,
    pub branch: BranchId,
    pub persistent_root: PersistentRootId,
    pub timestamp: Timestamp,
    pub commit_type: CommitType,
    pub metadata: Metadata,
}

impl RevisionInfo {
    pub(crate) fn from_record(record: &RevisionRecord) -> Self {
        Self {
            number: record.number,
            uuid: record.uuid,
            parent: record.parent,
            merge_parent: record.merge_parent,
            branch: record.branch,
            persistent_root: record.persistent_root,
            timestamp: record.timestamp,
            commit_type: record.commit_type.clone(),
            metadata: record.metadata.clone(),
        }
    }

    pub fn revision_ref(&self) -> RevisionRef {
        RevisionRef {
            number: self.number,
            uuid: self.uuid,
        }
    }

    pub fn is_merge(&self) -> bool {
        self.merge_parent.is_some()
    }

    pub fn short_description(&self) -> Option<&str> {
        self.metadata.get(SHORT_DESCRIPTION_KEY)?.as_str()
    }

    pub fn long_description(&self) -> Option<&str> {
        self.metadata.get(LONG_DESCRIPTION_KEY)?.as_str()
    }
}

/// A revision together with its delta and the parent's version of every
/// item in that delta.
#[derive(Clone, Debug, PartialEq)]
pub struct Revision {
    info: RevisionInfo,
    delta: ItemGraph,
    before: ItemGraph,
}

impl Revision {
    pub(crate) fn new(info: RevisionInfo, delta: ItemGraph, before: ItemGraph) -> Self {
        Self {
            info,
            delta,
            before,
        }
    }

    pub fn info(&self) -> &RevisionInfo {
        &self.info
    }

    pub fn number(&self) -> RevisionNumber {
        self.info.number
    }

    /// Items this revision wrote, as whole items.
    pub fn delta(&self) -> &ItemGraph {
        &self.delta
    }

    /// The parent's version of each item in the delta. Items the revision
    /// created are absent.
    pub fn before(&self) -> &ItemGraph {
        &self.before
    }

    /// UUIDs present in this revision's own delta, in sorted order.
    pub fn changed_object_uuids(&self) -> Vec<ItemId> {
        self.delta.uuids().into_iter().collect()
    }

    /// The property changes this revision made to `uuid`, or `None` if the
    /// revision did not touch it.
    pub fn item_diff(&self, uuid: &ItemId) -> Option<ItemDiff> {
        let after = self.delta.item(uuid)?;
        Some(diff_items(self.before.item(uuid), after))
    }

    /// Exactly the property values this revision set on `uuid`: added or
    /// modified properties with their new values. Empty when the revision
    /// did not touch the item.
    pub fn values_and_properties(&self, uuid: &ItemId) -> BTreeMap<String, Value> {
        self.item_diff(uuid)
            .map(|diff| diff.changed_values())
            .unwrap_or_default()
    }
}

/// Options for [`BackingStore::revision_infos`](crate::BackingStore::revision_infos).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RevisionInfoOptions {
    /// Also list the revisions of every branch merged in, recursively.
    pub include_merge_parents: bool,
    /// Keep only the newest `limit` revisions.
    pub limit: Option<usize>,
    /// Return oldest first instead of newest first.
    pub oldest_first: bool,
}

impl RevisionInfoOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_merge_parents(mut self) -> Self {
        self.include_merge_parents = true;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn oldest_first(mut self) -> Self {
        self.oldest_first = true;
        self
    }
}
