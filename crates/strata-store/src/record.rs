//! Persisted revision records and log entries.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strata_types::{
    BranchId, CommitType, ItemGraph, ItemId, Metadata, PersistentRootId, RevisionId,
    RevisionNumber, Timestamp,
};

use crate::branch::Branch;

/// One revision as written to storage.
///
/// `delta` holds whole items: every item whose value differs from the
/// parent's reconstructed graph. Its root is the persistent root's root
/// object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub number: RevisionNumber,
    pub uuid: RevisionId,
    pub parent: Option<RevisionNumber>,
    pub merge_parent: Option<RevisionNumber>,
    pub branch: BranchId,
    pub persistent_root: PersistentRootId,
    pub timestamp: Timestamp,
    pub commit_type: CommitType,
    #[serde(with = "metadata_json")]
    pub metadata: Metadata,
    pub delta: ItemGraph,
}

impl RevisionRecord {
    pub fn root_object(&self) -> ItemId {
        self.delta.root()
    }

    pub fn is_genesis(&self) -> bool {
        self.parent.is_none()
    }

    /// Parent and merge parent, in that order.
    pub fn parents(&self) -> impl Iterator<Item = RevisionNumber> {
        self.parent.into_iter().chain(self.merge_parent)
    }
}

/// One frame of a store log.
///
/// A `Revision` entry also moves the head of the revision's branch to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LogEntry {
    Revision(RevisionRecord),
    Delete {
        root: PersistentRootId,
        revisions: BTreeSet<RevisionNumber>,
    },
    Branch {
        root: PersistentRootId,
        branch: Branch,
    },
    Clear {
        root: PersistentRootId,
    },
}

impl LogEntry {
    pub fn root(&self) -> PersistentRootId {
        match self {
            Self::Revision(record) => record.persistent_root,
            Self::Delete { root, .. } | Self::Branch { root, .. } | Self::Clear { root } => *root,
        }
    }
}

/// Metadata is carried as JSON text: bincode cannot decode self-describing
/// values.
mod metadata_json {
    use serde::{Deserialize, Deserializer, Serializer};
    use strata_types::Metadata;

    pub fn serialize<S: Serializer>(value: &Metadata, serializer: S) -> Result<S::Ok, S::Error> {
        let text = serde_json::to_string(value).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Metadata, D::Error> {
        let text = String::deserialize(deserializer)?;
        serde_json::from_str(&text).map_err(serde::de::Error::custom)
    }
}
