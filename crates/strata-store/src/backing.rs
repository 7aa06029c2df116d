//! The revision ledger of one persistent root.
//!
//! A [`BackingStore`] keeps an in-memory index of every live revision (an
//! arena keyed by revision number plus a UUID lookup table) over a
//! [`RevisionStorage`] that persists them. Revisions are stored as deltas:
//! the whole items that differ from the parent's graph. A graph is rebuilt
//! by walking first-parent edges back to genesis, or to a cached snapshot,
//! and applying the deltas oldest to newest.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::ops::RangeInclusive;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use strata_types::{
    BranchId, CommitType, ItemGraph, ItemId, Metadata, PersistentRootId, RevisionId,
    RevisionNumber, Timestamp,
};
use tracing::{debug, info};

use crate::branch::{validate_branch_name, Branch};
use crate::error::{StoreError, StoreResult};
use crate::record::RevisionRecord;
use crate::revision::{Revision, RevisionInfo, RevisionInfoOptions};
use crate::snapshot::SnapshotCache;
use crate::storage::{RevisionStorage, StorageSnapshot};

/// A revision to be written.
///
/// Built with [`RevisionWrite::new`] and `with_*` methods:
///
/// ```ignore
/// let write = RevisionWrite::new(graph, branch)
///     .with_parent(3)
///     .with_commit_type(CommitType::Edit);
/// ```
#[derive(Clone, Debug)]
pub struct RevisionWrite {
    pub graph: ItemGraph,
    pub uuid: RevisionId,
    pub parent: Option<RevisionNumber>,
    pub merge_parent: Option<RevisionNumber>,
    pub branch: BranchId,
    pub commit_type: CommitType,
    pub metadata: Metadata,
}

impl RevisionWrite {
    /// A genesis write of `graph` on `branch` with a fresh revision UUID.
    pub fn new(graph: ItemGraph, branch: BranchId) -> Self {
        Self {
            graph,
            uuid: RevisionId::new(),
            parent: None,
            merge_parent: None,
            branch,
            commit_type: CommitType::Creation,
            metadata: Metadata::Null,
        }
    }

    pub fn with_uuid(mut self, uuid: RevisionId) -> Self {
        self.uuid = uuid;
        self
    }

    /// Set the parent. Also switches a `Creation` commit type to `Edit`.
    pub fn with_parent(mut self, parent: RevisionNumber) -> Self {
        self.parent = Some(parent);
        if self.commit_type == CommitType::Creation {
            self.commit_type = CommitType::Edit;
        }
        self
    }

    pub fn with_merge_parent(mut self, merge_parent: RevisionNumber) -> Self {
        self.merge_parent = Some(merge_parent);
        self
    }

    pub fn with_commit_type(mut self, commit_type: CommitType) -> Self {
        self.commit_type = commit_type;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

struct IndexedRevision {
    record: Arc<RevisionRecord>,
    /// Distance from genesis along first-parent edges.
    depth: u64,
}

struct LedgerState {
    revisions: BTreeMap<RevisionNumber, IndexedRevision>,
    by_uuid: HashMap<RevisionId, RevisionNumber>,
    branches: BTreeMap<BranchId, Branch>,
    next_number: RevisionNumber,
    last_timestamp: Option<Timestamp>,
    closed: bool,
}

impl LedgerState {
    fn from_snapshot(snapshot: StorageSnapshot) -> Self {
        let mut state = Self {
            revisions: BTreeMap::new(),
            by_uuid: HashMap::new(),
            branches: snapshot.branches,
            next_number: snapshot.next_number,
            last_timestamp: None,
            closed: false,
        };
        // Parents always carry lower numbers, so ascending order sees them first.
        for (number, record) in snapshot.records {
            let depth = record
                .parent
                .and_then(|p| state.revisions.get(&p))
                .map_or(0, |parent| parent.depth + 1);
            state.last_timestamp = state.last_timestamp.max(Some(record.timestamp));
            state.by_uuid.insert(record.uuid, number);
            state.revisions.insert(
                number,
                IndexedRevision {
                    record: Arc::new(record),
                    depth,
                },
            );
        }
        state
    }

    fn entry(&self, number: RevisionNumber) -> StoreResult<&IndexedRevision> {
        self.revisions
            .get(&number)
            .ok_or(StoreError::UnknownRevision(number))
    }

    fn root_object(&self) -> Option<ItemId> {
        self.revisions
            .values()
            .next()
            .map(|entry| entry.record.root_object())
    }

    /// Ascending first-parent path `from ..= to`.
    fn first_parent_path(
        &self,
        from: RevisionNumber,
        to: RevisionNumber,
    ) -> StoreResult<Vec<RevisionNumber>> {
        self.entry(from)?;
        let mut path = vec![to];
        let mut current = to;
        while current != from {
            match self.entry(current)?.record.parent {
                Some(parent) if parent >= from => {
                    path.push(parent);
                    current = parent;
                }
                _ => return Err(StoreError::NotAncestor { from, to }),
            }
        }
        path.reverse();
        Ok(path)
    }

    /// `start` and every revision reachable over parent and merge-parent
    /// edges.
    fn ancestors(&self, start: RevisionNumber) -> HashSet<RevisionNumber> {
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            if let Some(entry) = self.revisions.get(&current) {
                for parent in entry.record.parents() {
                    if visited.insert(parent) {
                        queue.push_back(parent);
                    }
                }
            }
        }
        visited
    }
}

/// Revision ledger of one persistent root.
///
/// Reads take a shared lock; writes, deletes and branch moves take the
/// exclusive lock, persist through the storage first, and only then update
/// the in-memory index, so a failed write leaves the ledger unchanged.
pub struct BackingStore {
    root: PersistentRootId,
    storage: Box<dyn RevisionStorage>,
    state: RwLock<LedgerState>,
    snapshots: SnapshotCache,
    root_object: OnceLock<ItemId>,
}

impl BackingStore {
    /// Load the ledger of `root` from `storage`.
    pub fn open(
        root: PersistentRootId,
        storage: Box<dyn RevisionStorage>,
        snapshot_interval: u64,
    ) -> StoreResult<Self> {
        let state = LedgerState::from_snapshot(storage.load()?);
        info!(
            root = %root,
            revisions = state.revisions.len(),
            branches = state.branches.len(),
            "backing store opened"
        );
        Ok(Self {
            root,
            storage,
            state: RwLock::new(state),
            snapshots: SnapshotCache::new(snapshot_interval),
            root_object: OnceLock::new(),
        })
    }

    pub fn persistent_root(&self) -> PersistentRootId {
        self.root
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, LedgerState>> {
        let state = self.state.read().map_err(|_| StoreError::poisoned())?;
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, LedgerState>> {
        let state = self.state.write().map_err(|_| StoreError::poisoned())?;
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state)
    }

    // ----- writes -----

    /// Persist a new revision and move its branch head to it.
    ///
    /// Only items that differ from the parent's graph are stored. Items
    /// missing from the supplied graph are unchanged.
    pub fn write_revision(&self, write: RevisionWrite) -> StoreResult<RevisionNumber> {
        let mut state = self.write()?;
        let RevisionWrite {
            graph,
            uuid,
            parent,
            merge_parent,
            branch,
            commit_type,
            metadata,
        } = write;

        for p in parent.iter().chain(merge_parent.iter()) {
            if !state.revisions.contains_key(p) {
                return Err(StoreError::InvalidParent(*p));
            }
        }
        if state.by_uuid.contains_key(&uuid) {
            return Err(StoreError::Write(format!("duplicate revision id {uuid}")));
        }

        let known_root = state.root_object().or_else(|| self.root_object.get().copied());
        let root_object = match known_root {
            Some(existing) if parent.is_none() && existing != graph.root() => {
                return Err(StoreError::RootObjectMismatch {
                    expected: existing,
                    found: graph.root(),
                });
            }
            Some(existing) => existing,
            None => graph.root(),
        };

        let (delta, depth) = match parent {
            Some(p) => {
                let uuids: HashSet<ItemId> = graph.uuids().into_iter().collect();
                let previous = self.reconstruct(&state, p, Some(&uuids))?;
                let mut delta = ItemGraph::new(root_object);
                delta.extend(
                    graph
                        .into_items()
                        .filter(|item| previous.item(&item.uuid()) != Some(item)),
                );
                (delta, state.entry(p)?.depth + 1)
            }
            None => {
                let mut delta = graph;
                delta.set_root(root_object);
                (delta, 0)
            }
        };

        let number = state.next_number;
        let timestamp = Timestamp::next_after(state.last_timestamp, Timestamp::now());
        let record = RevisionRecord {
            number,
            uuid,
            parent,
            merge_parent,
            branch,
            persistent_root: self.root,
            timestamp,
            commit_type,
            metadata,
            delta,
        };

        self.storage
            .append_revision(&record)
            .map_err(StoreError::into_write)?;

        debug!(
            revision = number,
            parent = ?parent,
            merge_parent = ?merge_parent,
            items = record.delta.len(),
            "revision written"
        );
        state.next_number = number + 1;
        state.last_timestamp = Some(timestamp);
        state.by_uuid.insert(uuid, number);
        state
            .branches
            .entry(branch)
            .and_modify(|b| b.head = number)
            .or_insert_with(|| Branch::new(branch, number));
        state.revisions.insert(
            number,
            IndexedRevision {
                record: Arc::new(record),
                depth,
            },
        );
        let _ = self.root_object.set(root_object);
        Ok(number)
    }

    /// Remove revisions and their deltas.
    ///
    /// Rejected as a whole with `InUse` if a revision outside the set names
    /// one inside it as parent or merge parent. Branch heads are not
    /// checked.
    pub fn delete_revisions(&self, revisions: &BTreeSet<RevisionNumber>) -> StoreResult<()> {
        let mut state = self.write()?;
        for number in revisions {
            state.entry(*number)?;
        }
        for (number, entry) in &state.revisions {
            if revisions.contains(number) {
                continue;
            }
            if let Some(parent) = entry.record.parents().find(|p| revisions.contains(p)) {
                return Err(StoreError::InUse {
                    revision: parent,
                    referenced_by: *number,
                });
            }
        }
        if revisions.is_empty() {
            return Ok(());
        }

        self.storage
            .delete_revisions(revisions)
            .map_err(StoreError::into_write)?;

        for number in revisions {
            if let Some(entry) = state.revisions.remove(number) {
                state.by_uuid.remove(&entry.record.uuid);
            }
        }
        self.snapshots.evict(revisions);
        debug!(count = revisions.len(), revisions = ?revisions, "revisions deleted");
        Ok(())
    }

    /// Drop every revision and branch of this persistent root. Revision
    /// numbers keep counting from where they were.
    pub fn clear(&self) -> StoreResult<()> {
        let mut state = self.write()?;
        self.storage.clear().map_err(StoreError::into_write)?;
        state.revisions.clear();
        state.by_uuid.clear();
        state.branches.clear();
        self.snapshots.clear();
        debug!(root = %self.root, "backing store cleared");
        Ok(())
    }

    /// Move (or create) a branch.
    pub fn set_branch_head(&self, branch: BranchId, head: RevisionNumber) -> StoreResult<()> {
        let mut state = self.write()?;
        state.entry(head)?;
        let mut updated = state
            .branches
            .get(&branch)
            .cloned()
            .unwrap_or_else(|| Branch::new(branch, head));
        updated.head = head;
        self.storage
            .write_branch(&updated)
            .map_err(StoreError::into_write)?;
        debug!(branch = %branch, head, "branch moved");
        state.branches.insert(branch, updated);
        Ok(())
    }

    /// Give an existing branch a display name.
    pub fn name_branch(&self, branch: BranchId, name: &str) -> StoreResult<()> {
        validate_branch_name(name)?;
        let mut state = self.write()?;
        let mut updated = state
            .branches
            .get(&branch)
            .cloned()
            .ok_or(StoreError::UnknownBranch(branch))?;
        updated.name = Some(name.to_string());
        self.storage
            .write_branch(&updated)
            .map_err(StoreError::into_write)?;
        state.branches.insert(branch, updated);
        Ok(())
    }

    /// Release the storage. Idempotent; every other operation fails with
    /// `Closed` afterwards.
    pub fn close(&self) -> StoreResult<()> {
        let mut state = self.state.write().map_err(|_| StoreError::poisoned())?;
        if state.closed {
            return Ok(());
        }
        self.storage.close()?;
        state.closed = true;
        self.snapshots.clear();
        info!(root = %self.root, "backing store closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().map(|s| s.closed).unwrap_or(true)
    }

    // ----- reconstruction -----

    /// Walk first-parent edges from `revision` to genesis or the nearest
    /// snapshot, then apply deltas oldest to newest.
    fn reconstruct(
        &self,
        state: &LedgerState,
        revision: RevisionNumber,
        filter: Option<&HashSet<ItemId>>,
    ) -> StoreResult<ItemGraph> {
        let target = state.entry(revision)?;

        let mut chain: Vec<&RevisionRecord> = Vec::new();
        let mut base = None;
        let mut current = Some(revision);
        while let Some(number) = current {
            if let Some(snapshot) = self.snapshots.get(number) {
                base = Some(snapshot);
                break;
            }
            let entry = state.entry(number)?;
            chain.push(entry.record.as_ref());
            current = entry.record.parent;
        }

        let mut graph = match (&base, filter) {
            (Some(snapshot), Some(uuids)) => snapshot.restricted_to(uuids),
            (Some(snapshot), None) => ItemGraph::clone(snapshot),
            (None, _) => ItemGraph::new(target.record.root_object()),
        };
        for record in chain.iter().rev() {
            graph.extend(
                record
                    .delta
                    .items()
                    .filter(|item| filter.map_or(true, |uuids| uuids.contains(&item.uuid())))
                    .cloned(),
            );
        }
        graph.set_root(target.record.root_object());

        if filter.is_none() && !chain.is_empty() && self.snapshots.wants(target.depth) {
            self.snapshots.insert(revision, graph.clone());
        }
        Ok(graph)
    }

    /// The full graph at `revision`.
    pub fn item_graph(&self, revision: RevisionNumber) -> StoreResult<ItemGraph> {
        let state = self.read()?;
        self.reconstruct(&state, revision, None)
    }

    /// The graph at `revision`, holding only the items named in `uuids`.
    pub fn item_graph_restricted(
        &self,
        revision: RevisionNumber,
        uuids: &HashSet<ItemId>,
    ) -> StoreResult<ItemGraph> {
        let state = self.read()?;
        self.reconstruct(&state, revision, Some(uuids))
    }

    /// Items changed after `from` up to and including `to`, newest value
    /// winning. `from` must be a strict first-parent ancestor of `to`.
    pub fn partial_item_graph(
        &self,
        from: RevisionNumber,
        to: RevisionNumber,
    ) -> StoreResult<ItemGraph> {
        self.partial(from, to, None)
    }

    /// [`partial_item_graph`](Self::partial_item_graph) restricted to `uuids`.
    pub fn partial_item_graph_restricted(
        &self,
        from: RevisionNumber,
        to: RevisionNumber,
        uuids: &HashSet<ItemId>,
    ) -> StoreResult<ItemGraph> {
        self.partial(from, to, Some(uuids))
    }

    fn partial(
        &self,
        from: RevisionNumber,
        to: RevisionNumber,
        filter: Option<&HashSet<ItemId>>,
    ) -> StoreResult<ItemGraph> {
        let state = self.read()?;
        let path = state.first_parent_path(from, to)?;
        if path.len() < 2 {
            return Err(StoreError::NotAncestor { from, to });
        }

        let mut graph = ItemGraph::new(state.entry(to)?.record.root_object());
        for number in &path[1..] {
            let record = &state.entry(*number)?.record;
            graph.extend(
                record
                    .delta
                    .items()
                    .filter(|item| filter.map_or(true, |uuids| uuids.contains(&item.uuid())))
                    .cloned(),
            );
        }
        Ok(graph)
    }

    // ----- revision queries -----

    /// Ascending first-parent path from `from` to `to`, both included.
    pub fn revision_numbers_between(
        &self,
        from: RevisionNumber,
        to: RevisionNumber,
    ) -> StoreResult<Vec<RevisionNumber>> {
        self.read()?.first_parent_path(from, to)
    }

    /// Lowest and highest live revision numbers. There may be holes.
    pub fn used_revision_range(&self) -> StoreResult<Option<RangeInclusive<RevisionNumber>>> {
        let state = self.read()?;
        let first = state.revisions.keys().next().copied();
        let last = state.revisions.keys().next_back().copied();
        Ok(first.zip(last).map(|(lo, hi)| lo..=hi))
    }

    pub fn revision_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.revisions.len())
    }

    pub fn has_revision(&self, revision: RevisionNumber) -> StoreResult<bool> {
        Ok(self.read()?.revisions.contains_key(&revision))
    }

    pub fn revision_number(&self, uuid: &RevisionId) -> StoreResult<RevisionNumber> {
        self.read()?
            .by_uuid
            .get(uuid)
            .copied()
            .ok_or(StoreError::UnknownRevisionId(*uuid))
    }

    pub fn revision_uuid(&self, revision: RevisionNumber) -> StoreResult<RevisionId> {
        Ok(self.read()?.entry(revision)?.record.uuid)
    }

    pub fn revision_info(&self, revision: RevisionNumber) -> StoreResult<RevisionInfo> {
        Ok(RevisionInfo::from_record(
            &self.read()?.entry(revision)?.record,
        ))
    }

    pub fn revision_info_for_uuid(&self, uuid: &RevisionId) -> StoreResult<RevisionInfo> {
        let state = self.read()?;
        let number = state
            .by_uuid
            .get(uuid)
            .copied()
            .ok_or(StoreError::UnknownRevisionId(*uuid))?;
        Ok(RevisionInfo::from_record(&state.entry(number)?.record))
    }

    /// Every live revision, ascending.
    pub fn all_revision_infos(&self) -> StoreResult<Vec<RevisionInfo>> {
        Ok(self
            .read()?
            .revisions
            .values()
            .map(|entry| RevisionInfo::from_record(&entry.record))
            .collect())
    }

    /// A revision with its delta and the parent's version of the delta's
    /// items.
    pub fn revision(&self, revision: RevisionNumber) -> StoreResult<Revision> {
        let state = self.read()?;
        let record = &state.entry(revision)?.record;
        let before = match record.parent {
            Some(parent) => {
                let uuids: HashSet<ItemId> = record.delta.uuids().into_iter().collect();
                self.reconstruct(&state, parent, Some(&uuids))?
            }
            None => ItemGraph::new(record.root_object()),
        };
        Ok(Revision::new(
            RevisionInfo::from_record(record),
            record.delta.clone(),
            before,
        ))
    }

    /// History of `branch` ending at `head`, newest first by default.
    ///
    /// Follows first-parent edges while revisions belong to `branch`. With
    /// `include_merge_parents` the own revisions of every merged branch are
    /// listed too. `limit` keeps the newest revisions.
    pub fn revision_infos(
        &self,
        branch: BranchId,
        head: RevisionNumber,
        options: RevisionInfoOptions,
    ) -> StoreResult<Vec<RevisionInfo>> {
        let state = self.read()?;
        state.entry(head)?;

        let mut selected = BTreeSet::new();
        let mut pending = vec![(branch, head)];
        while let Some((branch, start)) = pending.pop() {
            let mut current = Some(start);
            while let Some(number) = current {
                let Some(entry) = state.revisions.get(&number) else {
                    break;
                };
                if entry.record.branch != branch || !selected.insert(number) {
                    break;
                }
                if options.include_merge_parents {
                    if let Some(merged) = entry
                        .record
                        .merge_parent
                        .and_then(|m| state.revisions.get(&m))
                    {
                        pending.push((merged.record.branch, merged.record.number));
                    }
                }
                current = entry.record.parent;
            }
        }

        let mut infos: Vec<RevisionInfo> = selected
            .iter()
            .rev()
            .filter_map(|number| state.revisions.get(number))
            .map(|entry| RevisionInfo::from_record(&entry.record))
            .collect();
        if let Some(limit) = options.limit {
            infos.truncate(limit);
        }
        if options.oldest_first {
            infos.reverse();
        }
        Ok(infos)
    }

    /// Nearest common ancestor of two revisions over parent and
    /// merge-parent edges. Among several candidates the highest number wins.
    pub fn common_ancestor(
        &self,
        a: RevisionNumber,
        b: RevisionNumber,
    ) -> StoreResult<Option<RevisionNumber>> {
        let state = self.read()?;
        state.entry(a)?;
        state.entry(b)?;
        let ancestors_a = state.ancestors(a);
        let ancestors_b = state.ancestors(b);
        Ok(ancestors_a.intersection(&ancestors_b).max().copied())
    }

    // ----- persistent root and branches -----

    /// UUID of the root item, fixed at genesis.
    pub fn root_object(&self) -> StoreResult<ItemId> {
        let state = self.read()?;
        if let Some(id) = self.root_object.get() {
            return Ok(*id);
        }
        let id = state
            .root_object()
            .ok_or(StoreError::UnknownPersistentRoot(self.root))?;
        Ok(*self.root_object.get_or_init(|| id))
    }

    pub fn branch(&self, branch: BranchId) -> StoreResult<Branch> {
        self.read()?
            .branches
            .get(&branch)
            .cloned()
            .ok_or(StoreError::UnknownBranch(branch))
    }

    pub fn branch_head(&self, branch: BranchId) -> StoreResult<RevisionNumber> {
        Ok(self.branch(branch)?.head)
    }

    pub fn branches(&self) -> StoreResult<Vec<Branch>> {
        Ok(self.read()?.branches.values().cloned().collect())
    }

    /// Diagnostic size of the underlying storage.
    pub fn storage_size_in_bytes(&self) -> StoreResult<u64> {
        let _state = self.read()?;
        self.storage.size_in_bytes()
    }

    /// Number of cached snapshots.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }
}
