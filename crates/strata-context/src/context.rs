//! The editing context: a mutable working copy anchored at a base revision.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde_json::json;
use strata_diff::{diff_graphs, GraphDiff};
use strata_merge::{
    three_way_merge_items, two_way_merge_items, undo_item_change, Conflict, ConflictResolver,
    ItemMerge, MergeOutcome,
};
use strata_store::{
    BackingStore, RevisionRef, RevisionWrite, LONG_DESCRIPTION_KEY, SHORT_DESCRIPTION_KEY,
};
use strata_types::{
    BranchId, CommitType, Item, ItemGraph, ItemId, Metadata, RevisionNumber,
};
use tracing::debug;

use crate::error::{ContextError, ContextResult};
use crate::object::{fragment_of, own_item, ItemObject, VersionedObject};
use crate::observer::{BaseRevisionChange, BaseRevisionObserver};

/// Lifecycle of an editing context.
///
/// `Clean` and `Dirty` follow the changed-object set. `Committing` is only
/// observable while a commit is in flight; a failed commit returns to
/// `Dirty` with the previous base.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    Clean,
    Dirty,
    Committing,
}

/// A working copy of a persistent root's object graph.
///
/// Objects are loaded lazily from the base revision and cached for the
/// lifetime of the context. The cache is never invalidated when the store
/// changes; use [`rollback_to_revision`](Self::rollback_to_revision) or a
/// merge to observe other writers.
pub struct EditingContext<O: VersionedObject = ItemObject> {
    store: Option<Arc<BackingStore>>,
    branch: BranchId,
    base: Option<RevisionRef>,
    root_object: ItemId,
    objects: HashMap<ItemId, O>,
    changed: BTreeSet<ItemId>,
    state: ContextState,
    /// Head merged by `merge_revision`, written as merge parent by the next
    /// commit.
    pending_merge: Option<RevisionNumber>,
    observers: Vec<Arc<dyn BaseRevisionObserver>>,
}

impl<O: VersionedObject> EditingContext<O> {
    fn with_parts(
        store: Option<Arc<BackingStore>>,
        branch: BranchId,
        base: Option<RevisionRef>,
        root_object: ItemId,
    ) -> Self {
        Self {
            store,
            branch,
            base,
            root_object,
            objects: HashMap::new(),
            changed: BTreeSet::new(),
            state: ContextState::Clean,
            pending_merge: None,
            observers: Vec::new(),
        }
    }

    /// A context never backed by storage. Commits fail with
    /// `NotPersistent`.
    pub fn transient() -> Self {
        Self::with_parts(None, BranchId::new(), None, ItemId::new())
    }

    /// Attach at `revision`. Commits extend that revision's branch.
    pub fn attach(store: Arc<BackingStore>, revision: RevisionNumber) -> ContextResult<Self> {
        let info = store.revision_info(revision)?;
        let root_object = store.root_object()?;
        Ok(Self::with_parts(
            Some(store),
            info.branch,
            Some(info.revision_ref()),
            root_object,
        ))
    }

    /// Attach at the head of `branch`.
    pub fn attach_branch(store: Arc<BackingStore>, branch: BranchId) -> ContextResult<Self> {
        let head = store.branch_head(branch)?;
        let mut context = Self::attach(store, head)?;
        context.branch = branch;
        Ok(context)
    }

    /// A context with no base revision. Its first commit writes a genesis
    /// revision on `branch` whose root object is `root_object`.
    pub fn for_new_root(store: Arc<BackingStore>, branch: BranchId, root_object: ItemId) -> Self {
        Self::with_parts(Some(store), branch, None, root_object)
    }

    pub fn store(&self) -> Option<&Arc<BackingStore>> {
        self.store.as_ref()
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    pub fn branch(&self) -> BranchId {
        self.branch
    }

    pub fn base_revision(&self) -> Option<RevisionRef> {
        self.base
    }

    pub fn root_object(&self) -> ItemId {
        self.root_object
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn pending_merge_parent(&self) -> Option<RevisionNumber> {
        self.pending_merge
    }

    /// Number of live objects in the cache.
    pub fn cached_object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn add_observer(&mut self, observer: Arc<dyn BaseRevisionObserver>) {
        self.observers.push(observer);
    }

    fn backing(&self) -> ContextResult<&Arc<BackingStore>> {
        self.store.as_ref().ok_or(ContextError::NotPersistent)
    }

    fn items_at(
        &self,
        revision: Option<RevisionNumber>,
        uuids: &HashSet<ItemId>,
    ) -> ContextResult<ItemGraph> {
        match (&self.store, revision) {
            (Some(store), Some(revision)) => Ok(store.item_graph_restricted(revision, uuids)?),
            _ => Ok(ItemGraph::new(self.root_object)),
        }
    }

    fn base_items(&self, uuids: &HashSet<ItemId>) -> ContextResult<ItemGraph> {
        self.items_at(self.base.map(|base| base.number), uuids)
    }

    fn mark_dirty(&mut self, uuid: ItemId) {
        self.changed.insert(uuid);
        self.state = ContextState::Dirty;
    }

    fn refresh_state(&mut self) {
        self.state = if self.changed.is_empty() {
            ContextState::Clean
        } else {
            ContextState::Dirty
        };
    }

    fn notify(&self, old: Option<RevisionRef>, new: Option<RevisionRef>) {
        if old == new {
            return;
        }
        let change = BaseRevisionChange { old, new };
        for observer in &self.observers {
            observer.base_revision_changed(&change);
        }
    }

    // ----- objects -----

    fn ensure_loaded(&mut self, uuid: ItemId) -> ContextResult<()> {
        if self.objects.contains_key(&uuid) {
            return Ok(());
        }
        let fragment = self.base_items(&HashSet::from([uuid]))?;
        if !fragment.contains(&uuid) {
            return Err(ContextError::UnknownObject(uuid));
        }
        let object = O::instantiate(uuid, &fragment)?;
        self.objects.insert(uuid, object);
        Ok(())
    }

    /// The live object for `uuid`, loaded from the base revision on first
    /// access.
    pub fn object_for_uuid(&mut self, uuid: ItemId) -> ContextResult<&O> {
        self.ensure_loaded(uuid)?;
        self.objects
            .get(&uuid)
            .ok_or(ContextError::UnknownObject(uuid))
    }

    /// Mutate an object and mark it changed.
    pub fn edit_object<R>(
        &mut self,
        uuid: ItemId,
        edit: impl FnOnce(&mut O) -> R,
    ) -> ContextResult<R> {
        self.ensure_loaded(uuid)?;
        let object = self
            .objects
            .get_mut(&uuid)
            .ok_or(ContextError::UnknownObject(uuid))?;
        let result = edit(object);
        self.mark_dirty(uuid);
        Ok(result)
    }

    /// Add (or replace) an object and mark it changed.
    pub fn insert_object(&mut self, object: O) -> ItemId {
        let uuid = object.uuid();
        self.objects.insert(uuid, object);
        self.mark_dirty(uuid);
        uuid
    }

    pub fn mark_changed(&mut self, uuid: ItemId) -> ContextResult<()> {
        self.ensure_loaded(uuid)?;
        self.mark_dirty(uuid);
        Ok(())
    }

    /// Drop `uuid` from the changed set without touching its state.
    pub fn mark_unchanged(&mut self, uuid: ItemId) {
        self.changed.remove(&uuid);
        self.refresh_state();
    }

    fn current_item(&mut self, uuid: ItemId) -> ContextResult<Item> {
        self.ensure_loaded(uuid)?;
        let object = self
            .objects
            .get(&uuid)
            .ok_or(ContextError::UnknownObject(uuid))?;
        own_item(object)
    }

    /// The externalized state of `uuids`, loading them if needed. Feeds the
    /// object merges of another context.
    pub fn externalize_objects(&mut self, uuids: &[ItemId]) -> ContextResult<ItemGraph> {
        let mut graph = ItemGraph::new(self.root_object);
        for uuid in uuids {
            self.ensure_loaded(*uuid)?;
            if let Some(object) = self.objects.get(uuid) {
                graph.merge_from(&object.externalize());
            }
        }
        Ok(graph)
    }

    // ----- change tracking -----

    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    pub fn object_has_changes(&self, uuid: ItemId) -> bool {
        self.changed.contains(&uuid)
    }

    /// Changed objects, sorted by UUID.
    pub fn changed_object_uuids(&self) -> Vec<ItemId> {
        self.changed.iter().copied().collect()
    }

    /// Structural diff of every changed object against the base revision.
    /// Objects missing from the base show up as additions.
    pub fn changes(&self) -> ContextResult<GraphDiff> {
        let mut current = ItemGraph::new(self.root_object);
        for uuid in &self.changed {
            if let Some(object) = self.objects.get(uuid) {
                current.merge_from(&object.externalize());
            }
        }
        let uuids: HashSet<ItemId> = current.uuids().into_iter().collect();
        let base = self.base_items(&uuids)?;
        Ok(diff_graphs(&base, &current))
    }

    // ----- commit -----

    /// Commit every changed object as an `Edit` with empty descriptions.
    pub fn commit(&mut self) -> ContextResult<Option<RevisionRef>> {
        self.commit_with_type(CommitType::Edit, "", "")
    }

    /// Commit every changed object.
    ///
    /// Returns `Ok(None)` without writing anything when there is nothing to
    /// commit. On failure the changed set and base revision are unchanged.
    pub fn commit_with_type(
        &mut self,
        commit_type: CommitType,
        short_description: &str,
        long_description: &str,
    ) -> ContextResult<Option<RevisionRef>> {
        let uuids = self.changed_object_uuids();
        self.commit_uuids(
            &uuids,
            commit_type,
            description_metadata(short_description, long_description),
        )
    }

    /// Commit only the changed objects among `uuids`. Other changed objects
    /// stay changed.
    pub fn commit_objects(
        &mut self,
        uuids: &[ItemId],
        commit_type: CommitType,
        short_description: &str,
        long_description: &str,
    ) -> ContextResult<Option<RevisionRef>> {
        self.commit_uuids(
            uuids,
            commit_type,
            description_metadata(short_description, long_description),
        )
    }

    fn commit_uuids(
        &mut self,
        uuids: &[ItemId],
        commit_type: CommitType,
        metadata: Metadata,
    ) -> ContextResult<Option<RevisionRef>> {
        let store = Arc::clone(self.backing()?);
        let selected: Vec<ItemId> = uuids
            .iter()
            .filter(|uuid| self.changed.contains(*uuid))
            .copied()
            .collect();
        if selected.is_empty() && self.pending_merge.is_none() {
            debug!("nothing to commit");
            return Ok(None);
        }

        let mut graph = ItemGraph::new(self.root_object);
        for uuid in &selected {
            if let Some(object) = self.objects.get(uuid) {
                graph.merge_from(&object.externalize());
            }
        }

        let mut write = RevisionWrite::new(graph, self.branch).with_metadata(metadata);
        if let Some(base) = self.base {
            write = write.with_parent(base.number);
        }
        if let Some(merged) = self.pending_merge {
            write = write.with_merge_parent(merged);
        }
        let commit_type = match (self.base, self.pending_merge, commit_type) {
            (None, _, CommitType::Edit) => CommitType::Creation,
            (Some(_), Some(_), CommitType::Edit) => CommitType::Merge,
            (_, _, other) => other,
        };
        write = write.with_commit_type(commit_type);
        let revision_id = write.uuid;

        self.state = ContextState::Committing;
        let number = match store.write_revision(write) {
            Ok(number) => number,
            Err(err) => {
                self.refresh_state();
                return Err(err.into());
            }
        };

        let new = RevisionRef {
            number,
            uuid: revision_id,
        };
        let old = self.base.replace(new);
        for uuid in &selected {
            self.changed.remove(uuid);
        }
        self.pending_merge = None;
        self.refresh_state();
        debug!(
            revision = number,
            parent = ?old.map(|r| r.number),
            objects = selected.len(),
            "context committed"
        );
        self.notify(old, Some(new));
        Ok(Some(new))
    }

    // ----- revert and rollback -----

    /// Discard every in-memory change, reloading changed objects from the
    /// base revision. Objects the base does not know are dropped.
    pub fn revert(&mut self) -> ContextResult<()> {
        let uuids = self.changed_object_uuids();
        self.revert_uuids(&uuids)?;
        self.pending_merge = None;
        Ok(())
    }

    /// [`revert`](Self::revert) restricted to `uuids`.
    pub fn revert_objects(&mut self, uuids: &[ItemId]) -> ContextResult<()> {
        let selected: Vec<ItemId> = uuids
            .iter()
            .filter(|uuid| self.changed.contains(*uuid))
            .copied()
            .collect();
        self.revert_uuids(&selected)
    }

    fn revert_uuids(&mut self, uuids: &[ItemId]) -> ContextResult<()> {
        let wanted: HashSet<ItemId> = uuids.iter().copied().collect();
        let base = self.base_items(&wanted)?;
        for uuid in uuids {
            match base.item(uuid) {
                Some(item) => {
                    if let Some(object) = self.objects.get_mut(uuid) {
                        object.load(&fragment_of(item.clone()))?;
                    }
                }
                None => {
                    self.objects.remove(uuid);
                }
            }
            self.changed.remove(uuid);
        }
        self.refresh_state();
        Ok(())
    }

    /// Discard all working state and make `revision` the base. Objects are
    /// reloaded lazily. Writes nothing; commit to record the rollback.
    pub fn rollback_to_revision(&mut self, revision: RevisionNumber) -> ContextResult<()> {
        let info = self.backing()?.revision_info(revision)?;
        self.objects.clear();
        self.changed.clear();
        self.pending_merge = None;
        let new = info.revision_ref();
        let old = self.base.replace(new);
        self.refresh_state();
        debug!(from = ?old.map(|r| r.number), to = revision, "context rolled back");
        self.notify(old, Some(new));
        Ok(())
    }

    /// Set `uuids` to their state at `revision` and mark them changed. The
    /// base revision stays. Fails with `UnknownObject` before touching
    /// anything when one of them does not exist at `revision`.
    pub fn rollback_objects(
        &mut self,
        uuids: &[ItemId],
        revision: RevisionNumber,
    ) -> ContextResult<()> {
        let wanted: HashSet<ItemId> = uuids.iter().copied().collect();
        let target = self.backing()?.item_graph_restricted(revision, &wanted)?;
        if let Some(missing) = uuids.iter().find(|uuid| !target.contains(uuid)) {
            return Err(ContextError::UnknownObject(*missing));
        }
        let items: BTreeMap<ItemId, Item> = target.into_items().map(|i| (i.uuid(), i)).collect();
        self.apply_items(items, true)
    }

    // ----- selective undo -----

    /// Apply the inverse of `revision`'s changes onto the working state.
    ///
    /// Each touched property is merged back to its value before `revision`
    /// with `revision` as the merge base, so properties edited again since
    /// then conflict. Conflicts fail with `MergeConflict` and nothing is
    /// applied.
    pub fn selective_undo_changes_made_in_revision(
        &mut self,
        revision: RevisionNumber,
    ) -> ContextResult<()> {
        self.selective_undo(revision, None)
    }

    /// Selective undo limited to `uuids`.
    pub fn selective_undo_changes_in_objects(
        &mut self,
        uuids: &[ItemId],
        revision: RevisionNumber,
    ) -> ContextResult<()> {
        let only: HashSet<ItemId> = uuids.iter().copied().collect();
        self.selective_undo(revision, Some(&only))
    }

    fn selective_undo(
        &mut self,
        revision: RevisionNumber,
        only: Option<&HashSet<ItemId>>,
    ) -> ContextResult<()> {
        let undone = self.backing()?.revision(revision)?;
        let mut outcome = MergeOutcome::new();
        for uuid in undone.changed_object_uuids() {
            if only.is_some_and(|only| !only.contains(&uuid)) {
                continue;
            }
            let Some(after) = undone.delta().item(&uuid) else {
                continue;
            };
            let current = match self.current_item(uuid) {
                Ok(item) => item,
                // Not part of the working state; nothing to undo.
                Err(ContextError::UnknownObject(_)) => continue,
                Err(err) => return Err(err),
            };
            outcome.push(undo_item_change(&current, after, undone.before().item(&uuid)));
        }
        let items = outcome.into_result()?;
        debug!(revision, objects = items.len(), "selective undo applied");
        self.apply_items(items, false)
    }

    // ----- merge -----

    /// Last-writer-wins merge of `others` into the objects `uuids`.
    pub fn two_way_merge_objects(
        &mut self,
        uuids: &[ItemId],
        others: &ItemGraph,
    ) -> ContextResult<()> {
        let mut merged = BTreeMap::new();
        for uuid in uuids {
            let theirs = others
                .item(uuid)
                .ok_or(ContextError::UnknownObject(*uuid))?;
            let ours = self.current_item(*uuid)?;
            merged.insert(*uuid, two_way_merge_items(&ours, theirs));
        }
        self.apply_items(merged, false)
    }

    /// Three-way merge of `others` into the objects `uuids` against
    /// `bases`. Conflicts fail with `MergeConflict` and nothing is applied.
    pub fn three_way_merge_objects(
        &mut self,
        uuids: &[ItemId],
        others: &ItemGraph,
        bases: &ItemGraph,
    ) -> ContextResult<()> {
        let items = self.three_way_outcome(uuids, others, bases)?.into_result()?;
        self.apply_items(items, false)
    }

    /// Three-way merge that settles conflicts with `resolver`. Returns the
    /// conflicts that were resolved.
    pub fn three_way_merge_objects_with(
        &mut self,
        uuids: &[ItemId],
        others: &ItemGraph,
        bases: &ItemGraph,
        resolver: &dyn ConflictResolver,
    ) -> ContextResult<Vec<Conflict>> {
        let outcome = self.three_way_outcome(uuids, others, bases)?;
        let conflicts = outcome.conflicts.clone();
        self.apply_items(outcome.resolve_with(resolver), false)?;
        Ok(conflicts)
    }

    fn three_way_outcome(
        &mut self,
        uuids: &[ItemId],
        others: &ItemGraph,
        bases: &ItemGraph,
    ) -> ContextResult<MergeOutcome> {
        let mut outcome = MergeOutcome::new();
        for uuid in uuids {
            let theirs = others
                .item(uuid)
                .ok_or(ContextError::UnknownObject(*uuid))?;
            let merge = match self.current_item(*uuid) {
                Ok(ours) => three_way_merge_items(&ours, theirs, bases.item(uuid)),
                // Created on the other side only.
                Err(ContextError::UnknownObject(_)) if !bases.contains(uuid) => {
                    ItemMerge::clean(theirs.clone())
                }
                Err(err) => return Err(err),
            };
            outcome.push(merge);
        }
        Ok(outcome)
    }

    /// Merge the state at revision `other` into the working state, using
    /// the nearest common ancestor as base.
    ///
    /// On success the next commit records `other` as merge parent, even
    /// when no object changed. Merging an ancestor of the base is a no-op.
    pub fn merge_revision(&mut self, other: RevisionNumber) -> ContextResult<()> {
        let items = self.merge_revision_outcome(other)?.map(MergeOutcome::into_result);
        match items {
            Some(items) => self.finish_merge(other, items?),
            None => Ok(()),
        }
    }

    /// [`merge_revision`](Self::merge_revision) settling conflicts with
    /// `resolver`. Returns the conflicts that were resolved.
    pub fn merge_revision_with(
        &mut self,
        other: RevisionNumber,
        resolver: &dyn ConflictResolver,
    ) -> ContextResult<Vec<Conflict>> {
        let Some(outcome) = self.merge_revision_outcome(other)? else {
            return Ok(Vec::new());
        };
        let conflicts = outcome.conflicts.clone();
        self.finish_merge(other, outcome.resolve_with(resolver))?;
        Ok(conflicts)
    }

    fn merge_revision_outcome(
        &mut self,
        other: RevisionNumber,
    ) -> ContextResult<Option<MergeOutcome>> {
        let store = Arc::clone(self.backing()?);
        let common = match self.base {
            Some(base) => store.common_ancestor(base.number, other)?,
            None => None,
        };
        if common == Some(other) {
            debug!(other, "merge target already contained in base");
            return Ok(None);
        }

        let theirs = store.item_graph(other)?;
        let base_graph = match common {
            Some(common) => store.item_graph(common)?,
            None => ItemGraph::new(self.root_object),
        };
        let mut uuids: Vec<ItemId> = base_graph
            .differing_uuids(&theirs)
            .into_iter()
            .filter(|uuid| theirs.contains(uuid))
            .collect();
        uuids.sort();
        debug!(other, common = ?common, objects = uuids.len(), "merging revision");
        self.three_way_outcome(&uuids, &theirs, &base_graph).map(Some)
    }

    fn finish_merge(
        &mut self,
        other: RevisionNumber,
        items: BTreeMap<ItemId, Item>,
    ) -> ContextResult<()> {
        self.apply_items(items, false)?;
        self.pending_merge = Some(other);
        Ok(())
    }

    /// Load merged or rolled-back items into live objects and mark the
    /// touched ones changed. With `force`, unchanged items are marked too.
    fn apply_items(&mut self, items: BTreeMap<ItemId, Item>, force: bool) -> ContextResult<()> {
        for (uuid, item) in items {
            let current = self.objects.get(&uuid).map(|o| own_item(o)).transpose()?;
            if !force && current.as_ref() == Some(&item) {
                continue;
            }
            let fragment = fragment_of(item);
            match self.objects.get_mut(&uuid) {
                Some(object) => object.load(&fragment)?,
                None => {
                    let object = O::instantiate(uuid, &fragment)?;
                    self.objects.insert(uuid, object);
                }
            }
            self.mark_dirty(uuid);
        }
        Ok(())
    }
}

fn description_metadata(short: &str, long: &str) -> Metadata {
    json!({
        SHORT_DESCRIPTION_KEY: short,
        LONG_DESCRIPTION_KEY: long,
    })
}
