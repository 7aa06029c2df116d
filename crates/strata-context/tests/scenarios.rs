//! End-to-end behavior of a working copy over a persistent root.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use strata_context::{ContextError, ContextState, EditingContext, ItemObject};
use strata_merge::PreferOurs;
use strata_store::{BackingStore, RevisionWrite, Store, StoreConfig, StoreError};
use strata_types::{BranchId, CommitType, Item, ItemGraph, ItemId, Metadata, Value};

/// A persistent root whose genesis holds `A{x:1}`, plus a context at its
/// head.
fn root_with_a() -> (Store, Arc<BackingStore>, EditingContext, ItemId) {
    let store = Store::in_memory(StoreConfig::default());
    let a = ItemId::new();
    let branch = BranchId::new();
    let (backing, _) = store
        .create_persistent_root(
            ItemGraph::from_items(a, [Item::new(a).with_property("x", 1)]),
            branch,
            Metadata::Null,
        )
        .unwrap();
    let context = EditingContext::attach_branch(Arc::clone(&backing), branch).unwrap();
    (store, backing, context, a)
}

fn value_of(context: &mut EditingContext, uuid: ItemId, property: &str) -> Option<Value> {
    context.object_for_uuid(uuid).unwrap().get(property).cloned()
}

#[test]
fn genesis_then_edit() {
    let (_store, backing, mut context, a) = root_with_a();
    context.edit_object(a, |o| o.set("x", 2)).unwrap();
    let r1 = context.commit().unwrap().unwrap().number;
    assert_eq!(r1, 1);

    let graph = backing.item_graph(1).unwrap();
    assert_eq!(graph.item(&a).unwrap().get("x"), Some(&Value::from(2)));

    let partial = backing.partial_item_graph(0, 1).unwrap();
    assert_eq!(partial.uuids().into_iter().collect::<Vec<_>>(), vec![a]);
    assert_eq!(
        partial.item(&a).unwrap(),
        &Item::new(a).with_property("x", 2)
    );
}

#[test]
fn write_then_read_returns_written_graph() {
    let (_store, backing, _, a) = root_with_a();
    let b = ItemId::new();
    let written = ItemGraph::from_items(
        a,
        [
            Item::new(a)
                .with_property("x", 1)
                .with_property("child", Value::reference(b)),
            Item::new(b).with_property("tags", Value::set(["red", "blue"])),
        ],
    );
    let branch = backing.revision_info(0).unwrap().branch;
    let r = backing
        .write_revision(RevisionWrite::new(written.clone(), branch).with_parent(0))
        .unwrap();
    assert_eq!(backing.item_graph(r).unwrap(), written);
}

#[test]
fn partial_graph_matches_revision_changes() {
    let (_store, backing, mut context, a) = root_with_a();
    let b = context.insert_object(ItemObject::new(ItemId::new()));
    context.edit_object(b, |o| o.set("label", "b")).unwrap();
    context.commit().unwrap();
    context.edit_object(a, |o| o.set("x", 5)).unwrap();
    context.commit().unwrap();

    for r in 1..=2 {
        let revision = backing.revision(r).unwrap();
        let parent = revision.info().parent.unwrap();
        let partial = backing.partial_item_graph(parent, r).unwrap();
        assert_eq!(
            partial.uuids().into_iter().collect::<Vec<_>>(),
            revision.changed_object_uuids()
        );
        for uuid in revision.changed_object_uuids() {
            let item = partial.item(&uuid).unwrap();
            for (property, value) in revision.values_and_properties(&uuid) {
                assert_eq!(item.get(&property), Some(&value));
            }
        }
    }
    assert_eq!(backing.revision(2).unwrap().values_and_properties(&a).len(), 1);
    assert!(backing.revision(2).unwrap().values_and_properties(&b).is_empty());
}

#[test]
fn revert_restores_base_and_clears_changes() {
    let (_store, _backing, mut context, a) = root_with_a();
    let original = context.object_for_uuid(a).unwrap().clone();
    context.edit_object(a, |o| o.set("x", 40)).unwrap();
    context.edit_object(a, |o| o.set("extra", "y")).unwrap();
    context.insert_object(ItemObject::new(ItemId::new()));

    context.revert().unwrap();
    assert!(!context.has_changes());
    assert_eq!(context.object_for_uuid(a).unwrap(), &original);
}

#[test]
fn second_commit_without_changes_is_noop() {
    let (_store, backing, mut context, a) = root_with_a();
    context.edit_object(a, |o| o.set("x", 2)).unwrap();
    let first = context.commit().unwrap();
    assert!(first.is_some());
    assert_eq!(context.commit().unwrap(), None);
    assert_eq!(context.base_revision(), first);
    assert_eq!(backing.used_revision_range().unwrap(), Some(0..=1));
}

#[test]
fn deleted_revision_is_unknown_and_others_remain() {
    let (_store, backing, mut context, a) = root_with_a();
    for x in 2..=3 {
        context.edit_object(a, |o| o.set("x", x)).unwrap();
        context.commit().unwrap();
    }
    backing.delete_revisions(&BTreeSet::from([2])).unwrap();
    assert!(matches!(
        backing.item_graph(2),
        Err(StoreError::UnknownRevision(2))
    ));
    assert!(backing.item_graph(1).is_ok());
    assert!(backing.item_graph(0).is_ok());

    // The parent of a surviving revision cannot go.
    assert!(matches!(
        backing.delete_revisions(&BTreeSet::from([0])),
        Err(StoreError::InUse { .. })
    ));
}

#[test]
fn forked_branches_conflict_on_same_property() {
    let (_store, backing, mut b1, a) = root_with_a();
    b1.edit_object(a, |o| o.set("x", 2)).unwrap();
    let fork = b1.commit().unwrap().unwrap().number;

    let b2_branch = BranchId::new();
    backing.set_branch_head(b2_branch, fork).unwrap();
    let mut b2: EditingContext = EditingContext::attach_branch(Arc::clone(&backing), b2_branch).unwrap();

    b1.edit_object(a, |o| o.set("x", 3)).unwrap();
    b1.commit().unwrap();
    b2.edit_object(a, |o| o.set("x", 4)).unwrap();
    let b2_head = b2.commit().unwrap().unwrap().number;
    assert_eq!(backing.branch_head(b2_branch).unwrap(), b2_head);

    let others = b2.externalize_objects(&[a]).unwrap();
    let bases = backing.item_graph(fork).unwrap();
    match b1.three_way_merge_objects(&[a], &others, &bases) {
        Err(ContextError::MergeConflict(conflicts)) => {
            assert_eq!(conflicts.len(), 1);
            assert_eq!(conflicts[0].property, "x");
            assert_eq!(conflicts[0].base, Some(Value::from(2)));
            assert_eq!(conflicts[0].ours, Some(Value::from(3)));
            assert_eq!(conflicts[0].theirs, Some(Value::from(4)));
        }
        other => panic!("expected a merge conflict, got {other:?}"),
    }
    assert!(!b1.has_changes());
    assert_eq!(value_of(&mut b1, a, "x"), Some(Value::from(3)));

    // The same conflict through the branch-level merge.
    assert!(matches!(
        b1.merge_revision(b2_head),
        Err(ContextError::MergeConflict(_))
    ));
    let resolved = b1.merge_revision_with(b2_head, &PreferOurs).unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(b1.pending_merge_parent(), Some(b2_head));
    let merge = b1.commit().unwrap().unwrap();
    let info = backing.revision_info(merge.number).unwrap();
    assert_eq!(info.merge_parent, Some(b2_head));
    assert_eq!(info.commit_type, CommitType::Merge);
}

#[test]
fn selective_undo_conflicts_with_later_edit() {
    let (_store, _backing, mut context, a) = root_with_a();
    context.edit_object(a, |o| o.set("y", 4)).unwrap();
    context.commit().unwrap();
    context.edit_object(a, |o| o.set("y", 5)).unwrap();
    let undone = context.commit().unwrap().unwrap().number;
    context.edit_object(a, |o| o.set("y", 9)).unwrap();
    context.commit().unwrap();

    match context.selective_undo_changes_made_in_revision(undone) {
        Err(ContextError::MergeConflict(conflicts)) => {
            assert_eq!(conflicts.len(), 1);
            assert_eq!(conflicts[0].property, "y");
            assert_eq!(conflicts[0].base, Some(Value::from(5)));
            assert_eq!(conflicts[0].ours, Some(Value::from(9)));
            assert_eq!(conflicts[0].theirs, Some(Value::from(4)));
        }
        other => panic!("expected a merge conflict, got {other:?}"),
    }
    assert_eq!(value_of(&mut context, a, "y"), Some(Value::from(9)));
    assert_eq!(context.state(), ContextState::Clean);
}

#[test]
fn selective_undo_without_later_edits_applies() {
    let (_store, _backing, mut context, a) = root_with_a();
    context.edit_object(a, |o| o.set("y", 4)).unwrap();
    context.commit().unwrap();
    context.edit_object(a, |o| o.set("y", 5)).unwrap();
    let undone = context.commit().unwrap().unwrap().number;
    context.edit_object(a, |o| o.set("x", 7)).unwrap();
    context.commit().unwrap();

    context
        .selective_undo_changes_made_in_revision(undone)
        .unwrap();
    assert_eq!(value_of(&mut context, a, "y"), Some(Value::from(4)));
    assert_eq!(value_of(&mut context, a, "x"), Some(Value::from(7)));
    assert!(context.object_has_changes(a));

    let undo = context
        .commit_with_type(CommitType::SelectiveUndo, "undo y", "")
        .unwrap()
        .unwrap();
    let info = context.store().unwrap().revision_info(undo.number).unwrap();
    assert_eq!(info.commit_type, CommitType::SelectiveUndo);
}

#[test]
fn selective_undo_scoped_to_objects() {
    let (_store, _backing, mut context, a) = root_with_a();
    let b = context.insert_object(ItemObject::new(ItemId::new()));
    context.commit().unwrap();
    context.edit_object(a, |o| o.set("x", 2)).unwrap();
    context.edit_object(b, |o| o.set("x", 2)).unwrap();
    let both = context.commit().unwrap().unwrap().number;

    context.selective_undo_changes_in_objects(&[b], both).unwrap();
    assert_eq!(context.changed_object_uuids(), vec![b]);
    assert_eq!(value_of(&mut context, b, "x"), None);
    assert_eq!(value_of(&mut context, a, "x"), Some(Value::from(2)));
}

#[test]
fn rollback_then_commit_records_rollback() {
    let (_store, backing, mut context, a) = root_with_a();
    context.edit_object(a, |o| o.set("x", 2)).unwrap();
    context.commit().unwrap();

    context.rollback_to_revision(0).unwrap();
    assert_eq!(context.base_revision().unwrap().number, 0);
    assert_eq!(value_of(&mut context, a, "x"), Some(Value::from(1)));
    // Rollback itself writes nothing.
    assert_eq!(backing.used_revision_range().unwrap(), Some(0..=1));
    assert_eq!(context.commit().unwrap(), None);
}

#[test]
fn contexts_read_isolated_revisions() {
    let (_store, backing, mut writer, a) = root_with_a();
    let mut reader: EditingContext = EditingContext::attach(Arc::clone(&backing), 0).unwrap();
    writer.edit_object(a, |o| o.set("x", 10)).unwrap();
    writer.commit().unwrap();

    assert_eq!(value_of(&mut reader, a, "x"), Some(Value::from(1)));
    let only_a = HashSet::from([a]);
    assert_eq!(
        backing.item_graph_restricted(1, &only_a).unwrap().item(&a).unwrap().get("x"),
        Some(&Value::from(10))
    );
}

#[test]
fn file_backed_history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let a = ItemId::new();
    let branch = BranchId::new();
    let root = {
        let store = Store::open(dir.path(), StoreConfig::default()).unwrap();
        let (backing, _) = store
            .create_persistent_root(
                ItemGraph::from_items(a, [Item::new(a).with_property("x", 1)]),
                branch,
                Metadata::Null,
            )
            .unwrap();
        let mut context: EditingContext =
            EditingContext::attach_branch(Arc::clone(&backing), branch).unwrap();
        context.edit_object(a, |o| o.set("x", 2)).unwrap();
        context.commit_with_type(CommitType::Edit, "two", "").unwrap();
        store.close().unwrap();
        backing.persistent_root()
    };

    let store = Store::open(dir.path(), StoreConfig::default()).unwrap();
    let backing = store.backing_store(root).unwrap();
    let mut context: EditingContext = EditingContext::attach_branch(backing, branch).unwrap();
    assert_eq!(context.base_revision().unwrap().number, 1);
    assert_eq!(value_of(&mut context, a, "x"), Some(Value::from(2)));
}
