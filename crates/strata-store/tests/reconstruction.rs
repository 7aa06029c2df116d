//! Reconstruction by ancestor walk must match a naive replay from genesis,
//! with and without snapshots, on a shared log file and in memory.

use std::collections::BTreeMap;

use proptest::prelude::*;
use strata_store::{BackingStore, InMemoryRevisionStorage, RevisionWrite, Store, StoreConfig};
use strata_types::{BranchId, Item, ItemGraph, ItemId, PersistentRootId, RevisionNumber};

/// One edit step: which earlier revision to build on, and which
/// `(item, property, value)` triples to set.
#[derive(Clone, Debug)]
struct Step {
    parent_pick: usize,
    edits: Vec<(usize, usize, i64)>,
}

fn step() -> impl Strategy<Value = Step> {
    (
        any::<usize>(),
        prop::collection::vec((0..5usize, 0..3usize, -20..20i64), 1..4),
    )
        .prop_map(|(parent_pick, edits)| Step { parent_pick, edits })
}

fn item_ids() -> Vec<ItemId> {
    (1..=5).map(|n| ItemId::from_u128(n as u128)).collect()
}

/// Write `steps` into `store` and return the expected full graph of every
/// revision, computed by replaying writes over the parent's expected graph.
fn build(store: &BackingStore, steps: &[Step]) -> BTreeMap<RevisionNumber, ItemGraph> {
    let ids = item_ids();
    let root = ids[0];
    let branch = BranchId::from_u128(1);
    let mut expected: BTreeMap<RevisionNumber, ItemGraph> = BTreeMap::new();

    let genesis = ItemGraph::from_items(root, [Item::new(root).with_property("p0", 0)]);
    let r0 = store
        .write_revision(RevisionWrite::new(genesis.clone(), branch))
        .unwrap();
    expected.insert(r0, genesis);

    for step in steps {
        let numbers: Vec<RevisionNumber> = expected.keys().copied().collect();
        let parent = numbers[step.parent_pick % numbers.len()];
        let mut full = expected[&parent].clone();
        let mut written = ItemGraph::new(root);
        for (item, property, value) in &step.edits {
            let uuid = ids[*item];
            let current = written
                .item(&uuid)
                .or_else(|| full.item(&uuid))
                .cloned()
                .unwrap_or_else(|| Item::new(uuid));
            written.insert(current.with_property(format!("p{property}"), *value));
        }
        full.merge_from(&written);
        let number = store
            .write_revision(RevisionWrite::new(written, branch).with_parent(parent))
            .unwrap();
        expected.insert(number, full);
    }
    expected
}

fn memory_store(interval: u64) -> BackingStore {
    let root = PersistentRootId::new();
    BackingStore::open(root, Box::new(InMemoryRevisionStorage::new(root)), interval).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn ancestor_walk_matches_replay(steps in prop::collection::vec(step(), 0..24)) {
        for interval in [0, 1, 3] {
            let store = memory_store(interval);
            let expected = build(&store, &steps);
            // Twice: the second pass reads through materialized snapshots.
            for _ in 0..2 {
                for (number, graph) in &expected {
                    prop_assert_eq!(&store.item_graph(*number).unwrap(), graph);
                }
            }
        }
    }

    #[test]
    fn partial_graph_is_union_of_path_deltas(steps in prop::collection::vec(step(), 1..16)) {
        let store = memory_store(0);
        let expected = build(&store, &steps);
        for (number, graph) in &expected {
            let Some(parent) = store.revision_info(*number).unwrap().parent else {
                continue;
            };
            let partial = store.partial_item_graph(parent, *number).unwrap();
            // Every item in the partial graph carries its value at `number`.
            for item in partial.items() {
                prop_assert_eq!(Some(item), graph.item(&item.uuid()));
            }
        }
    }
}

#[test]
fn file_store_survives_reopen_with_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::default().with_snapshot_interval(2);
    let steps: Vec<Step> = (0..10)
        .map(|n| Step {
            parent_pick: usize::MAX,
            edits: vec![(n % 5, n % 3, n as i64)],
        })
        .collect();

    let (root, expected) = {
        let store = Store::open(dir.path(), config.clone()).unwrap();
        let (backing, _) = store
            .create_persistent_root(
                ItemGraph::from_items(item_ids()[0], [Item::new(item_ids()[0])]),
                BranchId::new(),
                serde_json::Value::Null,
            )
            .unwrap();
        backing.clear().unwrap();
        let expected = build(&backing, &steps);
        store.close().unwrap();
        (backing.persistent_root(), expected)
    };

    let store = Store::open(dir.path(), config).unwrap();
    let backing = store.backing_store(root).unwrap();
    for (number, graph) in &expected {
        assert_eq!(&backing.item_graph(*number).unwrap(), graph);
    }
    // Numbers keep counting after clear: genesis was 0 before it.
    assert_eq!(expected.keys().next(), Some(&1));
}
