use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use strata_types::{ItemGraph, RevisionNumber};
use tracing::debug;

/// Cache of fully reconstructed graphs at periodic chain depths.
///
/// A revision at chain depth `d` (genesis is depth 0) is materialized when
/// `d` is a positive multiple of the interval. Lookups never change what a
/// reconstruction returns; they only shorten the ancestor walk.
#[derive(Debug)]
pub struct SnapshotCache {
    interval: u64,
    graphs: Mutex<HashMap<RevisionNumber, Arc<ItemGraph>>>,
}

impl SnapshotCache {
    pub fn new(interval: u64) -> Self {
        Self {
            interval,
            graphs: Mutex::new(HashMap::new()),
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Whether a revision at `depth` should be materialized.
    pub fn wants(&self, depth: u64) -> bool {
        self.interval > 0 && depth > 0 && depth % self.interval == 0
    }

    pub fn get(&self, revision: RevisionNumber) -> Option<Arc<ItemGraph>> {
        // A poisoned cache is treated as empty.
        self.graphs.lock().ok()?.get(&revision).cloned()
    }

    pub fn insert(&self, revision: RevisionNumber, graph: ItemGraph) {
        if let Ok(mut graphs) = self.graphs.lock() {
            debug!(revision, items = graph.len(), "snapshot materialized");
            graphs.insert(revision, Arc::new(graph));
        }
    }

    pub fn evict(&self, revisions: &BTreeSet<RevisionNumber>) {
        if let Ok(mut graphs) = self.graphs.lock() {
            graphs.retain(|number, _| !revisions.contains(number));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut graphs) = self.graphs.lock() {
            graphs.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.graphs.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
