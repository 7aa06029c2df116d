use strata_store::RevisionRef;

/// Emitted when an editing context's base revision changes, by commit or
/// by rollback. `None` means the context had (or has) no base.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BaseRevisionChange {
    pub old: Option<RevisionRef>,
    pub new: Option<RevisionRef>,
}

/// Receives base revision changes.
pub trait BaseRevisionObserver: Send + Sync {
    fn base_revision_changed(&self, change: &BaseRevisionChange);
}

impl<F> BaseRevisionObserver for F
where
    F: Fn(&BaseRevisionChange) + Send + Sync,
{
    fn base_revision_changed(&self, change: &BaseRevisionChange) {
        self(change)
    }
}
