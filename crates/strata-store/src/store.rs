//! The store directory: a connection boundary keyed by directory and
//! persistent root UUID.
//!
//! Layout:
//! ```text
//! <dir>/strata.toml          optional configuration
//! <dir>/<root-uuid>.strata   one log per persistent root
//! <dir>/store.strata         single shared log (shared connection mode)
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use strata_types::{BranchId, CommitType, ItemGraph, Metadata, PersistentRootId, RevisionNumber};
use tracing::{debug, info, warn};

use crate::backing::{BackingStore, RevisionWrite};
use crate::config::{StoreConfig, CONFIG_FILE_NAME};
use crate::error::{StoreError, StoreResult};
use crate::storage::{FileRevisionStorage, InMemoryRevisionStorage, LogFile, RevisionStorage};

/// File extension of store logs.
pub const LOG_EXTENSION: &str = "strata";
/// Log file name used in shared connection mode.
pub const SHARED_LOG_NAME: &str = "store.strata";

enum Location {
    Memory,
    Directory(PathBuf),
    Shared { dir: PathBuf, log: Arc<LogFile> },
}

struct StoreState {
    open: HashMap<PersistentRootId, Arc<BackingStore>>,
    /// Roots whose storage exists, opened or not.
    known: BTreeSet<PersistentRootId>,
    closed: bool,
}

/// A directory of persistent roots, or a transient in-memory equivalent.
///
/// The store owns every backing store it hands out; backing stores hold no
/// reference back to it.
pub struct Store {
    location: Location,
    config: StoreConfig,
    state: RwLock<StoreState>,
}

impl Store {
    /// Open the store in `dir` with an explicit configuration.
    ///
    /// A missing directory is created when `create_if_missing` is set and is
    /// `NotFound` otherwise.
    pub fn open(dir: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            if !config.create_if_missing || dir.exists() {
                return Err(StoreError::NotFound(dir.to_path_buf()));
            }
            fs::create_dir_all(dir).map_err(|e| StoreError::from_open(dir, e))?;
            debug!(dir = %dir.display(), "store directory created");
        }

        let (location, known) = if config.shared_connection {
            let log = Arc::new(LogFile::open(&dir.join(SHARED_LOG_NAME), &config, true)?);
            let known = log.replay()?.iter().map(|entry| entry.root()).collect();
            let location = Location::Shared {
                dir: dir.to_path_buf(),
                log,
            };
            (location, known)
        } else {
            (Location::Directory(dir.to_path_buf()), scan_root_logs(dir)?)
        };

        info!(
            dir = %dir.display(),
            roots = known.len(),
            shared = config.shared_connection,
            "store opened"
        );
        Ok(Self::with_location(location, config, known))
    }

    /// Open the store in `dir`, reading `<dir>/strata.toml` when present.
    pub fn open_default(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref();
        let config_path = dir.join(CONFIG_FILE_NAME);
        let config = if config_path.is_file() {
            StoreConfig::load(&config_path)?
        } else {
            StoreConfig::default()
        };
        Self::open(dir, config)
    }

    /// A store whose persistent roots live only in memory.
    pub fn in_memory(config: StoreConfig) -> Self {
        Self::with_location(Location::Memory, config, BTreeSet::new())
    }

    fn with_location(location: Location, config: StoreConfig, known: BTreeSet<PersistentRootId>) -> Self {
        Self {
            location,
            config,
            state: RwLock::new(StoreState {
                open: HashMap::new(),
                known,
                closed: false,
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The store directory, `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::Memory => None,
            Location::Directory(dir) | Location::Shared { dir, .. } => Some(dir),
        }
    }

    fn lock(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        let state = self.state.write().map_err(|_| StoreError::poisoned())?;
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state)
    }

    fn root_log_path(dir: &Path, root: PersistentRootId) -> PathBuf {
        dir.join(format!("{root}.{LOG_EXTENSION}"))
    }

    fn storage_for(
        &self,
        root: PersistentRootId,
        create: bool,
    ) -> StoreResult<Box<dyn RevisionStorage>> {
        Ok(match &self.location {
            Location::Memory => Box::new(InMemoryRevisionStorage::new(root)),
            Location::Directory(dir) => {
                let path = Self::root_log_path(dir, root);
                let log = LogFile::open(&path, &self.config, create).map_err(|e| match e {
                    StoreError::NotFound(_) => StoreError::UnknownPersistentRoot(root),
                    other => other,
                })?;
                Box::new(FileRevisionStorage::new(Arc::new(log), root))
            }
            Location::Shared { log, .. } => Box::new(FileRevisionStorage::new(Arc::clone(log), root)),
        })
    }

    /// Create a persistent root whose genesis revision holds `graph` on
    /// `branch`. Returns its backing store and the genesis revision number.
    pub fn create_persistent_root(
        &self,
        graph: ItemGraph,
        branch: BranchId,
        metadata: Metadata,
    ) -> StoreResult<(Arc<BackingStore>, RevisionNumber)> {
        let mut state = self.lock()?;
        let root = PersistentRootId::new();
        let storage = self.storage_for(root, true)?;
        let backing = Arc::new(BackingStore::open(
            root,
            storage,
            self.config.snapshot_interval,
        )?);

        let write = RevisionWrite::new(graph, branch)
            .with_commit_type(CommitType::Creation)
            .with_metadata(metadata);
        let genesis = match backing.write_revision(write) {
            Ok(number) => number,
            Err(e) => {
                if let Location::Directory(dir) = &self.location {
                    let path = Self::root_log_path(dir, root);
                    if let Err(remove) = fs::remove_file(&path) {
                        warn!(path = %path.display(), error = %remove, "could not remove log of failed root");
                    }
                }
                return Err(e);
            }
        };

        info!(root = %root, branch = %branch, revision = genesis, "persistent root created");
        state.known.insert(root);
        state.open.insert(root, Arc::clone(&backing));
        Ok((backing, genesis))
    }

    /// The backing store of `root`, opened on first use and cached.
    pub fn backing_store(&self, root: PersistentRootId) -> StoreResult<Arc<BackingStore>> {
        let mut state = self.lock()?;
        if let Some(backing) = state.open.get(&root) {
            return Ok(Arc::clone(backing));
        }
        if !state.known.contains(&root) {
            return Err(StoreError::UnknownPersistentRoot(root));
        }
        let storage = self.storage_for(root, false)?;
        let backing = Arc::new(BackingStore::open(
            root,
            storage,
            self.config.snapshot_interval,
        )?);
        state.open.insert(root, Arc::clone(&backing));
        Ok(backing)
    }

    /// Every persistent root in the store, sorted.
    pub fn persistent_roots(&self) -> StoreResult<Vec<PersistentRootId>> {
        Ok(self.lock()?.known.iter().copied().collect())
    }

    /// Close every backing store. Idempotent.
    pub fn close(&self) -> StoreResult<()> {
        let mut state = self.state.write().map_err(|_| StoreError::poisoned())?;
        if state.closed {
            return Ok(());
        }
        for backing in state.open.values() {
            backing.close()?;
        }
        if let Location::Shared { log, .. } = &self.location {
            log.sync()?;
        }
        state.open.clear();
        state.closed = true;
        info!(roots = state.known.len(), "store closed");
        Ok(())
    }
}

/// Persistent roots with a `<uuid>.strata` log in `dir`.
fn scan_root_logs(dir: &Path) -> StoreResult<BTreeSet<PersistentRootId>> {
    let mut roots = BTreeSet::new();
    for entry in fs::read_dir(dir).map_err(|e| StoreError::from_open(dir, e))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
            continue;
        }
        match path.file_stem().and_then(|s| s.to_str()).map(str::parse) {
            Some(Ok(root)) => {
                roots.insert(root);
            }
            _ => debug!(path = %path.display(), "ignoring non-root log"),
        }
    }
    Ok(roots)
}
