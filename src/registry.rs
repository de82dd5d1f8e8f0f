//! Partition registry: type tag to partition, type tag to listeners.
//!
//! The registry owns the store's shared state (the root path, the map of
//! materialized partitions, and the listener lists) and enforces the two
//! invariants the store is built on: a given type maps to at most one
//! partition instance at any time, and a freshly created partition's backing
//! file exists before the creating call returns.
//!
//! Materialization (load-or-create) is serialized by a registry-wide mutex
//! guarding the check-then-act sequence, so concurrent first-accesses for
//! the same type cannot race into two divergent empty partitions or two
//! conflicting file creations. Individual put/remove calls on a partition
//! are *not* serialized here; per-key last-write-wins is the contract.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::listener::ListenerRegistry;
use crate::partition::{ErasedPartition, Partition};
use crate::record::UuidRecord;

pub(crate) struct PartitionRegistry {
    /// Store root directory; `None` until `init` runs.
    root: ArcSwapOption<PathBuf>,
    /// Materialized partitions, keyed by type tag.
    partitions: DashMap<&'static str, Arc<dyn ErasedPartition>>,
    /// Serializes the load-or-create sequence across all types.
    materialize_lock: Mutex<()>,
    listeners: ListenerRegistry,
}

impl PartitionRegistry {
    pub(crate) fn new() -> Self {
        Self {
            root: ArcSwapOption::const_empty(),
            partitions: DashMap::new(),
            materialize_lock: Mutex::new(()),
            listeners: ListenerRegistry::default(),
        }
    }

    /// Sets the store root and performs a full reset: every partition and
    /// every listener is dropped. Operations already in flight keep their
    /// partition handles and finish against the detached state.
    ///
    /// Holds the materialize lock for the whole swap-and-clear, so a
    /// load-or-create racing with the reset either lands before the clear
    /// (and is cleared with the rest) or starts after it (and reads the new
    /// root). A partition loaded from the old root can never stay registered.
    pub(crate) fn init(&self, root: PathBuf) {
        let _guard = self.materialize_lock.lock();
        debug!(root = %root.display(), "initializing store root; resetting state");
        self.root.store(Some(Arc::new(root)));
        self.partitions.clear();
        self.listeners.clear();
    }

    /// The configured root, or [`StoreError::NotInitialized`].
    pub(crate) fn root(&self) -> Result<Arc<PathBuf>, StoreError> {
        self.root.load_full().ok_or(StoreError::NotInitialized)
    }

    pub(crate) fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Returns the loaded partition for `T`, materializing it first if
    /// necessary: load from the backing file, or, when no file exists yet,
    /// create an empty partition and persist it synchronously so the file
    /// is guaranteed to exist when this call returns.
    pub(crate) fn get_or_create<T: UuidRecord>(&self) -> Result<Arc<Partition<T>>, StoreError> {
        // Fast path: already materialized.
        if let Some(existing) = self.partitions.get(T::TYPE_TAG) {
            return downcast::<T>(Arc::clone(existing.value()));
        }

        let _guard = self.materialize_lock.lock();
        // Re-check under the lock; another unit may have won the race.
        if let Some(existing) = self.partitions.get(T::TYPE_TAG) {
            return downcast::<T>(Arc::clone(existing.value()));
        }

        let root = self.root()?;
        let partition = match Partition::<T>::load(&root)? {
            Some(loaded) => loaded,
            None => {
                let created = Partition::<T>::new();
                created.persist(&root)?;
                debug!(type_tag = T::TYPE_TAG, "created empty partition");
                created
            }
        };

        let partition = Arc::new(partition);
        self.partitions.insert(
            T::TYPE_TAG,
            Arc::clone(&partition) as Arc<dyn ErasedPartition>,
        );
        Ok(partition)
    }

    /// Persists every materialized partition. Per-partition persist locks
    /// keep concurrent commits for the same type from interleaving.
    pub(crate) fn persist_all(&self) -> Result<(), StoreError> {
        let root = self.root()?;
        // Snapshot the handles first so file I/O runs outside the map's shards.
        let partitions: Vec<Arc<dyn ErasedPartition>> = self
            .partitions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for partition in partitions {
            partition.persist_erased(&root)?;
        }
        Ok(())
    }
}

fn downcast<T: UuidRecord>(
    erased: Arc<dyn ErasedPartition>,
) -> Result<Arc<Partition<T>>, StoreError> {
    erased
        .as_any()
        .downcast::<Partition<T>>()
        .map_err(|_| StoreError::TypeTagConflict(T::TYPE_TAG))
}
