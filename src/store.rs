//! The object store: public operation surface, async and blocking.
//!
//! [`ObjectStore`] is an explicitly constructed handle (no global state)
//! owning a [`PartitionRegistry`] and a [`Dispatcher`]. Every operation is
//! submitted to the worker pool and returns a future resolving exactly once
//! with the operation's `Result`; each `*_blocking` twin parks the calling
//! thread on the same one-shot completion signal instead.
//!
//! Control flow per operation: caller → dispatcher → registry (lazy
//! load-or-create) → filter/mutation against the partition map → listener
//! notification → completion signal. Listeners run on the worker *before*
//! the signal fires, so a resolved mutation implies all listeners ran.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::dispatcher::{Dispatcher, DEFAULT_WORKERS};
use crate::error::StoreError;
use crate::filter::{Filter, MatchAll, UuidIs};
use crate::listener::ChangeListener;
use crate::record::UuidRecord;
use crate::registry::PartitionRegistry;

/// Process-local, type-partitioned object store with per-type JSON file
/// persistence.
///
/// Cheap to clone; clones share the same registry and worker pool. Must be
/// constructed inside a tokio runtime (the workers are spawned onto it);
/// the `*_blocking` forms are for non-async threads of the same process.
///
/// No operation touches disk until [`init`](Self::init) has configured the
/// store root; until then only listener registration is usable.
#[derive(Clone)]
pub struct ObjectStore {
    registry: Arc<PartitionRegistry>,
    dispatcher: Dispatcher,
}

impl ObjectStore {
    /// Creates a store with the default worker pool size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_workers(DEFAULT_WORKERS)
    }

    /// Creates a store with `workers` pool workers (clamped to at least one).
    #[must_use]
    pub fn with_workers(workers: usize) -> Self {
        Self {
            registry: Arc::new(PartitionRegistry::new()),
            dispatcher: Dispatcher::new(workers),
        }
    }

    /// Sets the store root directory and performs a **full reset**: all
    /// loaded partitions and all registered listeners are dropped.
    ///
    /// Re-invoking `init` repeats the reset; partitions reload lazily from
    /// the files under the new root on next access. Operations already in
    /// flight finish against their detached partition handles.
    pub fn init(&self, root: impl Into<PathBuf>) {
        self.registry.init(root.into());
    }

    // --- Queries ---

    /// Returns every record of `T` the filter accepts, keyed by identifier.
    ///
    /// Full linear scan of the partition; there is no index. First access
    /// to `T` materializes its partition (creating `<root>/<TYPE_TAG>.json`
    /// if it does not exist yet).
    ///
    /// # Errors
    ///
    /// [`StoreError::NotInitialized`] before [`init`](Self::init), I/O and
    /// codec failures from lazy loading, or [`StoreError::Predicate`] if the
    /// filter fails mid-scan.
    pub async fn entries<T, F>(&self, filter: F) -> Result<HashMap<Uuid, T>, StoreError>
    where
        T: UuidRecord,
        F: Filter<T> + 'static,
    {
        resolve(self.submit_entries(filter)).await
    }

    /// Blocking form of [`entries`](Self::entries). Must be called from
    /// outside the async runtime; blocks indefinitely until the operation
    /// completes.
    pub fn entries_blocking<T, F>(&self, filter: F) -> Result<HashMap<Uuid, T>, StoreError>
    where
        T: UuidRecord,
        F: Filter<T> + 'static,
    {
        resolve_blocking(self.submit_entries(filter))
    }

    /// Returns every record of `T`, keyed by identifier.
    ///
    /// # Errors
    ///
    /// Same conditions as [`entries`](Self::entries).
    pub async fn all_entries<T: UuidRecord>(&self) -> Result<HashMap<Uuid, T>, StoreError> {
        self.entries(MatchAll).await
    }

    /// Blocking form of [`all_entries`](Self::all_entries).
    pub fn all_entries_blocking<T: UuidRecord>(&self) -> Result<HashMap<Uuid, T>, StoreError> {
        self.entries_blocking(MatchAll)
    }

    /// Returns the matching records as a plain vector, for callers that do
    /// not need the identifier keys.
    ///
    /// # Errors
    ///
    /// Same conditions as [`entries`](Self::entries).
    pub async fn entries_as_vec<T, F>(&self, filter: F) -> Result<Vec<T>, StoreError>
    where
        T: UuidRecord,
        F: Filter<T> + 'static,
    {
        Ok(self.entries(filter).await?.into_values().collect())
    }

    /// Blocking form of [`entries_as_vec`](Self::entries_as_vec).
    pub fn entries_as_vec_blocking<T, F>(&self, filter: F) -> Result<Vec<T>, StoreError>
    where
        T: UuidRecord,
        F: Filter<T> + 'static,
    {
        Ok(self.entries_blocking(filter)?.into_values().collect())
    }

    /// Returns the first record the filter accepts, in partition iteration
    /// order.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when nothing matches, plus the conditions of
    /// [`entries`](Self::entries).
    pub async fn first_match<T, F>(&self, filter: F) -> Result<T, StoreError>
    where
        T: UuidRecord,
        F: Filter<T> + 'static,
    {
        resolve(self.submit_first_match(filter)).await
    }

    /// Blocking form of [`first_match`](Self::first_match).
    pub fn first_match_blocking<T, F>(&self, filter: F) -> Result<T, StoreError>
    where
        T: UuidRecord,
        F: Filter<T> + 'static,
    {
        resolve_blocking(self.submit_first_match(filter))
    }

    /// Returns the record with this identifier: [`first_match`](Self::first_match)
    /// with an identity-equality filter.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when no record has the identifier, plus the
    /// conditions of [`entries`](Self::entries).
    pub async fn entry_by_id<T: UuidRecord>(&self, id: Uuid) -> Result<T, StoreError> {
        self.first_match(UuidIs(id)).await
    }

    /// Blocking form of [`entry_by_id`](Self::entry_by_id).
    pub fn entry_by_id_blocking<T: UuidRecord>(&self, id: Uuid) -> Result<T, StoreError> {
        self.first_match_blocking(UuidIs(id))
    }

    // --- Mutations ---

    /// Adds one record, overwriting any existing record with the same
    /// identifier, and notifies the type's listeners.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotInitialized`] before [`init`](Self::init), or I/O
    /// and codec failures from lazy partition materialization.
    pub async fn add_entry<T: UuidRecord>(&self, record: T) -> Result<T, StoreError> {
        let id = record.uuid();
        let mut added = resolve(self.submit_add(vec![record])).await?;
        // The record was just inserted under this id.
        added.remove(&id).ok_or(StoreError::ShuttingDown)
    }

    /// Blocking form of [`add_entry`](Self::add_entry).
    pub fn add_entry_blocking<T: UuidRecord>(&self, record: T) -> Result<T, StoreError> {
        let id = record.uuid();
        let mut added = resolve_blocking(self.submit_add(vec![record]))?;
        added.remove(&id).ok_or(StoreError::ShuttingDown)
    }

    /// Adds many records keyed by their own identifiers. Records sharing an
    /// identifier with an existing record overwrite it. Listeners are
    /// notified once if at least one record was added; an empty input is a
    /// no-op success (it still materializes the partition).
    ///
    /// # Errors
    ///
    /// Same conditions as [`add_entry`](Self::add_entry).
    pub async fn add_entries<T: UuidRecord>(
        &self,
        records: Vec<T>,
    ) -> Result<HashMap<Uuid, T>, StoreError> {
        resolve(self.submit_add(records)).await
    }

    /// Blocking form of [`add_entries`](Self::add_entries).
    pub fn add_entries_blocking<T: UuidRecord>(
        &self,
        records: Vec<T>,
    ) -> Result<HashMap<Uuid, T>, StoreError> {
        resolve_blocking(self.submit_add(records))
    }

    /// Removes every record the filter accepts and returns them. Nothing
    /// matching is a no-op success with an empty result and no listener
    /// notification.
    ///
    /// # Errors
    ///
    /// Same conditions as [`entries`](Self::entries).
    pub async fn remove_entries<T, F>(&self, filter: F) -> Result<HashMap<Uuid, T>, StoreError>
    where
        T: UuidRecord,
        F: Filter<T> + 'static,
    {
        resolve(self.submit_remove(filter)).await
    }

    /// Blocking form of [`remove_entries`](Self::remove_entries).
    pub fn remove_entries_blocking<T, F>(&self, filter: F) -> Result<HashMap<Uuid, T>, StoreError>
    where
        T: UuidRecord,
        F: Filter<T> + 'static,
    {
        resolve_blocking(self.submit_remove(filter))
    }

    /// Removes this specific record by identity filter. Returns the removed
    /// record, or `None` if it was not present.
    ///
    /// # Errors
    ///
    /// Same conditions as [`entries`](Self::entries).
    pub async fn remove_entry<T: UuidRecord>(&self, record: &T) -> Result<Option<T>, StoreError> {
        let id = record.uuid();
        let mut removed = resolve(self.submit_remove(UuidIs(id))).await?;
        Ok(removed.remove(&id))
    }

    /// Blocking form of [`remove_entry`](Self::remove_entry).
    pub fn remove_entry_blocking<T: UuidRecord>(
        &self,
        record: &T,
    ) -> Result<Option<T>, StoreError> {
        let id = record.uuid();
        let mut removed = resolve_blocking(self.submit_remove(UuidIs(id)))?;
        Ok(removed.remove(&id))
    }

    // --- Persistence ---

    /// Persists the current in-memory partition of `T` to its backing file,
    /// overwriting it with a complete snapshot.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotInitialized`] before [`init`](Self::init),
    /// [`StoreError::Io`] on write failure, [`StoreError::CorruptData`] if
    /// the partition cannot be encoded.
    pub async fn commit<T: UuidRecord>(&self) -> Result<(), StoreError> {
        resolve(self.submit_commit::<T>()).await
    }

    /// Blocking form of [`commit`](Self::commit).
    pub fn commit_blocking<T: UuidRecord>(&self) -> Result<(), StoreError> {
        resolve_blocking(self.submit_commit::<T>())
    }

    /// Persists every partition currently known to the registry.
    ///
    /// # Errors
    ///
    /// Same conditions as [`commit`](Self::commit); the first failing
    /// partition aborts the sweep.
    pub async fn commit_all(&self) -> Result<(), StoreError> {
        resolve(self.submit_commit_all()).await
    }

    /// Blocking form of [`commit_all`](Self::commit_all).
    pub fn commit_all_blocking(&self) -> Result<(), StoreError> {
        resolve_blocking(self.submit_commit_all())
    }

    // --- Listeners ---

    /// Registers a change listener for `T`. Takes effect immediately (not
    /// dispatched) and requires no store root. Listeners fire after every
    /// mutating `add`/`remove` on the type, in registration order.
    pub fn register_listener<T: UuidRecord>(&self, listener: Arc<dyn ChangeListener>) {
        self.registry.listeners().register(T::TYPE_TAG, listener);
    }

    /// Unregisters a listener previously registered for `T`, matched by
    /// `Arc` identity. Unknown listeners are a no-op.
    pub fn unregister_listener<T: UuidRecord>(&self, listener: &Arc<dyn ChangeListener>) {
        self.registry.listeners().unregister(T::TYPE_TAG, listener);
    }

    // --- Job construction ---

    fn submit_entries<T, F>(
        &self,
        filter: F,
    ) -> oneshot::Receiver<Result<HashMap<Uuid, T>, StoreError>>
    where
        T: UuidRecord,
        F: Filter<T> + 'static,
    {
        let registry = Arc::clone(&self.registry);
        self.dispatcher.submit(move || {
            let partition = registry.get_or_create::<T>()?;
            partition.select(&filter)
        })
    }

    fn submit_first_match<T, F>(&self, filter: F) -> oneshot::Receiver<Result<T, StoreError>>
    where
        T: UuidRecord,
        F: Filter<T> + 'static,
    {
        let registry = Arc::clone(&self.registry);
        self.dispatcher.submit(move || {
            let partition = registry.get_or_create::<T>()?;
            partition
                .select_first(&filter)?
                .ok_or(StoreError::NotFound {
                    type_tag: T::TYPE_TAG,
                })
        })
    }

    fn submit_add<T: UuidRecord>(
        &self,
        records: Vec<T>,
    ) -> oneshot::Receiver<Result<HashMap<Uuid, T>, StoreError>> {
        let registry = Arc::clone(&self.registry);
        self.dispatcher.submit(move || {
            let partition = registry.get_or_create::<T>()?;
            let mut added = HashMap::with_capacity(records.len());
            for record in records {
                added.insert(record.uuid(), record.clone());
                partition.insert(record);
            }
            // Listeners run on this worker, before the completion signal.
            if !added.is_empty() {
                registry.listeners().notify(T::TYPE_TAG);
            }
            Ok(added)
        })
    }

    fn submit_remove<T, F>(
        &self,
        filter: F,
    ) -> oneshot::Receiver<Result<HashMap<Uuid, T>, StoreError>>
    where
        T: UuidRecord,
        F: Filter<T> + 'static,
    {
        let registry = Arc::clone(&self.registry);
        self.dispatcher.submit(move || {
            let partition = registry.get_or_create::<T>()?;
            let matched = partition.select(&filter)?;
            for id in matched.keys() {
                partition.remove_id(*id);
            }
            if !matched.is_empty() {
                registry.listeners().notify(T::TYPE_TAG);
            }
            Ok(matched)
        })
    }

    fn submit_commit<T: UuidRecord>(&self) -> oneshot::Receiver<Result<(), StoreError>> {
        let registry = Arc::clone(&self.registry);
        self.dispatcher.submit(move || {
            let partition = registry.get_or_create::<T>()?;
            let root = registry.root()?;
            partition.persist(&root)
        })
    }

    fn submit_commit_all(&self) -> oneshot::Receiver<Result<(), StoreError>> {
        let registry = Arc::clone(&self.registry);
        self.dispatcher.submit(move || registry.persist_all())
    }
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Awaits the one-shot completion signal; a dropped signal means the
/// dispatcher went away mid-operation.
async fn resolve<R>(outcome: oneshot::Receiver<Result<R, StoreError>>) -> Result<R, StoreError> {
    outcome.await.unwrap_or(Err(StoreError::ShuttingDown))
}

/// Parks the calling thread on the completion signal.
fn resolve_blocking<R>(outcome: oneshot::Receiver<Result<R, StoreError>>) -> Result<R, StoreError> {
    outcome
        .blocking_recv()
        .unwrap_or(Err(StoreError::ShuttingDown))
}
