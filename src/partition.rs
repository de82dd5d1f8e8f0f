//! Typed in-memory partitions and their whole-file persistence.
//!
//! A [`Partition`] is the complete in-memory set of records of one type (a
//! concurrent id-to-record map plus a persist lock), backed by exactly one
//! JSON file, `<root>/<TYPE_TAG>.json`. Loading reads the whole file;
//! persisting overwrites it with a complete snapshot, never a diff. A crash
//! mid-write can leave a truncated file: the baseline deliberately skips
//! temp-file-and-rename staging.
//!
//! [`ErasedPartition`] is the type-erased handle the registry stores, so
//! partitions of different record types share one map and `commit`-all can
//! persist them without knowing their concrete types.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::filter::Filter;
use crate::record::UuidRecord;

/// In-memory partition for records of type `T`.
///
/// The entry map supports concurrent put/remove/iterate: reads scan while
/// writers mutate, with last-write-wins semantics per identifier. The
/// persist lock serializes whole-file writes so two concurrent commits for
/// the same type never interleave.
pub(crate) struct Partition<T: UuidRecord> {
    entries: DashMap<Uuid, T>,
    persist_lock: Mutex<()>,
}

impl<T: UuidRecord> Partition<T> {
    /// Creates an empty partition not yet backed by a file.
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
            persist_lock: Mutex::new(()),
        }
    }

    /// Path of the partition's backing file under `root`.
    pub(crate) fn file_path(root: &Path) -> PathBuf {
        root.join(format!("{}.json", T::TYPE_TAG))
    }

    /// Loads the partition from its backing file.
    ///
    /// Returns `Ok(None)` when the file does not exist. That is expected on
    /// the first access to a never-before-seen type, and is the registry's
    /// cue to create an empty partition instead.
    pub(crate) fn load(root: &Path) -> Result<Option<Self>, StoreError> {
        let path = Self::file_path(root);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    type_tag: T::TYPE_TAG,
                    source,
                })
            }
        };

        let decoded: HashMap<Uuid, T> = serde_json::from_str(&raw).map_err(|source| {
            warn!(type_tag = T::TYPE_TAG, %source, "backing file is corrupt");
            StoreError::CorruptData {
                type_tag: T::TYPE_TAG,
                source,
            }
        })?;

        let entries = DashMap::with_capacity(decoded.len());
        for (id, record) in decoded {
            entries.insert(id, record);
        }
        debug!(
            type_tag = T::TYPE_TAG,
            entries = entries.len(),
            "loaded partition from disk"
        );

        Ok(Some(Self {
            entries,
            persist_lock: Mutex::new(()),
        }))
    }

    /// Serializes the entire partition to its backing file, overwriting it.
    pub(crate) fn persist(&self, root: &Path) -> Result<(), StoreError> {
        let _guard = self.persist_lock.lock();

        let snapshot: HashMap<Uuid, T> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        let raw = serde_json::to_string(&snapshot).map_err(|source| StoreError::CorruptData {
            type_tag: T::TYPE_TAG,
            source,
        })?;

        std::fs::write(Self::file_path(root), raw).map_err(|source| StoreError::Io {
            type_tag: T::TYPE_TAG,
            source,
        })?;
        debug!(
            type_tag = T::TYPE_TAG,
            entries = snapshot.len(),
            "persisted partition"
        );
        Ok(())
    }

    /// Inserts a record under its own identifier, overwriting any existing
    /// record with the same identifier.
    pub(crate) fn insert(&self, record: T) -> Option<T> {
        self.entries.insert(record.uuid(), record)
    }

    /// Removes the record with this identifier, if present.
    pub(crate) fn remove_id(&self, id: Uuid) -> Option<T> {
        self.entries.remove(&id).map(|(_, record)| record)
    }

    /// Linear scan collecting every record the filter accepts.
    pub(crate) fn select<F: Filter<T>>(&self, filter: &F) -> Result<HashMap<Uuid, T>, StoreError> {
        let mut matched = HashMap::new();
        for entry in self.entries.iter() {
            match filter.matches(entry.value()) {
                Ok(true) => {
                    matched.insert(*entry.key(), entry.value().clone());
                }
                Ok(false) => {}
                Err(source) => return Err(StoreError::predicate(&source)),
            }
        }
        Ok(matched)
    }

    /// Linear scan returning the first record the filter accepts, in
    /// partition iteration order.
    pub(crate) fn select_first<F: Filter<T>>(&self, filter: &F) -> Result<Option<T>, StoreError> {
        for entry in self.entries.iter() {
            match filter.matches(entry.value()) {
                Ok(true) => return Ok(Some(entry.value().clone())),
                Ok(false) => {}
                Err(source) => return Err(StoreError::predicate(&source)),
            }
        }
        Ok(None)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

// Manual impl: `T` need not be `Debug`. Renders the tag and entry count,
// never record payloads.
impl<T: UuidRecord> fmt::Debug for Partition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition")
            .field("type_tag", &T::TYPE_TAG)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Type-erased partition handle held by the registry.
///
/// Exposes exactly what the registry needs without the record type:
/// whole-file persistence for `commit`, and downcasting back to the typed
/// partition on access.
pub(crate) trait ErasedPartition: Send + Sync {
    /// Tag identifying the record type this partition holds.
    fn type_tag(&self) -> &'static str;

    /// Persists the full snapshot to the backing file under `root`.
    fn persist_erased(&self, root: &Path) -> Result<(), StoreError>;

    /// Upcast for [`Arc::downcast`] back to `Partition<T>`.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: UuidRecord> ErasedPartition for Partition<T> {
    fn type_tag(&self) -> &'static str {
        T::TYPE_TAG
    }

    fn persist_erased(&self, root: &Path) -> Result<(), StoreError> {
        self.persist(root)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::filter::{filter_fn, MatchAll, UuidIs};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Note {
        id: Uuid,
        title: String,
    }

    impl UuidRecord for Note {
        const TYPE_TAG: &'static str = "Note";

        fn uuid(&self) -> Uuid {
            self.id
        }
    }

    fn note(title: &str) -> Note {
        Note {
            id: Uuid::new_v4(),
            title: title.to_string(),
        }
    }

    #[test]
    fn insert_overwrites_on_equal_id() {
        let partition = Partition::<Note>::new();
        let first = note("first");
        let second = Note {
            id: first.id,
            title: "second".to_string(),
        };

        assert!(partition.insert(first.clone()).is_none());
        let previous = partition.insert(second.clone());
        assert_eq!(previous, Some(first));
        assert_eq!(partition.len(), 1);

        let found = partition.select_first(&UuidIs(second.id)).unwrap();
        assert_eq!(found, Some(second));
    }

    #[test]
    fn select_scans_linearly_with_filter() {
        let partition = Partition::<Note>::new();
        partition.insert(note("keep"));
        partition.insert(note("keep"));
        partition.insert(note("drop"));

        let kept = partition
            .select(&filter_fn(|n: &Note| n.title == "keep"))
            .unwrap();
        assert_eq!(kept.len(), 2);
        assert!(kept.values().all(|n| n.title == "keep"));
    }

    #[test]
    fn predicate_error_aborts_the_scan() {
        struct Failing;
        impl Filter<Note> for Failing {
            fn matches(&self, _record: &Note) -> anyhow::Result<bool> {
                anyhow::bail!("predicate exploded")
            }
        }

        let partition = Partition::<Note>::new();
        partition.insert(note("any"));

        let err = partition.select(&Failing).unwrap_err();
        assert!(matches!(err, StoreError::Predicate { .. }));

        let err = partition.select_first(&Failing).unwrap_err();
        assert!(matches!(err, StoreError::Predicate { .. }));
    }

    #[test]
    fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let partition = Partition::<Note>::new();
        let a = note("a");
        let b = note("b");
        partition.insert(a.clone());
        partition.insert(b.clone());

        partition.persist(dir.path()).unwrap();
        assert!(Partition::<Note>::file_path(dir.path()).is_file());

        let reloaded = Partition::<Note>::load(dir.path()).unwrap().unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.select(&MatchAll).unwrap(), {
            let mut expected = HashMap::new();
            expected.insert(a.id, a);
            expected.insert(b.id, b);
            expected
        });
    }

    #[test]
    fn load_missing_file_is_an_expected_miss() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Partition::<Note>::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn load_unparseable_file_is_corrupt_data() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(Partition::<Note>::file_path(dir.path()), "not json {").unwrap();

        let err = Partition::<Note>::load(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::CorruptData { type_tag: "Note", .. }));
    }

    #[test]
    fn persist_overwrites_the_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let partition = Partition::<Note>::new();
        let keeper = note("keeper");
        let goner = note("goner");
        partition.insert(keeper.clone());
        partition.insert(goner.clone());
        partition.persist(dir.path()).unwrap();

        partition.remove_id(goner.id);
        partition.persist(dir.path()).unwrap();

        let reloaded = Partition::<Note>::load(dir.path()).unwrap().unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(
            reloaded.select_first(&UuidIs(keeper.id)).unwrap(),
            Some(keeper)
        );
        assert_eq!(reloaded.select_first(&UuidIs(goner.id)).unwrap(), None);
    }

    #[test]
    fn debug_rendering_names_the_tag_not_the_payload() {
        let partition = Partition::<Note>::new();
        partition.insert(note("secret payload"));

        let rendered = format!("{partition:?}");
        assert!(rendered.contains("Note"));
        assert!(rendered.contains("entries: 1"));
        assert!(!rendered.contains("secret payload"));
    }

    #[test]
    fn erased_handle_downcasts_to_the_typed_partition() {
        let partition: Arc<Partition<Note>> = Arc::new(Partition::new());
        partition.insert(note("erased"));
        let erased: Arc<dyn ErasedPartition> = Arc::clone(&partition) as _;

        assert_eq!(erased.type_tag(), "Note");
        let recovered = erased
            .as_any()
            .downcast::<Partition<Note>>()
            .ok()
            .unwrap();
        assert_eq!(recovered.len(), 1);
    }
}
