//! `uuidstore`: embedded, type-partitioned UUID object store with per-type
//! JSON file persistence.
//!
//! A process-local cache of identifiable records: each record type gets its
//! own in-memory partition (identifier → record), lazily loaded from
//! `<root>/<TYPE_TAG>.json` on first access and durably flushed back as a
//! complete snapshot on commit. Operations run on a bounded worker pool and
//! come in an async form and a blocking `*_blocking` form built on the same
//! one-shot completion signal.
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use uuid::Uuid;
//! use uuidstore::{filter_fn, ObjectStore, UuidRecord};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Note {
//!     id: Uuid,
//!     title: String,
//! }
//!
//! impl UuidRecord for Note {
//!     const TYPE_TAG: &'static str = "Note";
//!     fn uuid(&self) -> Uuid {
//!         self.id
//!     }
//! }
//!
//! # async fn demo() -> Result<(), uuidstore::StoreError> {
//! let store = ObjectStore::new();
//! store.init("/var/lib/myapp/store");
//!
//! let note = Note { id: Uuid::new_v4(), title: "hello".into() };
//! store.add_entry(note.clone()).await?;
//! let found: Note = store.entry_by_id(note.id).await?;
//! let titled = store
//!     .entries(filter_fn(|n: &Note| n.title == "hello"))
//!     .await?;
//! store.commit::<Note>().await?;
//! # let _ = (found, titled);
//! # Ok(())
//! # }
//! ```

mod dispatcher;
pub mod error;
pub mod filter;
pub mod listener;
mod partition;
pub mod record;
mod registry;
pub mod store;

pub use error::StoreError;
pub use filter::{filter_fn, Filter, FnFilter, MatchAll, UuidIs};
pub use listener::ChangeListener;
pub use record::UuidRecord;
pub use store::ObjectStore;

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
