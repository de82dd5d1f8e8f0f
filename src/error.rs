//! Store-level error taxonomy.
//!
//! Every failure an operation can surface is a [`StoreError`] variant, so
//! callers can match on the kind instead of parsing a message string. The
//! one expected miss, a backing file that does not exist yet on first
//! access to a type, never reaches callers; the registry treats it as the
//! cue to create an empty partition.

use thiserror::Error;

/// Errors surfaced by [`ObjectStore`](crate::ObjectStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O-touching operation ran before [`ObjectStore::init`](crate::ObjectStore::init)
    /// configured the store root. Listener registration does not require a root.
    #[error("store root has not been initialized")]
    NotInitialized,

    /// A single-record lookup matched nothing in the partition.
    #[error("no record matched in partition '{type_tag}'")]
    NotFound {
        /// Type tag of the partition that was searched.
        type_tag: &'static str,
    },

    /// The JSON codec failed: the backing file exists but cannot be parsed
    /// as an id-to-record object, or the in-memory partition could not be
    /// encoded for persistence.
    #[error("corrupt data for partition '{type_tag}': {source}")]
    CorruptData {
        /// Type tag of the affected partition.
        type_tag: &'static str,
        /// Underlying codec error.
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing the backing file failed below the codec layer.
    #[error("i/o failure for partition '{type_tag}': {source}")]
    Io {
        /// Type tag of the affected partition.
        type_tag: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A caller-supplied filter returned an error while evaluating a record.
    #[error("filter predicate failed during evaluation: {message}")]
    Predicate {
        /// Rendered message of the predicate's error chain.
        message: String,
    },

    /// Two distinct record types declared the same
    /// [`TYPE_TAG`](crate::UuidRecord::TYPE_TAG). Tags must be unique per store.
    #[error("type tag '{0}' is already bound to a different record type")]
    TypeTagConflict(&'static str),

    /// The dispatcher stopped before the operation completed. Only seen while
    /// the store is being torn down.
    #[error("store is shutting down; operation was dropped before completing")]
    ShuttingDown,
}

impl StoreError {
    /// Builds a [`StoreError::Predicate`] from any error chain.
    pub(crate) fn predicate(source: &anyhow::Error) -> Self {
        Self::Predicate {
            message: format!("{source:#}"),
        }
    }
}
