//! Record contract for stored values.
//!
//! A store does no runtime type introspection: each record type registers
//! itself explicitly through [`UuidRecord`] by declaring a type tag (which
//! names its partition and backing file) and exposing its identifier. The
//! serde bounds are the codec: partitions round-trip through JSON as an
//! object keyed by string-formatted UUIDs.

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// A value the store can hold: identified by a UUID, serializable to JSON.
///
/// Identity for store purposes is the UUID *exclusively*: two records with
/// equal UUIDs are the same record, and inserting the second overwrites the
/// first. Payload equality is never consulted.
///
/// Type tags must be unique within a store; the tag doubles as the backing
/// file name (`<root>/<TYPE_TAG>.json`), so it should be a valid file stem.
pub trait UuidRecord:
    Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Tag naming this type's partition and backing file.
    const TYPE_TAG: &'static str;

    /// The record's globally unique, immutable identifier.
    fn uuid(&self) -> Uuid;
}
