//! Record selection predicates.
//!
//! Queries select subsets of a partition with a caller-supplied [`Filter`]:
//! a single-method capability evaluated against each record during a linear
//! scan. Predicates are fallible: an error raised mid-scan aborts the
//! operation and surfaces as [`StoreError::Predicate`](crate::StoreError::Predicate).
//!
//! Two built-ins cover the common cases: [`MatchAll`] and [`UuidIs`].
//! Infallible closures adapt through [`filter_fn`].

use uuid::Uuid;

use crate::record::UuidRecord;

/// Predicate over records of one type.
///
/// Implementations must be pure with respect to the partition: evaluation
/// runs while the partition is being iterated, so a filter must not call
/// back into the store. Used by value, moved onto the executing worker.
pub trait Filter<T>: Send + Sync {
    /// Returns whether `record` belongs to the selected subset.
    ///
    /// # Errors
    ///
    /// Any error aborts the scan; the operation fails with
    /// [`StoreError::Predicate`](crate::StoreError::Predicate).
    fn matches(&self, record: &T) -> anyhow::Result<bool>;
}

/// Selects every record in the partition.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchAll;

impl<T> Filter<T> for MatchAll {
    fn matches(&self, _record: &T) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Selects the record with exactly this identifier.
#[derive(Debug, Clone, Copy)]
pub struct UuidIs(pub Uuid);

impl<T: UuidRecord> Filter<T> for UuidIs {
    fn matches(&self, record: &T) -> anyhow::Result<bool> {
        Ok(record.uuid() == self.0)
    }
}

/// [`Filter`] adapter for an infallible closure. Built by [`filter_fn`].
pub struct FnFilter<F>(F);

impl<T, F> Filter<T> for FnFilter<F>
where
    F: Fn(&T) -> bool + Send + Sync,
{
    fn matches(&self, record: &T) -> anyhow::Result<bool> {
        Ok((self.0)(record))
    }
}

/// Wraps a plain `Fn(&T) -> bool` closure as a [`Filter`].
pub fn filter_fn<F>(predicate: F) -> FnFilter<F> {
    FnFilter(predicate)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Tagged {
        id: Uuid,
        level: u32,
    }

    impl UuidRecord for Tagged {
        const TYPE_TAG: &'static str = "Tagged";

        fn uuid(&self) -> Uuid {
            self.id
        }
    }

    #[test]
    fn match_all_accepts_everything() {
        let record = Tagged {
            id: Uuid::new_v4(),
            level: 3,
        };
        assert!(MatchAll.matches(&record).unwrap());
    }

    #[test]
    fn uuid_is_matches_identity_only() {
        let record = Tagged {
            id: Uuid::new_v4(),
            level: 1,
        };
        assert!(UuidIs(record.id).matches(&record).unwrap());
        assert!(!UuidIs(Uuid::new_v4()).matches(&record).unwrap());
    }

    #[test]
    fn closure_adapter_evaluates_payload() {
        let record = Tagged {
            id: Uuid::new_v4(),
            level: 7,
        };
        let above_five = filter_fn(|t: &Tagged| t.level > 5);
        assert!(above_five.matches(&record).unwrap());

        let below_five = filter_fn(|t: &Tagged| t.level < 5);
        assert!(!below_five.matches(&record).unwrap());
    }

    #[test]
    fn fallible_filter_propagates_error() {
        struct Failing;
        impl Filter<Tagged> for Failing {
            fn matches(&self, _record: &Tagged) -> anyhow::Result<bool> {
                anyhow::bail!("boom")
            }
        }

        let record = Tagged {
            id: Uuid::new_v4(),
            level: 0,
        };
        assert!(Failing.matches(&record).is_err());
    }
}
