//! Change notification for mutated partitions.
//!
//! Defines [`ChangeListener`] and the per-type [`ListenerRegistry`].
//! Listeners carry no payload: they learn only that their type's partition
//! changed. They run synchronously, in registration order, on the same
//! execution unit that performed the mutation. A listener list exists
//! independently of partition state: callers may register before the
//! partition has ever been loaded, and without an initialized store root.

use std::sync::Arc;

use dashmap::DashMap;

/// Callback invoked after a partition of the registered type mutates.
///
/// Mutating operations on the same type may run concurrently on different
/// workers, so a listener's side effects must be safe under concurrent
/// invocation. Used as `Arc<dyn ChangeListener>`; unregistration matches by
/// `Arc` identity.
pub trait ChangeListener: Send + Sync {
    /// Called once per mutating operation on the type's partition.
    fn on_change(&self);
}

/// Ordered per-type-tag listener lists, shared across all execution units.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: DashMap<&'static str, Vec<Arc<dyn ChangeListener>>>,
}

impl ListenerRegistry {
    /// Appends `listener` to the tag's list, preserving registration order.
    pub(crate) fn register(&self, type_tag: &'static str, listener: Arc<dyn ChangeListener>) {
        self.listeners.entry(type_tag).or_default().push(listener);
    }

    /// Removes every registration of `listener` for the tag, matched by
    /// `Arc` identity. Unknown listeners are a no-op.
    pub(crate) fn unregister(&self, type_tag: &'static str, listener: &Arc<dyn ChangeListener>) {
        if let Some(mut registered) = self.listeners.get_mut(type_tag) {
            registered.retain(|existing| !Arc::ptr_eq(existing, listener));
        }
    }

    /// Invokes every listener for the tag, in registration order, on the
    /// calling execution unit.
    ///
    /// The list is snapshotted before invocation so a listener may
    /// register or unregister listeners without deadlocking the registry.
    pub(crate) fn notify(&self, type_tag: &'static str) {
        let snapshot: Vec<Arc<dyn ChangeListener>> = match self.listeners.get(type_tag) {
            Some(registered) => registered.value().clone(),
            None => return,
        };
        for listener in snapshot {
            listener.on_change();
        }
    }

    /// Drops every listener for every type. Part of the full `init` reset.
    pub(crate) fn clear(&self) {
        self.listeners.clear();
    }

    #[cfg(test)]
    pub(crate) fn count(&self, type_tag: &'static str) -> usize {
        self.listeners.get(type_tag).map_or(0, |l| l.len())
    }
}
