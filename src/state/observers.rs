// Synchronous observer registry
//
// Observers run right after the state lock is released, usually on the thread that performed
// the mutation. Each source delivers its changes one at a time and in order, so fan-in
// consumers (the global aggregator) always end on the latest state.

use super::StateChange;
use super::atomic::Atomic;
use indexmap::IndexMap;
use std::fmt;
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Callback invoked synchronously for every emitted [`StateChange`].
pub type Observer = Arc<dyn Fn(&StateChange) + Send + Sync + 'static>;

#[derive(Default)]
pub(crate) struct ObserverRegistry {
    observers: Atomic<IndexMap<Uuid, Observer>>,
}

impl ObserverRegistry {
    pub(crate) fn register(self: &Arc<Self>, observer: Observer) -> Subscription {
        let id = Uuid::new_v4();
        self.observers.mutate(|observers| {
            observers.insert(id, observer);
        });

        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    /// Invoke every observer with `change`.
    ///
    /// The list is snapshotted first, so observers may subscribe or unsubscribe re-entrantly.
    pub(crate) fn notify(&self, change: &StateChange) {
        let snapshot: Vec<Observer> = self
            .observers
            .read(|observers| observers.values().cloned().collect());

        for observer in snapshot {
            observer(change);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.read(IndexMap::len)
    }

    fn contains(&self, id: &Uuid) -> bool {
        self.observers.read(|observers| observers.contains_key(id))
    }

    fn remove(&self, id: &Uuid) {
        self.observers.mutate(|observers| {
            observers.shift_remove(id);
        });
    }
}

/// Handle to a registered observer; dropping it detaches the observer.
#[must_use = "dropping a Subscription immediately detaches the observer"]
pub struct Subscription {
    id: Uuid,
    registry: Weak<ObserverRegistry>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the observer is still attached to a live source.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.contains(&self.id))
    }

    /// Detach explicitly; same as dropping.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoadableState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn change() -> StateChange {
        StateChange {
            source: Uuid::new_v4(),
            previous: LoadableState::None,
            current: LoadableState::Loading,
        }
    }

    #[test]
    fn test_drop_detaches_observer() {
        let registry = Arc::new(ObserverRegistry::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let subscription = registry.register(Arc::new(move |_: &StateChange| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(subscription.is_active());

        registry.notify(&change());
        drop(subscription);
        registry.notify(&change());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_subscription_outlives_registry() {
        let registry = Arc::new(ObserverRegistry::default());
        let subscription = registry.register(Arc::new(|_: &StateChange| {}));

        drop(registry);

        assert!(!subscription.is_active());
        subscription.cancel();
    }
}
