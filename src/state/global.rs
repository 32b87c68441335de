// Global state aggregator
//
// Fans many LoadingManagers into one merged LoadableState for a top-level surface such as a
// blocking overlay. Forwarding is synchronous, so the merged state always matches the last
// notification processed from any subscribed manager.

use super::atomic::Atomic;
use super::publisher::StatePublisher;
use super::{LoadingManager, StateChange, Subscription};
use crate::metrics::Metrics;
use crate::models::LoadableState;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

struct AggregatorInner {
    id: Uuid,
    publisher: StatePublisher,
    subscriptions: Atomic<IndexMap<Uuid, Subscription>>,
}

impl AggregatorInner {
    fn forward(&self, change: &StateChange) {
        let next = change.current.clone();
        if self.publisher.transition(|_| Some(next)).is_some() {
            tracing::debug!(
                "Aggregator {} took {} from manager {}",
                self.id,
                change.current,
                change.source
            );
        }
    }
}

/// Fan-in of any number of [`LoadingManager`]s into one state
///
/// Last notification wins: there is no priority between managers. Subscribing and
/// unsubscribing never write the merged state; it changes only when a subscribed manager
/// emits.
///
/// # Example
/// ```ignore
/// let overlay = GlobalStateAggregator::new();
/// overlay.subscribe([&upload, &sync]);
///
/// upload.show_loading();
/// assert!(overlay.is_loading());
/// ```
#[derive(Clone)]
pub struct GlobalStateAggregator {
    inner: Arc<AggregatorInner>,
}

impl GlobalStateAggregator {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(Metrics::new()))
    }

    pub fn with_metrics(metrics: Arc<Metrics>) -> Self {
        let id = Uuid::new_v4();
        Self {
            inner: Arc::new(AggregatorInner {
                id,
                publisher: StatePublisher::new(id, LoadableState::None, metrics),
                subscriptions: Atomic::default(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Forward every future notification of each manager into the merged state
    ///
    /// Subscribing a manager that is already subscribed replaces its previous subscription.
    pub fn subscribe<'a>(&self, managers: impl IntoIterator<Item = &'a LoadingManager>) {
        for manager in managers {
            let aggregator = Arc::downgrade(&self.inner);
            let subscription = manager.observe(move |change| {
                if let Some(aggregator) = aggregator.upgrade() {
                    aggregator.forward(change);
                }
            });

            // Replaced subscription is dropped after the lock is released
            let replaced = self
                .inner
                .subscriptions
                .mutate(|subscriptions| subscriptions.insert(manager.id(), subscription));

            if replaced.is_some() {
                tracing::debug!("Aggregator {}: resubscribed manager {}", self.inner.id, manager.id());
            } else {
                tracing::debug!("Aggregator {}: subscribed manager {}", self.inner.id, manager.id());
            }
        }
    }

    /// Stop following `manager`
    ///
    /// Its last contribution stays in the merged state. Returns whether it was subscribed.
    pub fn unsubscribe(&self, manager: &LoadingManager) -> bool {
        self.unsubscribe_id(manager.id())
    }

    pub fn unsubscribe_id(&self, id: Uuid) -> bool {
        let removed = self
            .inner
            .subscriptions
            .mutate(|subscriptions| subscriptions.shift_remove(&id));

        if removed.is_some() {
            tracing::debug!("Aggregator {}: unsubscribed manager {}", self.inner.id, id);
            true
        } else {
            false
        }
    }

    /// Merged state
    pub fn state(&self) -> LoadableState {
        self.inner.publisher.snapshot()
    }

    /// Whether the merged state is [`LoadableState::Loading`]
    pub fn is_loading(&self) -> bool {
        self.inner.publisher.read(LoadableState::is_loading)
    }

    /// Subscribe to merged state changes
    pub fn subscribe_changes(&self) -> broadcast::Receiver<StateChange> {
        self.inner.publisher.subscribe()
    }

    /// Register a synchronous observer of merged state changes
    pub fn observe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.inner.publisher.observe(observer)
    }

    /// Ids of subscribed managers, in subscription order
    pub fn subscribed_ids(&self) -> Vec<Uuid> {
        self.inner
            .subscriptions
            .read(|subscriptions| subscriptions.keys().copied().collect())
    }

    pub fn is_subscribed(&self, id: Uuid) -> bool {
        self.inner
            .subscriptions
            .read(|subscriptions| subscriptions.contains_key(&id))
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        self.inner.publisher.metrics()
    }
}

impl Default for GlobalStateAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GlobalStateAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalStateAggregator")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("subscribed", &self.subscribed_ids())
            .finish()
    }
}
