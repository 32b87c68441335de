// StatePublisher - current value + ordered change stream + synchronous observers
//
// Shared by LoadingManager and GlobalStateAggregator. A transition is decided, broadcast and
// queued for observers while the state lock is held, which keeps both streams in mutation
// order. Observers are invoked after the lock is released so they may read the source back or
// mutate it; a change made from inside an observer is queued and delivered once every observer
// has seen the change before it.

use super::StateChange;
use super::atomic::Atomic;
use super::observers::{Observer, ObserverRegistry, Subscription};
use crate::metrics::Metrics;
use crate::models::LoadableState;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of each change stream; a subscriber lagging further behind skips ahead.
pub const CHANGE_CHANNEL_CAPACITY: usize = 100;

pub(crate) struct StatePublisher {
    source: Uuid,
    state: Atomic<LoadableState>,
    state_tx: broadcast::Sender<StateChange>,
    observers: Arc<ObserverRegistry>,
    delivery: Atomic<Delivery>,
    metrics: Arc<Metrics>,
}

/// Changes waiting for observers, and whether some caller is already draining them.
#[derive(Default)]
struct Delivery {
    draining: bool,
    pending: VecDeque<StateChange>,
}

/// Clears the draining flag if an observer panics mid-delivery.
struct DrainGuard<'a>(&'a Atomic<Delivery>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        self.0.mutate(|delivery| {
            delivery.draining = false;
            delivery.pending.clear();
        });
    }
}

impl StatePublisher {
    pub(crate) fn new(source: Uuid, initial: LoadableState, metrics: Arc<Metrics>) -> Self {
        let (state_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            source,
            state: Atomic::new(initial),
            state_tx,
            observers: Arc::new(ObserverRegistry::default()),
            delivery: Atomic::new(Delivery::default()),
            metrics,
        }
    }

    pub(crate) fn snapshot(&self) -> LoadableState {
        self.state.get()
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&LoadableState) -> R) -> R {
        self.state.read(f)
    }

    /// Apply a transition.
    ///
    /// `decide` runs inside the state critical section and returns the next state, or `None`
    /// to leave the state untouched. A next state equal to the current one is a no-op and emits
    /// nothing. Returns the emitted change. When called from inside an observer, the change has
    /// been applied and broadcast on return but reaches observers after the current delivery.
    pub(crate) fn transition<F>(&self, decide: F) -> Option<StateChange>
    where
        F: FnOnce(&LoadableState) -> Option<LoadableState>,
    {
        let change = self.state.mutate(|current| {
            let next = decide(&*current)?;
            if *current == next {
                return None;
            }

            let previous = std::mem::replace(current, next.clone());
            let change = StateChange {
                source: self.source,
                previous,
                current: next,
            };

            self.metrics.record_state_update();
            // Sending with no receivers is fine, the stream is optional
            match self.state_tx.send(change.clone()) {
                Ok(_) => self.metrics.record_state_broadcast(),
                Err(_) => self.metrics.record_unobserved_update(),
            }

            self.delivery
                .mutate(|delivery| delivery.pending.push_back(change.clone()));
            Some(change)
        })?;

        tracing::debug!("{}: {} -> {}", self.source, change.previous, change.current);
        self.deliver();
        Some(change)
    }

    /// Hand queued changes to observers in the order they were applied.
    ///
    /// Only the outermost caller drains; a transition made by an observer (on this thread or
    /// another) while delivery is in progress just leaves its change in the queue.
    fn deliver(&self) {
        let claimed = self.delivery.mutate(|delivery| {
            !std::mem::replace(&mut delivery.draining, true)
        });
        if !claimed {
            return;
        }

        let _guard = DrainGuard(&self.delivery);
        loop {
            let next = self.delivery.mutate(|delivery| {
                let next = delivery.pending.pop_front();
                if next.is_none() {
                    delivery.draining = false;
                }
                next
            });
            match next {
                Some(change) => self.observers.notify(&change),
                None => break,
            }
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    pub(crate) fn observe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        let observer: Observer = Arc::new(observer);
        self.observers.register(observer)
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.observers.len()
    }

    #[cfg(test)]
    pub(crate) fn receiver_count(&self) -> usize {
        self.state_tx.receiver_count()
    }

    pub(crate) fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    fn publisher() -> StatePublisher {
        StatePublisher::new(Uuid::new_v4(), LoadableState::None, Arc::new(Metrics::new()))
    }

    #[test]
    fn test_transition_emits_change() {
        let publisher = publisher();
        let mut rx = publisher.subscribe();

        let change = publisher
            .transition(|_| Some(LoadableState::Loading))
            .unwrap();

        assert_eq!(change.previous, LoadableState::None);
        assert_eq!(change.current, LoadableState::Loading);
        assert_eq!(rx.try_recv().unwrap(), change);
        assert_eq!(publisher.snapshot(), LoadableState::Loading);
    }

    #[test]
    fn test_equal_state_is_noop() {
        let publisher = publisher();
        let mut rx = publisher.subscribe();

        assert!(publisher.transition(|_| Some(LoadableState::None)).is_none());
        assert!(publisher.transition(|_| None).is_none());
        assert!(rx.try_recv().is_err());
        assert_eq!(
            publisher.metrics().state_updates.load(Ordering::Relaxed),
            0
        );
    }

    #[test]
    fn test_unobserved_updates_are_counted() {
        let publisher = publisher();
        publisher.transition(|_| Some(LoadableState::Loading));

        assert_eq!(publisher.receiver_count(), 0);
        assert_eq!(
            publisher.metrics().unobserved_updates.load(Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn test_observer_can_read_source_reentrantly() {
        let publisher = Arc::new(publisher());
        let seen = Arc::new(Atomic::new(None));

        let weak = Arc::downgrade(&publisher);
        let sink = Arc::clone(&seen);
        let _subscription = publisher.observe(move |_| {
            if let Some(publisher) = weak.upgrade() {
                sink.set(Some(publisher.snapshot()));
            }
        });

        publisher.transition(|_| Some(LoadableState::success("ok")));

        assert_eq!(seen.get(), Some(LoadableState::success("ok")));
        assert_eq!(publisher.observer_count(), 1);
    }

    #[test]
    fn test_nested_transition_is_delivered_after_current_change() {
        let publisher = Arc::new(publisher());
        let log = Arc::new(Atomic::new(Vec::<String>::new()));

        let weak = Arc::downgrade(&publisher);
        let first_log = Arc::clone(&log);
        let _dismiss = publisher.observe(move |change| {
            first_log.mutate(|log| log.push(format!("first {}", change.current)));
            if change.current.is_success() {
                if let Some(publisher) = weak.upgrade() {
                    publisher.transition(|_| Some(LoadableState::None));
                }
            }
        });
        let second_log = Arc::clone(&log);
        let _record = publisher.observe(move |change| {
            second_log.mutate(|log| log.push(format!("second {}", change.current)));
        });

        publisher.transition(|_| Some(LoadableState::success("ok")));

        assert_eq!(
            log.get(),
            vec![
                "first Success: `ok`",
                "second Success: `ok`",
                "first None",
                "second None",
            ]
        );
        assert_eq!(publisher.snapshot(), LoadableState::None);
    }

    #[test]
    fn test_panicking_observer_does_not_stall_delivery() {
        let publisher = Arc::new(publisher());
        let hits = Arc::new(Atomic::new(0_usize));

        let sink = Arc::clone(&hits);
        let _observer = publisher.observe(move |change| {
            sink.mutate(|hits| *hits += 1);
            if change.current.is_loading() {
                panic!("observer failed");
            }
        });

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            publisher.transition(|_| Some(LoadableState::Loading));
        }));
        assert!(outcome.is_err());

        publisher.transition(|_| Some(LoadableState::None));
        assert_eq!(hits.get(), 2);
    }
}
