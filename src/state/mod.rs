// State management module
//
// This module provides the LoadingManager, which owns one LoadableState behind a lock, emits a
// StateChange for every transition and resets success/failure states after an inactivity delay.

pub mod atomic;
pub mod global;
mod observers;
mod publisher;

pub use atomic::Atomic;
pub use global::GlobalStateAggregator;
pub use observers::{Observer, Subscription};
pub use publisher::CHANGE_CHANNEL_CAPACITY;

use crate::action::Action;
use crate::metrics::Metrics;
use crate::models::{LoadableState, LoadingManagerSettings};
use publisher::StatePublisher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Change event emitted when a state holder moves to a different state
///
/// `source` is the id of the manager (or aggregator) that emitted it.
#[derive(Clone, Debug, PartialEq)]
pub struct StateChange {
    pub source: Uuid,
    pub previous: LoadableState,
    pub current: LoadableState,
}

/// Pending auto-hide task plus the generation it was started for.
///
/// Every cancellation bumps the generation, so a timer that already woke up but has not yet
/// taken the state lock can tell it was superseded.
#[derive(Default)]
struct AutoHideTimer {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl AutoHideTimer {
    fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Clone, Copy)]
enum TimerPolicy {
    Cancel,
    Restart,
}

struct ManagerInner {
    id: Uuid,
    settings: LoadingManagerSettings,
    publisher: StatePublisher,
    timer: Atomic<AutoHideTimer>,
    runtime: Option<Handle>,
}

impl ManagerInner {
    /// Set `next` and apply `policy` to the auto-hide timer in one critical section.
    ///
    /// The timer policy applies even when `next` equals the current state, so showing the same
    /// success twice still restarts the countdown.
    fn apply(self: &Arc<Self>, next: LoadableState, policy: TimerPolicy) -> Option<StateChange> {
        self.publisher.transition(|_| {
            self.timer.mutate(|timer| {
                timer.cancel();
                if let TimerPolicy::Restart = policy {
                    self.start_timer(timer);
                }
            });
            Some(next)
        })
    }

    fn start_timer(self: &Arc<Self>, timer: &mut AutoHideTimer) {
        let Some(runtime) = Handle::try_current().ok().or_else(|| self.runtime.clone()) else {
            tracing::warn!(
                "Manager {}: no tokio runtime available, state will not auto-hide",
                self.id
            );
            return;
        };

        let generation = timer.generation;
        let delay = self.settings.auto_hide_delay;
        let manager: Weak<Self> = Arc::downgrade(self);

        timer.task = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(manager) = manager.upgrade() {
                manager.auto_hide(generation);
            }
        }));
        self.publisher.metrics().record_timer_started();
    }

    fn auto_hide(&self, generation: u64) {
        let change = self.publisher.transition(|_| {
            self.timer.mutate(|timer| {
                if timer.generation != generation {
                    return None;
                }
                // Running task is this one; detach instead of aborting it
                timer.task = None;
                timer.generation = timer.generation.wrapping_add(1);
                Some(LoadableState::None)
            })
        });

        if change.is_some() {
            self.publisher.metrics().record_auto_hide();
            tracing::debug!("Manager {}: auto-hidden after {:?}", self.id, self.settings.auto_hide_delay);
        }
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.timer.mutate(AutoHideTimer::cancel);
    }
}

/// Per-operation loading state holder
///
/// Owns one [`LoadableState`] and:
/// - exposes it synchronously via [`state()`](Self::state) and [`read()`](Self::read)
/// - pushes a [`StateChange`] to broadcast subscribers ([`subscribe()`](Self::subscribe)) and
///   synchronous observers ([`observe()`](Self::observe)) for every transition, in mutation order
/// - hides success and failure states after `settings.auto_hide_delay`
///
/// Transitions to a state equal to the current one emit nothing; a second
/// [`hide()`](Self::hide) is therefore silent.
///
/// Cloning is cheap and yields a handle to the same manager. Equality and hashing use the
/// manager id.
///
/// # Usage
///
/// ```ignore
/// let manager = LoadingManager::new(LoadableState::None, LoadingManagerSettings::default());
/// manager.show_loading();
/// match fetch().await {
///     Ok(body) => manager.show_success(body.len()),
///     Err(e) => manager.show_failure(e, Some(retry)),
/// };
/// ```
///
/// # Related Types
///
/// - [`crate::models::LoadableState`]: The value being managed
/// - [`GlobalStateAggregator`]: Merges many managers into one signal
/// - [`crate::ui::RenderBridge`]: Draws a manager's state
#[derive(Clone)]
pub struct LoadingManager {
    inner: Arc<ManagerInner>,
}

impl LoadingManager {
    /// Create a manager with a fresh id
    ///
    /// The auto-hide timer runs on the tokio runtime current at the time a success or failure is
    /// shown, falling back to the runtime current at construction.
    pub fn new(initial: LoadableState, settings: LoadingManagerSettings) -> Self {
        Self::builder().state(initial).settings(settings).build()
    }

    /// Create a manager with an explicit id
    pub fn with_id(id: Uuid, initial: LoadableState, settings: LoadingManagerSettings) -> Self {
        Self::builder()
            .id(id)
            .state(initial)
            .settings(settings)
            .build()
    }

    pub fn builder() -> LoadingManagerBuilder {
        LoadingManagerBuilder::default()
    }

    /// Non-owning handle, for actions stored inside this manager's own failure state
    pub fn downgrade(&self) -> WeakLoadingManager {
        WeakLoadingManager {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn settings(&self) -> LoadingManagerSettings {
        self.inner.settings
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        self.inner.publisher.metrics()
    }

    /// Get a snapshot of the current state
    pub fn state(&self) -> LoadableState {
        self.inner.publisher.snapshot()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let busy = manager.read(LoadableState::is_loading);
    /// ```
    pub fn read<R>(&self, f: impl FnOnce(&LoadableState) -> R) -> R {
        self.inner.publisher.read(f)
    }

    /// Cancel any pending auto-hide and show the loading state
    pub fn show_loading(&self) -> Option<StateChange> {
        self.inner.apply(LoadableState::Loading, TimerPolicy::Cancel)
    }

    /// Show a success message and restart the auto-hide timer
    pub fn show_success(&self, message: impl fmt::Display) -> Option<StateChange> {
        self.inner
            .apply(LoadableState::success(message), TimerPolicy::Restart)
    }

    /// Show a failure and restart the auto-hide timer
    ///
    /// `on_retry` is offered to the renderer as the failure's retry control.
    pub fn show_failure(
        &self,
        error: impl Into<anyhow::Error>,
        on_retry: Option<Action>,
    ) -> Option<StateChange> {
        self.inner
            .apply(LoadableState::failure(error, on_retry), TimerPolicy::Restart)
    }

    /// Cancel any pending auto-hide and reset to [`LoadableState::None`]
    ///
    /// Idempotent: hiding an idle manager emits nothing.
    pub fn hide(&self) -> Option<StateChange> {
        self.inner.apply(LoadableState::None, TimerPolicy::Cancel)
    }

    /// Subscribe to state change events
    ///
    /// Returns a receiver that will get notified of all future state changes.
    /// A receiver more than [`CHANGE_CHANNEL_CAPACITY`] events behind skips ahead.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.inner.publisher.subscribe()
    }

    /// Register a synchronous observer, called on the mutating thread after every transition
    ///
    /// The observer stays attached until the returned [`Subscription`] is dropped.
    pub fn observe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.inner.publisher.observe(observer)
    }

    pub fn observer_count(&self) -> usize {
        self.inner.publisher.observer_count()
    }

    /// Whether an auto-hide timer is currently pending
    pub fn is_auto_hide_pending(&self) -> bool {
        self.inner
            .timer
            .read(|timer| timer.task.as_ref().is_some_and(|task| !task.is_finished()))
    }
}

impl Default for LoadingManager {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PartialEq for LoadingManager {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for LoadingManager {}

impl Hash for LoadingManager {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for LoadingManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingManager")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("settings", &self.inner.settings)
            .finish()
    }
}

/// Weak counterpart of [`LoadingManager`].
#[derive(Clone, Default)]
pub struct WeakLoadingManager {
    inner: Weak<ManagerInner>,
}

impl WeakLoadingManager {
    pub fn upgrade(&self) -> Option<LoadingManager> {
        self.inner.upgrade().map(|inner| LoadingManager { inner })
    }
}

impl fmt::Debug for WeakLoadingManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakLoadingManager")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Builder for [`LoadingManager`]; every field is optional.
#[derive(Default)]
pub struct LoadingManagerBuilder {
    id: Option<Uuid>,
    state: LoadableState,
    settings: LoadingManagerSettings,
    metrics: Option<Arc<Metrics>>,
    runtime: Option<Handle>,
}

impl LoadingManagerBuilder {
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn state(mut self, state: LoadableState) -> Self {
        self.state = state;
        self
    }

    pub fn settings(mut self, settings: LoadingManagerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Share a metrics instance instead of creating a private one
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Runtime to run auto-hide timers on when none is current
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> LoadingManager {
        let id = self.id.unwrap_or_else(Uuid::new_v4);
        let metrics = self.metrics.unwrap_or_default();
        let runtime = self.runtime.or_else(|| Handle::try_current().ok());

        tracing::debug!(
            "Created loading manager {} (auto-hide after {:?})",
            id,
            self.settings.auto_hide_delay
        );

        LoadingManager {
            inner: Arc::new(ManagerInner {
                id,
                settings: self.settings,
                publisher: StatePublisher::new(id, self.state, metrics),
                timer: Atomic::default(),
                runtime,
            }),
        }
    }
}
