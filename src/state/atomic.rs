// Lock-guarded value cell
//
// Every piece of shared mutable state in this crate (manager state, timer handle, observer
// lists, aggregator subscriptions) lives in an Atomic<T>. A panic while a lock is held must not
// wedge the UI-facing state, so poisoned locks are recovered rather than propagated.

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A value guarded by a read-write lock, with closure-based access.
///
/// # Example
/// ```ignore
/// let counter = Atomic::new(0);
/// counter.mutate(|n| *n += 1);
/// assert_eq!(counter.get(), 1);
/// ```
#[derive(Default)]
pub struct Atomic<T> {
    value: RwLock<T>,
}

impl<T> Atomic<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Clone the current value out of the cell.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.read_guard().clone()
    }

    pub fn set(&self, value: T) {
        *self.write_guard() = value;
    }

    /// Store `value` and return the previous one.
    pub fn replace(&self, value: T) -> T {
        std::mem::replace(&mut *self.write_guard(), value)
    }

    /// Run `f` with shared access to the value.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.read_guard())
    }

    /// Run `f` with exclusive access to the value; the whole closure is one critical section.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.write_guard())
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, T> {
        self.value.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, T> {
        self.value.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: fmt::Debug> fmt::Debug for Atomic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.read(|value| f.debug_tuple("Atomic").field(value).finish())
    }
}
