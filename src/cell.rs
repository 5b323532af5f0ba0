//! Lock-free configuration cell.
//!
//! Configuration values (ROI, metric kind, selection filters) are written by
//! the control context and read by the producer and the worker while frames
//! are flowing. Each value is replaced as a whole with one atomic pointer swap,
//! so readers always see a complete value and never block a writer.

use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

/// Concurrently readable value replaced atomically on every write.
pub struct ConfigCell<T> {
    inner: ArcSwap<T>,
}

impl<T> ConfigCell<T> {
    /// Cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(value),
        }
    }

    /// Snapshot of the current value.
    #[inline]
    #[must_use]
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Replace the value (last writer wins).
    #[inline]
    pub fn store(&self, value: T) {
        self.inner.store(Arc::new(value));
    }

    /// Read-copy-update. `f` may run more than once under contention.
    pub fn update<F>(&self, mut f: F)
    where
        T: Clone,
        F: FnMut(&mut T),
    {
        self.inner.rcu(|current| {
            let mut next = T::clone(current);
            f(&mut next);
            next
        });
    }
}

impl<T: Copy> ConfigCell<T> {
    /// Copy of the current value.
    #[inline]
    #[must_use]
    pub fn get(&self) -> T {
        **self.inner.load()
    }
}

impl<T: Default> Default for ConfigCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for ConfigCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConfigCell").field(&*self.inner.load()).finish()
    }
}
