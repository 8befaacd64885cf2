//! Copy-on-write snapshot wrapper for hot re-registration.

use std::sync::{Arc, RwLock};

use crate::registry::tiered::TieredRegistry;

/// A [`TieredRegistry`] that can be re-registered while readers are active.
///
/// Readers take an `Arc` snapshot and never observe a partial update. Writers
/// serialize on an exclusive lock, mutate a private clone and swap it in only
/// when the mutation succeeds.
pub struct SharedRegistry<T> {
    current: RwLock<Arc<TieredRegistry<T>>>,
}

impl<T: Clone> SharedRegistry<T> {
    pub fn new(initial: TieredRegistry<T>) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<TieredRegistry<T>> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Apply `f` to a clone of the current registry and publish it on success.
    ///
    /// On error the published snapshot stays unchanged.
    pub fn update<R, E>(
        &self,
        f: impl FnOnce(&mut TieredRegistry<T>) -> Result<R, E>,
    ) -> Result<R, E> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let mut next = TieredRegistry::clone(&guard);
        let out = f(&mut next)?;
        *guard = Arc::new(next);
        Ok(out)
    }
}

impl<T: Clone> Default for SharedRegistry<T> {
    fn default() -> Self {
        Self::new(TieredRegistry::new())
    }
}
