use std::sync::Arc;

use super::{StoreError, TableStore};

/// In-memory value mirrored to a [`TableStore`].
///
/// Every mutation goes through [`Mirrored::transact`], which applies the change
/// to a copy, saves the copy and only then swaps it in. A failed save leaves the
/// in-memory value untouched, so memory and store never diverge.
pub struct Mirrored<T> {
    store: Arc<dyn TableStore<T>>,
    value: T,
}

impl<T: Clone> Mirrored<T> {
    /// Load the current value from `store`.
    pub fn open(store: Arc<dyn TableStore<T>>) -> Result<Self, StoreError> {
        let value = store.load()?;
        Ok(Self { store, value })
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn location(&self) -> String {
        self.store.location()
    }

    /// Discard the in-memory value and re-read the store.
    pub fn load(&mut self) -> Result<(), StoreError> {
        self.value = self.store.load()?;
        Ok(())
    }

    /// Persist the in-memory value as is.
    pub fn save(&self) -> Result<(), StoreError> {
        self.store.save(&self.value)
    }

    /// Apply `f` and persist the result before returning.
    pub fn transact<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> Result<R, StoreError> {
        let mut next = self.value.clone();
        let out = f(&mut next);
        self.store.save(&next)?;
        self.value = next;
        Ok(out)
    }
}
