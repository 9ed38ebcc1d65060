//! In-memory TableStore for development and testing

use std::sync::RwLock;

use cmdreg_core::store::{StoreError, TableStore};

pub struct InMemoryTableStore<T> {
    value: RwLock<Option<T>>,
    label: String,
}

impl<T> InMemoryTableStore<T> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(None),
            label: label.into(),
        }
    }
}

impl<T> Default for InMemoryTableStore<T> {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl<T> TableStore<T> for InMemoryTableStore<T>
where
    T: Clone + Default + Send + Sync,
{
    fn load(&self) -> Result<T, StoreError> {
        let guard = self
            .value
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(guard.clone().unwrap_or_default())
    }

    fn save(&self, value: &T) -> Result<(), StoreError> {
        let mut guard = self
            .value
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        *guard = Some(value.clone());
        Ok(())
    }

    fn location(&self) -> String {
        format!("memory:{}", self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store_defaults_until_saved() {
        let store: InMemoryTableStore<Vec<u8>> = InMemoryTableStore::new("t");
        assert!(store.load().unwrap().is_empty());
        store.save(&vec![1, 2]).unwrap();
        assert_eq!(store.load().unwrap(), vec![1, 2]);
        assert_eq!(store.location(), "memory:t");
    }
}
