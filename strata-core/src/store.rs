//! Dataset store
//!
//! The store maintains the catalog of completed datasets, keyed by id and
//! by name. Provides thread-safe concurrent access for multi-threaded
//! environments.

use crate::dataset::{Dataset, DatasetId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors that can occur in the dataset store
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("Dataset not found: {0}")]
    NotFound(String),

    #[error("Dataset already exists: {0}")]
    AlreadyExists(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Store for completed datasets with thread-safe concurrent access.
/// This type uses blocking locks and is intended for synchronous
/// sections; do not hold `register`/`update`/`list` across await points.
#[derive(Clone)]
pub struct DatasetStore {
    inner: Arc<RwLock<StoreInner>>,
}

struct StoreInner {
    by_id: HashMap<DatasetId, Dataset>,
    by_name: HashMap<String, DatasetId>,
}

impl DatasetStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                by_id: HashMap::new(),
                by_name: HashMap::new(),
            })),
        }
    }

    /// Register a new dataset
    pub fn register(&self, dataset: Dataset) -> Result<(), StoreError> {
        let mut inner = self.write()?;

        if inner.by_id.contains_key(&dataset.id) {
            return Err(StoreError::AlreadyExists(dataset.id.to_string()));
        }

        inner.by_name.insert(dataset.name.clone(), dataset.id);
        inner.by_id.insert(dataset.id, dataset);

        Ok(())
    }

    /// Update an existing dataset in place
    pub fn update(&self, dataset: Dataset) -> Result<(), StoreError> {
        let mut inner = self.write()?;

        let old = inner
            .by_id
            .get(&dataset.id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(dataset.id.to_string()))?;

        if old.name != dataset.name {
            inner.by_name.remove(&old.name);
            inner.by_name.insert(dataset.name.clone(), dataset.id);
        }

        inner.by_id.insert(dataset.id, dataset);

        Ok(())
    }

    /// Get a dataset by ID (returns a clone for thread-safety)
    pub fn get(&self, id: &DatasetId) -> Option<Dataset> {
        let inner = self.read().ok()?;
        inner.by_id.get(id).cloned()
    }

    /// Get a dataset by name (returns a clone for thread-safety)
    pub fn get_by_name(&self, name: &str) -> Option<Dataset> {
        let inner = self.read().ok()?;
        inner
            .by_name
            .get(name)
            .and_then(|id| inner.by_id.get(id).cloned())
    }

    /// List all datasets (returns clones for thread-safety)
    pub fn list(&self) -> Vec<Dataset> {
        let inner = self.read().ok();
        inner
            .map(|i| i.by_id.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Count registered datasets
    pub fn count(&self) -> usize {
        let inner = self.read().ok();
        inner.map(|i| i.by_id.len()).unwrap_or(0)
    }

    /// Check if a dataset exists by ID
    pub fn contains(&self, id: &DatasetId) -> bool {
        let inner = self.read().ok();
        inner.map(|i| i.by_id.contains_key(id)).unwrap_or(false)
    }

    /// Remove a dataset from the store
    pub fn remove(&self, id: &DatasetId) -> Option<Dataset> {
        let mut inner = self.write().ok()?;

        if let Some(dataset) = inner.by_id.remove(id) {
            // Only drop the name index entry if it still points at this
            // dataset; a later registration may have taken the name over.
            if inner.by_name.get(&dataset.name) == Some(id) {
                inner.by_name.remove(&dataset.name);
            }
            Some(dataset)
        } else {
            None
        }
    }

    /// Clear all datasets from the store
    pub fn clear(&self) {
        if let Ok(mut inner) = self.write() {
            inner.by_id.clear();
            inner.by_name.clear();
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, StoreInner>, StoreError> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, StoreInner>, StoreError> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for DatasetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;

    fn dataset(name: &str) -> Dataset {
        Dataset::builder(name).build()
    }

    #[test]
    fn test_store_creation() {
        let store = DatasetStore::new();
        assert_eq!(store.count(), 0);
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_register_and_get() {
        let store = DatasetStore::new();
        let ds = dataset("orders");
        let id = ds.id;

        store.register(ds).unwrap();
        assert!(store.get(&id).is_some());
        assert!(store.get_by_name("orders").is_some());
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let store = DatasetStore::new();
        let ds = dataset("orders");
        let dup = ds.clone();

        store.register(ds).unwrap();
        assert!(matches!(
            store.register(dup),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_update() {
        let store = DatasetStore::new();
        let mut ds = dataset("orders");
        let id = ds.id;
        store.register(ds.clone()).unwrap();

        ds.metadata.tags.push("transformed".to_string());
        store.update(ds).unwrap();

        let stored = store.get(&id).unwrap();
        assert!(stored.metadata.tags.contains(&"transformed".to_string()));
    }

    #[test]
    fn test_update_missing_dataset() {
        let store = DatasetStore::new();
        let result = store.update(dataset("ghost"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_remove() {
        let store = DatasetStore::new();
        let ds = dataset("orders");
        let id = ds.id;
        store.register(ds).unwrap();

        assert!(store.remove(&id).is_some());
        assert_eq!(store.count(), 0);
        assert!(!store.contains(&id));
        assert!(store.get_by_name("orders").is_none());
    }

    #[test]
    fn test_remove_missing() {
        let store = DatasetStore::new();
        assert!(store.remove(&DatasetId::new()).is_none());
    }

    #[test]
    fn test_concurrent_registration() {
        use std::thread;

        let store = DatasetStore::new();
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    store.register(dataset(&format!("ds_{}", i))).unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.count(), 10);
    }
}
