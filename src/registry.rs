//! Named-instance directory for stores.

use crate::error::Result;
use crate::store::{Store, StoreConfig};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Creates, looks up and destroys named stores.
///
/// Registries are ordinary values: construct one and pass it to whoever needs
/// it. Independent registries never share stores.
pub struct StoreRegistry {
    config: StoreConfig,
    stores: RwLock<HashMap<String, Arc<Store>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            stores: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Return the store named `name`, creating it on first reference.
    ///
    /// Lookup and insert happen under one write lock, so concurrent callers
    /// always receive the same instance.
    pub fn create_store(&self, name: &str) -> Result<Arc<Store>> {
        let mut stores = self.stores.write();
        if let Some(store) = stores.get(name) {
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(Store::new(name, &self.config)?);
        stores.insert(name.to_string(), Arc::clone(&store));
        debug!(store = name, "store created");
        Ok(store)
    }

    pub fn get_store(&self, name: &str) -> Option<Arc<Store>> {
        self.stores.read().get(name).cloned()
    }

    /// Forget the store named `name`. Returns whether it was registered.
    ///
    /// Handles obtained earlier stay valid; the store is dropped once the last
    /// one goes away.
    pub fn destroy_store(&self, name: &str) -> bool {
        let removed = self.stores.write().remove(name).is_some();
        if removed {
            debug!(store = name, "store destroyed");
        }
        removed
    }

    /// Names of all registered stores, sorted.
    pub fn store_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.stores.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.read().is_empty()
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_returns_same_instance() {
        let registry = StoreRegistry::new();
        let first = registry.create_store("orders").unwrap();
        let second = registry.create_store("orders").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_and_destroy() {
        let registry = StoreRegistry::new();
        assert!(registry.get_store("orders").is_none());

        let store = registry.create_store("orders").unwrap();
        store.put("o1", json!(1), "created");
        assert!(Arc::ptr_eq(&registry.get_store("orders").unwrap(), &store));

        assert!(registry.destroy_store("orders"));
        assert!(!registry.destroy_store("orders"));
        assert!(registry.get_store("orders").is_none());
        assert!(registry.is_empty());

        // Old handle keeps working.
        store.put("o2", json!(2), "created");
        assert_eq!(store.len(), 2);

        // A fresh store replaces it under the same name.
        let fresh = registry.create_store("orders").unwrap();
        assert!(!Arc::ptr_eq(&fresh, &store));
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_registries_are_independent() {
        let a = StoreRegistry::new();
        let b = StoreRegistry::new();
        let left = a.create_store("shared").unwrap();
        let right = b.create_store("shared").unwrap();
        assert!(!Arc::ptr_eq(&left, &right));
    }

    #[test]
    fn test_store_names_sorted() {
        let registry = StoreRegistry::with_config(StoreConfig {
            thread_name_prefix: "names".to_string(),
            ..Default::default()
        });
        registry.create_store("b").unwrap();
        registry.create_store("a").unwrap();
        assert_eq!(registry.store_names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.config().thread_name_prefix, "names");
    }
}
