//! In-memory key-value store for testing.

use crate::error::StorageResult;
use crate::store::KeyValueStore;
use parking_lot::RwLock;
use std::collections::HashMap;

type Domains = HashMap<String, HashMap<String, String>>;

/// An in-memory key-value store.
///
/// This store keeps every domain in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral realms that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use arbordb_storage::{KeyValueStore, InMemoryStore};
///
/// let store = InMemoryStore::new();
/// assert!(store.set("realm", "/a", "1").unwrap());
/// assert_eq!(store.get("realm", "/a").unwrap().as_deref(), Some("1"));
/// assert!(store.exists("realm").unwrap());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    domains: RwLock<Domains>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with pre-existing domains.
    ///
    /// Empty domains are dropped, matching the existence rule of the trait.
    #[must_use]
    pub fn with_domains(mut domains: Domains) -> Self {
        domains.retain(|_, keys| !keys.is_empty());
        Self {
            domains: RwLock::new(domains),
        }
    }

    /// Returns a copy of every domain.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn snapshot(&self) -> Domains {
        self.domains.read().clone()
    }

    /// Returns the number of keys held in `domain`.
    #[must_use]
    pub fn len(&self, domain: &str) -> usize {
        self.domains.read().get(domain).map_or(0, HashMap::len)
    }

    /// Removes every domain.
    pub fn clear(&self) {
        self.domains.write().clear();
    }
}

impl KeyValueStore for InMemoryStore {
    fn exists(&self, domain: &str) -> StorageResult<bool> {
        Ok(self.domains.read().contains_key(domain))
    }

    fn get(&self, domain: &str, key: &str) -> StorageResult<Option<String>> {
        Ok(self
            .domains
            .read()
            .get(domain)
            .and_then(|keys| keys.get(key))
            .cloned())
    }

    fn set(&self, domain: &str, key: &str, value: &str) -> StorageResult<bool> {
        let mut domains = self.domains.write();
        let previous = domains
            .entry(domain.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(previous.is_none())
    }

    fn delete(&self, domain: &str, key: &str) -> StorageResult<bool> {
        let mut domains = self.domains.write();
        let Some(keys) = domains.get_mut(domain) else {
            return Ok(false);
        };
        let removed = keys.remove(key).is_some();
        if keys.is_empty() {
            domains.remove(domain);
        }
        Ok(removed)
    }

    fn keys(&self, domain: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .domains
            .read()
            .get(domain)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default())
    }
}
