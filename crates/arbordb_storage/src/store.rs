//! Key-value store trait definition.

use crate::error::StorageResult;

/// A flat, domain-partitioned key-value store.
///
/// Each domain is an independent hash of `key → value` strings. Stores are
/// **opaque string stores**: they do not interpret keys or values. ArborDB
/// owns the flat key encoding.
///
/// # Invariants
///
/// - `get` returns exactly the value last passed to `set` for that key
/// - a domain exists while it holds at least one key; deleting the last key
///   removes the domain
/// - `keys` is finite and restartable: every call returns a fresh snapshot
/// - Stores must be `Send + Sync`, every method takes `&self`
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing and ephemeral realms
/// - [`super::FileStore`] - Journal-backed persistent storage
pub trait KeyValueStore: Send + Sync {
    /// Returns true if the domain holds at least one key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn exists(&self, domain: &str) -> StorageResult<bool>;

    /// Returns the value stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn get(&self, domain: &str, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`.
    ///
    /// Returns true if the key was newly created, false if an existing value
    /// was overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be applied.
    fn set(&self, domain: &str, key: &str, value: &str) -> StorageResult<bool>;

    /// Removes `key` from the domain.
    ///
    /// Returns true if the key existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete cannot be applied.
    fn delete(&self, domain: &str, key: &str) -> StorageResult<bool>;

    /// Returns every key of the domain, in no particular order.
    ///
    /// An absent domain yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn keys(&self, domain: &str) -> StorageResult<Vec<String>>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    fn exists(&self, domain: &str) -> StorageResult<bool> {
        (**self).exists(domain)
    }

    fn get(&self, domain: &str, key: &str) -> StorageResult<Option<String>> {
        (**self).get(domain, key)
    }

    fn set(&self, domain: &str, key: &str, value: &str) -> StorageResult<bool> {
        (**self).set(domain, key, value)
    }

    fn delete(&self, domain: &str, key: &str) -> StorageResult<bool> {
        (**self).delete(domain, key)
    }

    fn keys(&self, domain: &str) -> StorageResult<Vec<String>> {
        (**self).keys(domain)
    }
}
