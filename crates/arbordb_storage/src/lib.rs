//! # ArborDB Storage
//!
//! Key-value store contract and backends for ArborDB.
//!
//! This crate provides the lowest-level storage abstraction. Stores are
//! **opaque string hashes** partitioned by domain - they do not interpret the
//! flat keys or leaf values they hold.
//!
//! ## Design Principles
//!
//! - One domain per database realm, one hash per domain
//! - No knowledge of JSON trees, paths, or security rules
//! - Must be `Send + Sync` for concurrent access
//! - ArborDB owns the flat key encoding
//!
//! ## Available Backends
//!
//! - [`InMemoryStore`] - For testing and ephemeral realms
//! - [`FileStore`] - Journal-backed persistent storage
//!
//! ## Example
//!
//! ```rust
//! use arbordb_storage::{KeyValueStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! store.set("arbor:app", "/greeting", "\"hello\"").unwrap();
//! assert_eq!(store.keys("arbor:app").unwrap(), vec!["/greeting".to_string()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod error;
mod file;
mod journal;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use journal::{compute_crc32, JournalRecord, JOURNAL_MAGIC, JOURNAL_VERSION};
pub use memory::InMemoryStore;
pub use store::KeyValueStore;
