//! Test fixtures and realm helpers.
//!
//! Provides a fully wired service (store, state, processor, database) for
//! tests that exercise the request path end to end.

use arbordb_core::{
    AccessKey, CoreConfig, DatabaseAction, DatabaseRequest, DynamicDatabaseService, LogicalPath,
    RequestProcessor, ServiceState,
};
use arbordb_storage::{FileStore, InMemoryStore};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Realm used by [`TestRealm`].
pub const TEST_REALM: &str = "app";

/// Administrative key registered by [`TestRealm::new`].
pub const ADMIN_KEY: &str = "admin-key";

/// A wired service over an in-memory store.
pub struct TestRealm {
    /// The backing store.
    pub store: Arc<InMemoryStore>,
    /// Keys and rules.
    pub state: Arc<ServiceState>,
    /// Authorizer over `state`.
    pub processor: RequestProcessor,
    /// Database service over `store`.
    pub service: DynamicDatabaseService,
}

impl TestRealm {
    /// Creates a service with one admin key allowed into [`TEST_REALM`].
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = Arc::new(ServiceState::new());
        state.ensure_key(AccessKey::new(ADMIN_KEY, [TEST_REALM]).with_admin(true));
        Self {
            processor: RequestProcessor::new(Arc::clone(&state)),
            service: DynamicDatabaseService::new(store.clone(), CoreConfig::default()),
            store,
            state,
        }
    }

    /// Registers a non-admin key allowed into `realms`.
    pub fn add_key(&self, key: &str, realms: &[&str]) -> &Self {
        self.state
            .create_key(AccessKey::new(key, realms.iter().copied()))
            .expect("Failed to create key");
        self
    }

    /// Parses and authorizes a request in [`TEST_REALM`] for `path`.
    pub fn request(&self, path: &str, action: DatabaseAction, token: Option<&str>) -> DatabaseRequest {
        self.processor.process(
            TEST_REALM,
            &format!("{path}.json"),
            action,
            token.map(str::to_string),
        )
    }

    /// Builds a pre-authorized request in [`TEST_REALM`].
    pub fn trusted(&self, path: &str, action: DatabaseAction) -> DatabaseRequest {
        DatabaseRequest::trusted(TEST_REALM, LogicalPath::parse(path), action)
            .expect("Invalid test realm")
    }

    /// Reads `path` with full privileges.
    pub fn read(&self, path: &str) -> Option<Value> {
        self.service
            .get_data(&self.trusted(path, DatabaseAction::Retrieve), false)
            .expect("Failed to read")
    }
}

impl Default for TestRealm {
    fn default() -> Self {
        Self::new()
    }
}

/// A file store in a temporary directory.
pub struct TestFileStore {
    /// The store.
    pub store: FileStore,
    dir: TempDir,
}

impl TestFileStore {
    /// Opens a fresh journal.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store =
            FileStore::open(&dir.path().join("data.journal"), false).expect("Failed to open store");
        Self { store, dir }
    }

    /// Returns the journal path.
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("data.journal")
    }

    /// Closes and reopens the journal, replaying it.
    pub fn reopen(self) -> Self {
        let Self { store, dir } = self;
        drop(store);
        let store =
            FileStore::open(&dir.path().join("data.journal"), false).expect("Failed to reopen store");
        Self { store, dir }
    }
}

impl Default for TestFileStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a fresh [`TestRealm`].
pub fn with_realm<F, R>(f: F) -> R
where
    F: FnOnce(&TestRealm) -> R,
{
    let realm = TestRealm::new();
    f(&realm)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A small chat document with nested objects and arrays.
    pub fn chat_document() -> Value {
        json!({
            "rooms": {
                "general": {"title": "General", "members": ["ada", "alan"]},
                "random": {"title": "Random", "members": ["grace"]}
            },
            "motd": "hello",
            "limits": {"max_len": 280, "ratio": 0.5, "open": true, "owner": null}
        })
    }

    /// A realm with [`chat_document`] stored at the root.
    pub fn populated_realm() -> TestRealm {
        let realm = TestRealm::new();
        realm
            .service
            .place_data(
                &realm.trusted("", DatabaseAction::Put),
                chat_document(),
                arbordb_core::WriteMode::Put,
            )
            .expect("Failed to populate realm");
        realm
    }
}
