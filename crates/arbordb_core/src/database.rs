//! The dynamic database service: JSON reads and writes over a flat store.

use crate::action::DatabaseAction;
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::flat::{self, FlatJsonObject};
use crate::path::{ancestor_keys, logical_key, parse_key, KeySegment, LogicalPath};
use crate::push_id::PushIdGenerator;
use crate::request::DatabaseRequest;
use crate::server_value;
use arbordb_storage::KeyValueStore;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// How a write combines with existing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the subtree at the path.
    Put,
    /// Merge the payload's leaves into the subtree.
    Update,
    /// Store the payload under a new push id below the path.
    Push,
}

impl WriteMode {
    /// The action a request must carry to perform this write.
    #[must_use]
    pub fn action(self) -> DatabaseAction {
        match self {
            Self::Put => DatabaseAction::Put,
            Self::Update => DatabaseAction::Update,
            Self::Push => DatabaseAction::Push,
        }
    }
}

/// Reads and writes JSON subtrees of realms stored in a [`KeyValueStore`].
///
/// Every realm lives in its own store domain. Writes are applied key by key;
/// a failure part way through leaves the earlier keys applied. Concurrent
/// writes to overlapping subtrees are last-writer-wins per flat key.
pub struct DynamicDatabaseService {
    store: Arc<dyn KeyValueStore>,
    push_ids: Arc<PushIdGenerator>,
    config: CoreConfig,
}

impl DynamicDatabaseService {
    /// Creates a service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, config: CoreConfig) -> Self {
        Self {
            store,
            push_ids: Arc::new(PushIdGenerator::new()),
            config,
        }
    }

    /// Replaces the push id generator.
    #[must_use]
    pub fn with_push_ids(mut self, push_ids: Arc<PushIdGenerator>) -> Self {
        self.push_ids = push_ids;
        self
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Returns the store domain of realm `database_id`.
    #[must_use]
    pub fn domain_path(&self, database_id: &str) -> String {
        self.config.domain_path(database_id)
    }

    /// Writes `payload` at the request's path.
    ///
    /// Returns the data written, or `{"name": <push id>}` for a push.
    ///
    /// A payload of the form `{".sv": name}` is replaced by the resolved
    /// server value, stored at the request path. Placeholders nested deeper
    /// in the payload are resolved in place.
    ///
    /// # Errors
    ///
    /// Fails if the request is not permitted, if the payload does not suit the
    /// mode, or if the store rejects a write.
    pub fn place_data(
        &self,
        request: &DatabaseRequest,
        payload: Value,
        mode: WriteMode,
    ) -> CoreResult<Value> {
        request.ensure_permitted()?;
        if request.action() != mode.action() {
            return Err(CoreError::invalid_request(format!(
                "{} request cannot perform a {mode:?} write",
                request.action()
            )));
        }

        let mut path = request.path().clone();
        let push_id = (mode == WriteMode::Push).then(|| self.push_ids.generate());
        if let Some(id) = &push_id {
            path.push(id.clone());
        }
        let clear_target = path.clone();

        let payload = match server_value::as_server_value(&payload) {
            Some(resolved) => {
                let last = path
                    .pop()
                    .ok_or_else(|| CoreError::invalid_request("server value at realm root"))?;
                let mut wrapped = Map::new();
                wrapped.insert(last, resolved);
                Value::Object(wrapped)
            }
            None => server_value::resolve_nested(payload),
        };
        if mode == WriteMode::Update && !payload.is_object() {
            return Err(CoreError::invalid_payload("update payload must be an object"));
        }

        let domain = self.domain_path(request.database_id());
        let existing = self.store.keys(&domain)?;
        let cleared = (mode == WriteMode::Put).then(|| clear_target.selector());

        let mut doomed: HashSet<&str> = HashSet::new();
        let mut array_levels: HashSet<String> = HashSet::new();
        let mut survivors: Vec<(&str, String)> = Vec::with_capacity(existing.len());
        for key in &existing {
            let segments = parse_key(key)?;
            let is_cleared = cleared.as_ref().is_some_and(|selector| selector.covers(key));
            // A cleared key still reveals the arrays the target path runs through.
            let depth = if is_cleared { clear_target.len() } else { segments.len() };
            for (level, segment) in segments.iter().enumerate().take(depth) {
                if matches!(segment, KeySegment::Index(_)) {
                    array_levels.insert(logical_key(&segments[..level]));
                }
            }
            if is_cleared {
                doomed.insert(key);
            } else {
                survivors.push((key.as_str(), logical_key(&segments)));
            }
        }

        let pairs = FlatJsonObject::new(&payload, &path).align_slots(&array_levels)?;
        let targets = pairs
            .iter()
            .map(|(key, _)| parse_key(key).map(|segments| logical_key(&segments)))
            .collect::<CoreResult<HashSet<String>>>()?;
        let above: HashSet<&str> = targets.iter().flat_map(|key| ancestor_keys(key)).collect();
        for (key, logical) in survivors {
            // Leaves above a written key would shadow it, and so would
            // containers below a written leaf or the same position under
            // the other encoding.
            let shadowed = above.contains(logical.as_str())
                || targets.contains(&logical)
                || ancestor_keys(&logical).any(|a| targets.contains(a));
            if shadowed {
                doomed.insert(key);
            }
        }

        let mut deleted = 0usize;
        for key in doomed.iter().filter(|k| !pairs.contains_key(k)) {
            if self.store.delete(&domain, key)? {
                deleted += 1;
            }
        }
        let written = pairs.len();
        for (key, leaf) in pairs.iter() {
            self.store.set(&domain, key, leaf)?;
        }
        debug!(
            realm = request.database_id(),
            path = %request.path(),
            ?mode,
            written,
            deleted,
            "placed data"
        );

        Ok(match push_id {
            Some(id) => json!({ "name": id }),
            None => payload,
        })
    }

    /// Deletes the subtree at the request's path. Returns the number of flat
    /// keys removed.
    ///
    /// # Errors
    ///
    /// Fails if the request is not permitted or the store rejects a delete.
    pub fn delete_data(&self, request: &DatabaseRequest) -> CoreResult<usize> {
        request.ensure_permitted()?;
        let domain = self.domain_path(request.database_id());
        let selector = request.path().selector();

        let mut deleted = 0usize;
        for key in self.store.keys(&domain)? {
            if selector.covers(&key) && self.store.delete(&domain, &key)? {
                deleted += 1;
            }
        }
        debug!(
            realm = request.database_id(),
            path = %request.path(),
            deleted,
            "deleted data"
        );
        Ok(deleted)
    }

    /// Reads the subtree at the request's path.
    ///
    /// Returns `None` when the realm holds no data or nothing is stored at the
    /// path. With `shallow`, nested containers are collapsed to booleans.
    ///
    /// # Errors
    ///
    /// Fails if the request is not permitted, the store cannot be read, or a
    /// stored entry is corrupt.
    pub fn get_data(&self, request: &DatabaseRequest, shallow: bool) -> CoreResult<Option<Value>> {
        request.ensure_permitted()?;
        let domain = self.domain_path(request.database_id());
        if !self.store.exists(&domain)? {
            debug!(realm = request.database_id(), "realm has no data");
            return Ok(None);
        }

        let selector = request.path().selector();
        let mut pairs = Vec::new();
        for key in self.store.keys(&domain)? {
            if !selector.covers(&key) {
                continue;
            }
            // A key deleted since listing is skipped.
            if let Some(value) = self.store.get(&domain, &key)? {
                pairs.push((key, value));
            }
        }
        debug!(
            realm = request.database_id(),
            path = %request.path(),
            keys = pairs.len(),
            shallow,
            "read data"
        );

        let Some(tree) = FlatJsonObject::from_pairs(pairs).unflatten()? else {
            return Ok(None);
        };
        Ok(flat::select(&tree, request.path()).map(|value| {
            if shallow {
                flat::shallow(value)
            } else {
                value.clone()
            }
        }))
    }

    /// Reads a whole realm without authorization. Used by maintenance tools.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be read or an entry is corrupt.
    pub fn export_realm(&self, database_id: &str) -> CoreResult<Option<Value>> {
        let request =
            DatabaseRequest::trusted(database_id, LogicalPath::root(), DatabaseAction::Retrieve)?;
        self.get_data(&request, false)
    }
}

impl std::fmt::Debug for DynamicDatabaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicDatabaseService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbordb_storage::InMemoryStore;

    fn service() -> (Arc<InMemoryStore>, DynamicDatabaseService) {
        let store = Arc::new(InMemoryStore::new());
        let service = DynamicDatabaseService::new(store.clone(), CoreConfig::default())
            .with_push_ids(Arc::new(PushIdGenerator::with_seed(9)));
        (store, service)
    }

    fn req(path: &str, action: DatabaseAction) -> DatabaseRequest {
        DatabaseRequest::trusted("app", LogicalPath::parse(path), action).unwrap()
    }

    fn put(service: &DynamicDatabaseService, path: &str, payload: Value) -> Value {
        service
            .place_data(&req(path, DatabaseAction::Put), payload, WriteMode::Put)
            .unwrap()
    }

    fn get(service: &DynamicDatabaseService, path: &str) -> Option<Value> {
        service
            .get_data(&req(path, DatabaseAction::Retrieve), false)
            .unwrap()
    }

    #[test]
    fn put_then_get() {
        let (store, service) = service();
        let written = put(&service, "users/ada", json!({"name": "Ada", "langs": ["en"]}));
        assert_eq!(written, json!({"name": "Ada", "langs": ["en"]}));
        assert_eq!(store.get("arbor:app", "/users/ada/langs[0]").unwrap().as_deref(), Some("\"en\""));
        assert_eq!(get(&service, "users/ada/langs"), Some(json!(["en"])));
        assert_eq!(get(&service, "users/ada/langs/0"), Some(json!("en")));
    }

    #[test]
    fn put_replaces_subtree_only() {
        let (_, service) = service();
        put(&service, "", json!({"a": {"x": 1, "y": 2}, "ab": 3}));
        put(&service, "a", json!({"z": 9}));
        assert_eq!(get(&service, ""), Some(json!({"a": {"z": 9}, "ab": 3})));
    }

    #[test]
    fn update_merges() {
        let (_, service) = service();
        put(&service, "cfg", json!({"a": 1, "b": 2}));
        service
            .place_data(&req("cfg", DatabaseAction::Update), json!({"b": 3, "c": 4}), WriteMode::Update)
            .unwrap();
        assert_eq!(get(&service, "cfg"), Some(json!({"a": 1, "b": 3, "c": 4})));
    }

    #[test]
    fn update_rejects_non_objects() {
        let (_, service) = service();
        let err = service
            .place_data(&req("cfg", DatabaseAction::Update), json!([1]), WriteMode::Update)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidPayload { .. }));
    }

    #[test]
    fn mode_must_match_action() {
        let (_, service) = service();
        let err = service
            .place_data(&req("x", DatabaseAction::Retrieve), json!(1), WriteMode::Put)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRequest { .. }));
    }

    #[test]
    fn container_replaces_scalar_and_back() {
        let (_, service) = service();
        put(&service, "n", json!(5));
        put(&service, "n/inner", json!(true));
        assert_eq!(get(&service, "n"), Some(json!({"inner": true})));

        service
            .place_data(&req("", DatabaseAction::Update), json!({"n": 7}), WriteMode::Update)
            .unwrap();
        assert_eq!(get(&service, "n"), Some(json!(7)));
    }

    #[test]
    fn put_into_array_slot_keeps_array() {
        let (store, service) = service();
        put(&service, "list", json!([10, 20, 30]));
        put(&service, "list/1", json!(99));
        assert_eq!(get(&service, "list"), Some(json!([10, 99, 30])));
        assert_eq!(store.get("arbor:app", "/list[1]").unwrap().as_deref(), Some("99"));
        assert_eq!(store.get("arbor:app", "/list/1").unwrap(), None);

        put(&service, "list/2/note", json!("x"));
        assert_eq!(get(&service, "list"), Some(json!([10, 99, {"note": "x"}])));
    }

    #[test]
    fn put_into_only_slot_keeps_array() {
        let (_, service) = service();
        put(&service, "list", json!([10]));
        put(&service, "list/0", json!(5));
        assert_eq!(get(&service, "list"), Some(json!([5])));
    }

    #[test]
    fn update_into_array_merges_slots() {
        let (_, service) = service();
        put(&service, "list", json!([10, 20, 30]));
        service
            .place_data(&req("list", DatabaseAction::Update), json!({"2": 77, "3": 1}), WriteMode::Update)
            .unwrap();
        assert_eq!(get(&service, "list"), Some(json!([10, 20, 77, 1])));
    }

    #[test]
    fn field_encoded_slot_is_replaced() {
        let (store, service) = service();
        put(&service, "list", json!([10, 20, 30]));
        store.set("arbor:app", "/list/2", "5").unwrap();
        service
            .place_data(&req("list", DatabaseAction::Update), json!({"2": 77}), WriteMode::Update)
            .unwrap();
        assert_eq!(store.get("arbor:app", "/list/2").unwrap(), None);
        assert_eq!(get(&service, "list"), Some(json!([10, 20, 77])));
    }

    #[test]
    fn put_replacing_array_with_object() {
        let (_, service) = service();
        put(&service, "list", json!([10, 20]));
        put(&service, "list", json!({"0": "a", "k": "b"}));
        assert_eq!(get(&service, "list"), Some(json!({"0": "a", "k": "b"})));
    }

    #[test]
    fn push_appends_under_generated_id() {
        let (_, service) = service();
        let first = service
            .place_data(&req("msgs", DatabaseAction::Push), json!({"t": "hi"}), WriteMode::Push)
            .unwrap();
        let second = service
            .place_data(&req("msgs", DatabaseAction::Push), json!({"t": "yo"}), WriteMode::Push)
            .unwrap();
        let a = first["name"].as_str().unwrap().to_string();
        let b = second["name"].as_str().unwrap().to_string();
        assert!(a < b);

        let msgs = get(&service, "msgs").unwrap();
        assert_eq!(msgs[&a], json!({"t": "hi"}));
        assert_eq!(msgs[&b], json!({"t": "yo"}));
    }

    #[test]
    fn server_timestamp_lands_on_target() {
        let (_, service) = service();
        put(&service, "post", json!({"title": "t", "at": 0}));
        let written = put(&service, "post/at", json!({".sv": "timestamp"}));
        assert!(written["at"].is_u64());

        let post = get(&service, "post").unwrap();
        assert!(post["at"].as_u64().unwrap() > 1_600_000_000);
        assert_eq!(post["title"], "t");
    }

    #[test]
    fn server_value_at_root_is_rejected() {
        let (_, service) = service();
        let err = service
            .place_data(&req("", DatabaseAction::Put), json!({".sv": "timestamp"}), WriteMode::Put)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRequest { .. }));
    }

    #[test]
    fn pushed_server_value_resolves_at_new_child() {
        let (_, service) = service();
        let result = service
            .place_data(
                &req("log", DatabaseAction::Push),
                json!({".sv": "timestamp"}),
                WriteMode::Push,
            )
            .unwrap();
        let id = result["name"].as_str().unwrap();
        assert!(get(&service, &format!("log/{id}")).unwrap().is_u64());
    }

    #[test]
    fn delete_is_subtree_wide() {
        let (store, service) = service();
        put(&service, "", json!({"a": {"b": 1, "c": [1, 2]}, "ab": 2}));
        let removed = service.delete_data(&req("a", DatabaseAction::Delete)).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(get(&service, "a/b"), None);
        assert_eq!(get(&service, ""), Some(json!({"ab": 2})));

        service.delete_data(&req("ab", DatabaseAction::Delete)).unwrap();
        assert!(!store.exists("arbor:app").unwrap());
        assert_eq!(get(&service, ""), None);
    }

    #[test]
    fn delete_array_element() {
        let (_, service) = service();
        put(&service, "list", json!([10, 20, 30]));
        service.delete_data(&req("list/1", DatabaseAction::Delete)).unwrap();
        assert_eq!(get(&service, "list"), Some(json!([10, null, 30])));
    }

    #[test]
    fn shallow_read() {
        let (_, service) = service();
        put(&service, "", json!({"x": {"y": 1}, "z": 2}));
        let shallow = service
            .get_data(&req("", DatabaseAction::Retrieve), true)
            .unwrap();
        assert_eq!(shallow, Some(json!({"x": true, "z": 2})));
    }

    #[test]
    fn absent_realm_is_none() {
        let (_, service) = service();
        assert_eq!(get(&service, ""), None);
        assert_eq!(service.export_realm("app").unwrap(), None);
    }

    #[test]
    fn denied_request_does_not_touch_store() {
        let (store, service) = service();
        let request = DatabaseRequest::parse("app", "a.json", DatabaseAction::Put, None);
        let err = service.place_data(&request, json!(1), WriteMode::Put).unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));
        assert!(!store.exists("arbor:app").unwrap());
    }
}
