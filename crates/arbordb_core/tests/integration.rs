//! End-to-end tests: requests flow through the processor into the database
//! service and a real store.

use arbordb_core::{
    AccessKey, ActionSet, CoreConfig, CoreError, DatabaseAction, DynamicDatabaseService,
    KeyValueStore, LogicalPath, PermissionState, RuleScope, SecurityRule, ServiceState, WriteMode,
};
use arbordb_testkit::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn realm_rule(realm: &TestRealm, wildcard: &str, actions: &str, allow: bool, priority: i32) {
    let rule =
        SecurityRule::from_wildcard(wildcard, ActionSet::parse(actions).unwrap(), allow, priority)
            .unwrap();
    realm
        .state
        .add_rule(&RuleScope::Realm(TEST_REALM.into()), rule)
        .unwrap();
}

#[test]
fn rules_gate_reads_and_writes() {
    let realm = TestRealm::new();
    realm.add_key("reader", &[TEST_REALM]);
    realm_rule(&realm, "*", "Retrieve", true, 0);

    let write = realm.request("notes/1", DatabaseAction::Put, Some("reader"));
    assert_eq!(write.permission(), PermissionState::Denied);
    let err = realm
        .service
        .place_data(&write, json!("x"), WriteMode::Put)
        .unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized { .. }));
    assert_eq!(realm.read(""), None);

    let admin = realm.request("notes/1", DatabaseAction::Put, Some(ADMIN_KEY));
    realm
        .service
        .place_data(&admin, json!("x"), WriteMode::Put)
        .unwrap();

    let read = realm.request("notes", DatabaseAction::Retrieve, Some("reader"));
    assert_eq!(
        realm.service.get_data(&read, false).unwrap(),
        Some(json!({"1": "x"}))
    );
}

#[test]
fn rule_precedence_by_priority_then_recency() {
    let realm = TestRealm::new();
    realm.add_key("user", &[TEST_REALM]);
    realm_rule(&realm, "/secret/*", "All", false, 10);
    realm_rule(&realm, "*", "All", true, 0);

    let denied = realm.request("secret/plans", DatabaseAction::Retrieve, Some("user"));
    assert_eq!(denied.permission(), PermissionState::Denied);
    let allowed = realm.request("public/plans", DatabaseAction::Retrieve, Some("user"));
    assert_eq!(allowed.permission(), PermissionState::Granted);

    realm_rule(&realm, "/secret/*", "Retrieve", true, 10);
    let now_allowed = realm.request("secret/plans", DatabaseAction::Retrieve, Some("user"));
    assert_eq!(now_allowed.permission(), PermissionState::Granted);
    let still_denied = realm.request("secret/plans", DatabaseAction::Delete, Some("user"));
    assert_eq!(still_denied.permission(), PermissionState::Denied);
}

#[test]
fn realm_gate_runs_before_rules() {
    let realm = TestRealm::new();
    let mut key = AccessKey::new("outsider", ["elsewhere"]);
    key.security_rules
        .add(".*", ActionSet::ALL, true, 100)
        .unwrap();
    realm.state.create_key(key).unwrap();
    realm_rule(&realm, "*", "All", true, 0);

    let request = realm.request("a", DatabaseAction::Retrieve, Some("outsider"));
    assert_eq!(request.permission(), PermissionState::Denied);
}

#[test]
fn put_replaces_and_update_merges() {
    let realm = scenarios::populated_realm();
    let put = realm.trusted("rooms/general", DatabaseAction::Put);
    realm
        .service
        .place_data(&put, json!({"title": "Lobby"}), WriteMode::Put)
        .unwrap();
    assert_eq!(realm.read("rooms/general"), Some(json!({"title": "Lobby"})));
    assert_eq!(realm.read("rooms/random/title"), Some(json!("Random")));

    let update = realm.trusted("limits", DatabaseAction::Update);
    realm
        .service
        .place_data(&update, json!({"max_len": 500, "slow": true}), WriteMode::Update)
        .unwrap();
    assert_eq!(
        realm.read("limits"),
        Some(json!({"max_len": 500, "ratio": 0.5, "open": true, "owner": null, "slow": true}))
    );
}

#[test]
fn shallow_listing_of_documents() {
    let realm = scenarios::populated_realm();
    let request = realm.trusted("", DatabaseAction::Retrieve);
    assert_eq!(
        realm.service.get_data(&request, true).unwrap(),
        Some(json!({"rooms": true, "motd": "hello", "limits": true}))
    );

    let members = realm.trusted("rooms/general/members", DatabaseAction::Retrieve);
    assert_eq!(
        realm.service.get_data(&members, true).unwrap(),
        Some(json!(["ada", "alan"]))
    );
}

#[test]
fn pushes_sort_in_creation_order() {
    let realm = TestRealm::new();
    let mut names = Vec::new();
    for i in 0..20 {
        let request = realm.trusted("log", DatabaseAction::Push);
        let result = realm
            .service
            .place_data(&request, json!({"seq": i}), WriteMode::Push)
            .unwrap();
        names.push(result["name"].as_str().unwrap().to_string());
    }
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);

    let log = realm.read("log").unwrap();
    let seqs: Vec<_> = log
        .as_object()
        .unwrap()
        .values()
        .map(|entry| entry["seq"].as_i64().unwrap())
        .collect();
    assert_eq!(seqs, (0..20).collect::<Vec<_>>());
}

#[test]
fn delete_then_read_is_absent() {
    let realm = scenarios::populated_realm();
    realm
        .service
        .delete_data(&realm.trusted("rooms", DatabaseAction::Delete))
        .unwrap();
    assert_eq!(realm.read("rooms/general"), None);
    assert_eq!(realm.read("rooms"), None);
    assert_eq!(realm.read("motd"), Some(json!("hello")));
}

#[test]
fn realms_are_isolated() {
    let realm = TestRealm::new();
    realm
        .service
        .place_data(&realm.trusted("x", DatabaseAction::Put), json!(1), WriteMode::Put)
        .unwrap();
    assert!(realm.store.exists("arbor:app").unwrap());
    assert!(realm.service.export_realm("other").unwrap().is_none());
}

#[test]
fn file_store_backs_the_service() {
    let fixture = TestFileStore::new();
    let path = fixture.path();
    drop(fixture.store);

    {
        let store = Arc::new(arbordb_storage::FileStore::open(&path, true).unwrap());
        let service = DynamicDatabaseService::new(store, CoreConfig::new().domain_prefix("t"));
        let request = arbordb_core::DatabaseRequest::trusted(
            "app",
            LogicalPath::parse("doc"),
            DatabaseAction::Put,
        )
        .unwrap();
        service
            .place_data(&request, json!({"a": [1, {"b": "c"}]}), WriteMode::Put)
            .unwrap();
    }

    let store = Arc::new(arbordb_storage::FileStore::open(&path, false).unwrap());
    let service = DynamicDatabaseService::new(store, CoreConfig::new().domain_prefix("t"));
    assert_eq!(
        service.export_realm("app").unwrap(),
        Some(json!({"doc": {"a": [1, {"b": "c"}]}}))
    );
}

#[test]
fn state_roundtrip_keeps_decisions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let state = ServiceState::new();
    let mut key = AccessKey::new("k", [TEST_REALM]);
    key.security_rules
        .add("^/mine", ActionSet::ALL, true, 0)
        .unwrap();
    state.create_key(key).unwrap();
    state.save(&path).unwrap();

    let loaded = Arc::new(ServiceState::load(&path).unwrap());
    let processor = arbordb_core::RequestProcessor::new(loaded);
    let request = processor.process(TEST_REALM, "mine/x.json", DatabaseAction::Put, Some("k".into()));
    assert_eq!(request.permission(), PermissionState::Granted);
}
