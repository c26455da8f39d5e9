//! Server state: access keys and the realm rule table.
//!
//! The state is small, read on every request and mutated only by
//! administrative calls. Both tables sit behind their own read/write lock.
//! [`StateSnapshot`] is the persisted JSON form.

use crate::access::{AccessKey, IdentityResolver};
use crate::action::DatabaseAction;
use crate::error::{CoreError, CoreResult};
use crate::path::LogicalPath;
use crate::security::{RuleOutcome, SecurityRule, SecurityRuleCollection};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// The owner of a rule collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleScope {
    /// Rules shared by every caller of a realm.
    Realm(String),
    /// Rules private to one access key.
    Key(String),
}

impl fmt::Display for RuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Realm(id) => write!(f, "realm {id}"),
            Self::Key(id) => write!(f, "key {id}"),
        }
    }
}

/// Persisted server state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Every access key, including its private rules.
    #[serde(default)]
    pub keys: Vec<AccessKey>,
    /// Realm rule collections by database id.
    #[serde(default)]
    pub realms: BTreeMap<String, SecurityRuleCollection>,
}

impl StateSnapshot {
    /// Reads a snapshot from `path`. A missing file yields an empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid snapshot.
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| CoreError::state(format!("{}: {e}", path.display())))
    }

    /// Writes the snapshot to `path`, replacing it atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| CoreError::state(e.to_string()))?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Access keys and realm rules shared by the request processor and the
/// management API.
#[derive(Debug, Default)]
pub struct ServiceState {
    keys: RwLock<BTreeMap<String, AccessKey>>,
    realms: RwLock<BTreeMap<String, SecurityRuleCollection>>,
}

impl ServiceState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a state from a snapshot. Later duplicates of a key win.
    #[must_use]
    pub fn from_snapshot(snapshot: StateSnapshot) -> Self {
        Self {
            keys: RwLock::new(
                snapshot
                    .keys
                    .into_iter()
                    .map(|key| (key.key.clone(), key))
                    .collect(),
            ),
            realms: RwLock::new(snapshot.realms),
        }
    }

    /// Captures the current state.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            keys: self.keys.read().values().cloned().collect(),
            realms: self.realms.read().clone(),
        }
    }

    /// Replaces every key and rule with the contents of `snapshot`.
    pub fn restore(&self, snapshot: StateSnapshot) {
        let Self { keys, realms } = Self::from_snapshot(snapshot);
        *self.keys.write() = keys.into_inner();
        *self.realms.write() = realms.into_inner();
    }

    /// Loads the state saved at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let snapshot = StateSnapshot::load(path)?;
        info!(
            path = %path.display(),
            keys = snapshot.keys.len(),
            realms = snapshot.realms.len(),
            "loaded server state"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Saves the state to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        self.snapshot().save(path)?;
        debug!(path = %path.display(), "saved server state");
        Ok(())
    }

    // Keys

    /// Registers a new access key.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyExists`] if the key is taken.
    pub fn create_key(&self, key: AccessKey) -> CoreResult<()> {
        let mut keys = self.keys.write();
        if keys.contains_key(&key.key) {
            return Err(CoreError::already_exists("key", key.key));
        }
        keys.insert(key.key.clone(), key);
        Ok(())
    }

    /// Registers `key` unless a key with the same name exists. Returns true if
    /// it was inserted.
    pub fn ensure_key(&self, key: AccessKey) -> bool {
        let mut keys = self.keys.write();
        if keys.contains_key(&key.key) {
            return false;
        }
        keys.insert(key.key.clone(), key);
        true
    }

    /// Returns a copy of the key named `key`.
    #[must_use]
    pub fn get_key(&self, key: &str) -> Option<AccessKey> {
        self.keys.read().get(key).cloned()
    }

    /// Removes an access key and its private rules.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the key does not exist.
    pub fn delete_key(&self, key: &str) -> CoreResult<AccessKey> {
        self.keys
            .write()
            .remove(key)
            .ok_or_else(|| CoreError::not_found("key", key))
    }

    /// Returns the names of every key.
    #[must_use]
    pub fn key_names(&self) -> Vec<String> {
        self.keys.read().keys().cloned().collect()
    }

    // Rules

    fn read_scope<T>(
        &self,
        scope: &RuleScope,
        f: impl FnOnce(Option<&SecurityRuleCollection>) -> T,
    ) -> CoreResult<T> {
        match scope {
            RuleScope::Realm(id) => Ok(f(self.realms.read().get(id))),
            RuleScope::Key(id) => {
                let keys = self.keys.read();
                let key = keys.get(id).ok_or_else(|| CoreError::not_found("key", id))?;
                Ok(f(Some(&key.security_rules)))
            }
        }
    }

    fn write_scope<T>(
        &self,
        scope: &RuleScope,
        f: impl FnOnce(&mut SecurityRuleCollection) -> T,
    ) -> CoreResult<T> {
        match scope {
            RuleScope::Realm(id) => {
                let mut realms = self.realms.write();
                let rules = realms.entry(id.clone()).or_default();
                let out = f(rules);
                if rules.is_empty() {
                    realms.remove(id);
                }
                Ok(out)
            }
            RuleScope::Key(id) => {
                let mut keys = self.keys.write();
                let key = keys
                    .get_mut(id)
                    .ok_or_else(|| CoreError::not_found("key", id))?;
                Ok(f(&mut key.security_rules))
            }
        }
    }

    /// Appends a rule to the collection of `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown key scope.
    pub fn add_rule(&self, scope: &RuleScope, rule: SecurityRule) -> CoreResult<()> {
        let id = rule.id();
        self.write_scope(scope, |rules| rules.add_rule(rule))?;
        debug!(%scope, rule = %id, "added security rule");
        Ok(())
    }

    /// Lists the rules of `scope`, optionally only those matching `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown key scope.
    pub fn list_rules(
        &self,
        scope: &RuleScope,
        path: Option<&LogicalPath>,
    ) -> CoreResult<Vec<SecurityRule>> {
        self.read_scope(scope, |rules| {
            let Some(rules) = rules else {
                return Vec::new();
            };
            match path {
                Some(path) => rules.rules_matching_path(path).cloned().collect(),
                None => rules.iter().cloned().collect(),
            }
        })
    }

    /// Returns one rule of `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the scope or the rule does not exist.
    pub fn get_rule(&self, scope: &RuleScope, id: Uuid) -> CoreResult<SecurityRule> {
        self.read_scope(scope, |rules| rules.and_then(|r| r.get(id)).cloned())?
            .ok_or_else(|| CoreError::not_found("rule", id.to_string()))
    }

    /// Removes one rule of `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the scope or the rule does not exist.
    pub fn remove_rule(&self, scope: &RuleScope, id: Uuid) -> CoreResult<SecurityRule> {
        let removed = self
            .write_scope(scope, |rules| rules.remove_by_id(id))?
            .ok_or_else(|| CoreError::not_found("rule", id.to_string()))?;
        debug!(%scope, rule = %id, "removed security rule");
        Ok(removed)
    }

    /// Removes the rules of `scope` matching `path`, or all of them. Returns
    /// how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown key scope.
    pub fn remove_rules(&self, scope: &RuleScope, path: Option<&LogicalPath>) -> CoreResult<usize> {
        let removed = self.write_scope(scope, |rules| match path {
            Some(path) => rules.remove_matching_path(path),
            None => rules.clear(),
        })?;
        debug!(%scope, removed, "removed security rules");
        Ok(removed)
    }

    /// Evaluates the rules of realm `database_id`.
    #[must_use]
    pub fn evaluate_realm(
        &self,
        database_id: &str,
        path: &LogicalPath,
        action: DatabaseAction,
    ) -> RuleOutcome {
        self.realms
            .read()
            .get(database_id)
            .map_or(RuleOutcome::NoMatch, |rules| rules.evaluate(path, action))
    }
}

impl IdentityResolver for ServiceState {
    fn resolve_identity(&self, token: &str) -> Option<crate::access::Identity> {
        self.keys.read().get(token).map(AccessKey::identity)
    }

    fn resolve_key(&self, token: &str) -> Option<AccessKey> {
        self.get_key(token)
    }
}
