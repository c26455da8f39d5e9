//! Access keys and caller identities.

use crate::security::SecurityRuleCollection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A credential presented by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessKey {
    /// The key string. Unique across the server.
    pub key: String,
    /// Realms (database ids) this key may address.
    #[serde(default)]
    pub allowed_realms: BTreeSet<String>,
    /// Rules private to this key, evaluated before the realm's rules.
    #[serde(default)]
    pub security_rules: SecurityRuleCollection,
    /// Whether the key carries the administrative claim.
    #[serde(default)]
    pub admin: bool,
}

impl AccessKey {
    /// Creates a key allowed into `realms`.
    pub fn new<I, S>(key: impl Into<String>, realms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            allowed_realms: realms.into_iter().map(Into::into).collect(),
            security_rules: SecurityRuleCollection::new(),
            admin: false,
        }
    }

    /// Sets the administrative flag.
    #[must_use]
    pub fn with_admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }

    /// Returns true if the key may address `database_id`.
    #[must_use]
    pub fn allows_realm(&self, database_id: &str) -> bool {
        self.allowed_realms.contains(database_id)
    }

    /// Returns the identity this key authenticates.
    #[must_use]
    pub fn identity(&self) -> Identity {
        let mut claims = BTreeSet::new();
        if self.admin {
            claims.insert(Claim::Admin);
        }
        Identity {
            key: self.key.clone(),
            claims,
        }
    }
}

/// A capability asserted by an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Claim {
    /// Full access to every realm and to rule management.
    Admin,
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The access key the caller presented.
    pub key: String,
    /// Claims held by the caller.
    pub claims: BTreeSet<Claim>,
}

impl Identity {
    /// Returns true if the identity holds `claim`.
    #[must_use]
    pub fn has_claim(&self, claim: Claim) -> bool {
        self.claims.contains(&claim)
    }
}

/// Maps bearer tokens to identities and access keys.
pub trait IdentityResolver: Send + Sync {
    /// Returns the identity authenticated by `token`.
    fn resolve_identity(&self, token: &str) -> Option<Identity>;

    /// Returns the access key behind `token`.
    fn resolve_key(&self, token: &str) -> Option<AccessKey>;
}
