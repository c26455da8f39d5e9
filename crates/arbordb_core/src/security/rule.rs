//! A single allow/deny rule.

use crate::action::{ActionSet, DatabaseAction};
use crate::error::{CoreError, CoreResult};
use crate::path::LogicalPath;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Priority of rules added without an explicit priority. The lowest tier.
pub const UNRANKED: i32 = -1;

/// A prioritized allow/deny decision over a path pattern and a set of actions.
///
/// Rules are immutable once built. To change a rule, remove it and add a new
/// one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RuleRecord", into = "RuleRecord")]
pub struct SecurityRule {
    id: Uuid,
    pattern: Regex,
    actions: ActionSet,
    allow: bool,
    priority: i32,
}

/// Persisted form of a rule, with the pattern as source text.
#[derive(Serialize, Deserialize)]
struct RuleRecord {
    id: Uuid,
    pattern: String,
    actions: ActionSet,
    allow: bool,
    #[serde(default = "unranked")]
    priority: i32,
}

fn unranked() -> i32 {
    UNRANKED
}

impl SecurityRule {
    /// Builds a rule from a regular expression.
    ///
    /// The pattern is matched against normalized paths (`/a/b`, root `/`) and
    /// is not anchored implicitly.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPattern`] if the pattern does not compile.
    pub fn new(pattern: &str, actions: ActionSet, allow: bool, priority: i32) -> CoreResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            pattern: compile(pattern)?,
            actions,
            allow,
            priority,
        })
    }

    /// Builds a rule from a wildcard pattern where `*` matches any run of
    /// characters and everything else is literal.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPattern`] if the translated pattern does
    /// not compile.
    pub fn from_wildcard(
        wildcard: &str,
        actions: ActionSet,
        allow: bool,
        priority: i32,
    ) -> CoreResult<Self> {
        Self::new(&wildcard_to_regex(wildcard), actions, allow, priority)
    }

    /// Returns the rule id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the pattern source.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Returns the actions the rule applies to.
    #[must_use]
    pub fn actions(&self) -> ActionSet {
        self.actions
    }

    /// Returns true for an allow rule.
    #[must_use]
    pub fn allow(&self) -> bool {
        self.allow
    }

    /// Returns the priority. Higher wins.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns true if the pattern matches the normalized form of `path`.
    #[must_use]
    pub fn matches_path(&self, path: &LogicalPath) -> bool {
        self.pattern_matches(&path.to_string())
    }

    pub(crate) fn pattern_matches(&self, normalized: &str) -> bool {
        self.pattern.is_match(normalized)
    }

    /// Returns true if the rule governs `action` on `path`.
    #[must_use]
    pub fn applies_to(&self, path: &LogicalPath, action: DatabaseAction) -> bool {
        self.actions.contains(action) && self.matches_path(path)
    }
}

impl TryFrom<RuleRecord> for SecurityRule {
    type Error = CoreError;

    fn try_from(record: RuleRecord) -> CoreResult<Self> {
        Ok(Self {
            id: record.id,
            pattern: compile(&record.pattern)?,
            actions: record.actions,
            allow: record.allow,
            priority: record.priority,
        })
    }
}

impl From<SecurityRule> for RuleRecord {
    fn from(rule: SecurityRule) -> Self {
        Self {
            id: rule.id,
            pattern: rule.pattern.as_str().to_string(),
            actions: rule.actions,
            allow: rule.allow,
            priority: rule.priority,
        }
    }
}

/// Translates a wildcard pattern into an anchored regular expression.
#[must_use]
pub fn wildcard_to_regex(wildcard: &str) -> String {
    let body: Vec<String> = wildcard.split('*').map(regex::escape).collect();
    format!("^{}$", body.join(".*"))
}

fn compile(pattern: &str) -> CoreResult<Regex> {
    Regex::new(pattern).map_err(|e| CoreError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}
