//! Ordered rule collections and rule evaluation.

use super::rule::SecurityRule;
use crate::action::{ActionSet, DatabaseAction};
use crate::error::CoreResult;
use crate::path::LogicalPath;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of evaluating a rule collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The deciding rule allows the action.
    Granted,
    /// The deciding rule denies the action.
    Denied,
    /// No rule governs the action on the path.
    NoMatch,
}

/// The rules owned by one realm or one access key, in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityRuleCollection {
    rules: Vec<SecurityRule>,
}

impl SecurityRuleCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles and appends a rule, returning a copy of it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::InvalidPattern`] if the pattern does not
    /// compile.
    pub fn add(
        &mut self,
        pattern: &str,
        actions: ActionSet,
        allow: bool,
        priority: i32,
    ) -> CoreResult<SecurityRule> {
        let rule = SecurityRule::new(pattern, actions, allow, priority)?;
        self.rules.push(rule.clone());
        Ok(rule)
    }

    /// Appends a prebuilt rule.
    pub fn add_rule(&mut self, rule: SecurityRule) {
        self.rules.push(rule);
    }

    /// Removes every rule whose pattern matches `path`. Returns how many were
    /// removed.
    pub fn remove_matching_path(&mut self, path: &LogicalPath) -> usize {
        let before = self.rules.len();
        self.rules.retain(|rule| !rule.matches_path(path));
        before - self.rules.len()
    }

    /// Removes the rule with `id`.
    pub fn remove_by_id(&mut self, id: Uuid) -> Option<SecurityRule> {
        let index = self.rules.iter().position(|rule| rule.id() == id)?;
        Some(self.rules.remove(index))
    }

    /// Removes every rule. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.rules.len();
        self.rules.clear();
        count
    }

    /// Returns the rule with `id`.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&SecurityRule> {
        self.rules.iter().find(|rule| rule.id() == id)
    }

    /// Returns the rules whose pattern matches `path`, in insertion order.
    pub fn rules_matching_path<'a>(
        &'a self,
        path: &'a LogicalPath,
    ) -> impl Iterator<Item = &'a SecurityRule> + 'a {
        self.rules.iter().filter(move |rule| rule.matches_path(path))
    }

    /// Decides `action` on `path`.
    ///
    /// Among the rules that match the path and cover the action, the one with
    /// the highest priority decides; on a tie the most recently added rule
    /// wins.
    #[must_use]
    pub fn evaluate(&self, path: &LogicalPath, action: DatabaseAction) -> RuleOutcome {
        let normalized = path.to_string();
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.actions().contains(action))
            .filter(|(_, rule)| rule.pattern_matches(&normalized))
            .max_by_key(|(index, rule)| (rule.priority(), *index))
            .map_or(RuleOutcome::NoMatch, |(_, rule)| {
                if rule.allow() {
                    RuleOutcome::Granted
                } else {
                    RuleOutcome::Denied
                }
            })
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterates the rules in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, SecurityRule> {
        self.rules.iter()
    }
}

impl<'a> IntoIterator for &'a SecurityRuleCollection {
    type Item = &'a SecurityRule;
    type IntoIter = std::slice::Iter<'a, SecurityRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
