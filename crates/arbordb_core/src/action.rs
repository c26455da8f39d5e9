//! Database actions and action bitmasks.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An operation a request performs on a realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseAction {
    /// Read a subtree.
    Retrieve,
    /// Replace a subtree.
    Put,
    /// Merge into a subtree.
    Update,
    /// Append a child under a generated id.
    Push,
    /// Remove a subtree.
    Delete,
}

impl DatabaseAction {
    /// Every action, in bit order.
    pub const ALL: [Self; 5] = [
        Self::Retrieve,
        Self::Put,
        Self::Update,
        Self::Push,
        Self::Delete,
    ];

    const fn bit(self) -> u8 {
        match self {
            Self::Retrieve => 1,
            Self::Put => 1 << 1,
            Self::Update => 1 << 2,
            Self::Push => 1 << 3,
            Self::Delete => 1 << 4,
        }
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Retrieve => "Retrieve",
            Self::Put => "Put",
            Self::Update => "Update",
            Self::Push => "Push",
            Self::Delete => "Delete",
        }
    }
}

impl fmt::Display for DatabaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DatabaseAction {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::invalid_request(format!("unknown action type {s:?}")))
    }
}

/// A set of [`DatabaseAction`]s stored as a bitmask.
///
/// Serialized as a list of action names.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<DatabaseAction>", into = "Vec<DatabaseAction>")]
pub struct ActionSet(u8);

impl ActionSet {
    /// The empty set.
    pub const NONE: Self = Self(0);

    /// Every action.
    pub const ALL: Self = Self(0b1_1111);

    /// Creates a set holding a single action.
    #[must_use]
    pub const fn only(action: DatabaseAction) -> Self {
        Self(action.bit())
    }

    /// Returns a copy of the set with `action` added.
    #[must_use]
    pub const fn with(self, action: DatabaseAction) -> Self {
        Self(self.0 | action.bit())
    }

    /// Returns true if `action` is in the set.
    #[must_use]
    pub const fn contains(self, action: DatabaseAction) -> bool {
        self.0 & action.bit() != 0
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the actions in the set.
    pub fn iter(self) -> impl Iterator<Item = DatabaseAction> {
        DatabaseAction::ALL
            .into_iter()
            .filter(move |action| self.contains(*action))
    }

    /// Parses a `|`-separated list of action names, e.g. `Put|Update`.
    ///
    /// `All` stands for every action.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRequest`] for an empty list or an unknown
    /// name.
    pub fn parse(list: &str) -> CoreResult<Self> {
        let mut set = Self::NONE;
        for token in list.split('|').map(str::trim) {
            if token.eq_ignore_ascii_case("all") {
                set = Self::ALL;
            } else {
                set = set.with(token.parse()?);
            }
        }
        if set.is_empty() {
            return Err(CoreError::invalid_request("empty action type list"));
        }
        Ok(set)
    }
}

impl From<DatabaseAction> for ActionSet {
    fn from(action: DatabaseAction) -> Self {
        Self::only(action)
    }
}

impl From<Vec<DatabaseAction>> for ActionSet {
    fn from(actions: Vec<DatabaseAction>) -> Self {
        actions.into_iter().fold(Self::NONE, Self::with)
    }
}

impl From<ActionSet> for Vec<DatabaseAction> {
    fn from(set: ActionSet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Debug for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionSet({self})")
    }
}

impl fmt::Display for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ALL {
            return f.write_str("All");
        }
        let names: Vec<_> = self.iter().map(DatabaseAction::name).collect();
        f.write_str(&names.join("|"))
    }
}
