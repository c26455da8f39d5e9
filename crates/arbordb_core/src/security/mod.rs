//! Security rules.
//!
//! A rule pairs a path pattern and a set of actions with an allow/deny
//! decision and a priority. Rules are owned by collections scoped either to a
//! realm or to a single access key.

mod collection;
mod rule;

pub use collection::{RuleOutcome, SecurityRuleCollection};
pub use rule::{wildcard_to_regex, SecurityRule, UNRANKED};
