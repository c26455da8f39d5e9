//! # ArborDB Core
//!
//! Hierarchical JSON database engine for ArborDB.
//!
//! This crate provides:
//! - Flattening of JSON trees into flat key/value pairs and back
//! - Security rules: prioritized allow/deny patterns per realm or access key
//! - Request parsing and authorization
//! - Put/Update/Push/Delete/Get semantics over a [`KeyValueStore`]
//! - Chronologically ordered push ids and server values
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use arbordb_core::{
//!     CoreConfig, DatabaseAction, DatabaseRequest, DynamicDatabaseService, LogicalPath, WriteMode,
//! };
//! use arbordb_storage::InMemoryStore;
//! use serde_json::json;
//!
//! let service = DynamicDatabaseService::new(Arc::new(InMemoryStore::new()), CoreConfig::default());
//!
//! let put = DatabaseRequest::trusted("app", LogicalPath::parse("users/ada"), DatabaseAction::Put)?;
//! service.place_data(&put, json!({"name": "Ada"}), WriteMode::Put)?;
//!
//! let get = DatabaseRequest::trusted("app", LogicalPath::parse("users"), DatabaseAction::Retrieve)?;
//! assert_eq!(service.get_data(&get, false)?, Some(json!({"ada": {"name": "Ada"}})));
//! # Ok::<(), arbordb_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod access;
mod action;
mod config;
mod database;
mod error;
mod flat;
pub mod path;
mod push_id;
mod request;
pub mod security;
pub mod server_value;
mod state;

pub use access::{AccessKey, Claim, Identity, IdentityResolver};
pub use action::{ActionSet, DatabaseAction};
pub use arbordb_storage::KeyValueStore;
pub use config::{CoreConfig, DEFAULT_DOMAIN_PREFIX};
pub use database::{DynamicDatabaseService, WriteMode};
pub use error::{CoreError, CoreResult};
pub use flat::{select, shallow, FlatJsonObject};
pub use path::{KeySelector, LogicalPath};
pub use push_id::{PushIdGenerator, PUSH_CHARS, PUSH_ID_LEN};
pub use request::{DatabaseRequest, PermissionState, RequestProcessor, PATH_SUFFIX};
pub use security::{RuleOutcome, SecurityRule, SecurityRuleCollection, UNRANKED};
pub use state::{RuleScope, ServiceState, StateSnapshot};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
