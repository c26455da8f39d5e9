//! # ArborDB Server
//!
//! HTTP front end for ArborDB realms.
//!
//! This crate provides:
//! - The data API (`/io/{dbid}/{path}.json`: read, replace, merge, push, delete)
//! - The management API (`/rsec`: security rules and access keys)
//! - Token extraction from `auth`/`apikey` query parameters or a bearer header
//! - TOML configuration and server bootstrap
//!
//! # Architecture
//!
//! Handlers parse and authorize each request through the core
//! [`RequestProcessor`](arbordb_core::RequestProcessor), then run the store
//! operation on the blocking thread pool. Keys and rules live in a
//! [`ServiceState`](arbordb_core::ServiceState) that is saved to the state
//! file after every successful management mutation.
//!
//! # Running
//!
//! ```rust,ignore
//! use arbordb_server::{ServerConfig, Server};
//!
//! let config = ServerConfig::default()
//!     .with_state_path("state.json")
//!     .with_file_storage("realms.journal")
//!     .with_admin_key("root", ["chat"]);
//! let server = Server::spawn(config).await?;
//! // curl -X PUT 'http://127.0.0.1:8080/io/chat/motd.json?auth=root' -d '"hi"'
//! server.shutdown().await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod io;
mod management;
mod server;
mod state;

pub use auth::{extract_token, AuthToken, TOKEN_PARAMS};
pub use config::{AdminKeyConfig, ServerConfig, StorageConfig};
pub use error::{ServerError, ServerResult};
pub use io::IoParams;
pub use management::{KeyParams, RuleParams};
pub use server::{create_app, run_with_config_until_ctrl_c, Server};
pub use state::AppState;
