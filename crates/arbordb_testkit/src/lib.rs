//! # ArborDB Testkit
//!
//! Test utilities for ArborDB.
//!
//! This crate provides:
//! - Wired realm fixtures (store, keys, rules, processor, service)
//! - Temporary file stores
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arbordb_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_realm() {
//!     with_realm(|realm| {
//!         let value = realm.read("users");
//!         // ... assertions
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
