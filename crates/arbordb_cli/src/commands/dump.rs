//! Dump command implementation.

use super::open_journal;
use arbordb_core::{CoreConfig, DynamicDatabaseService};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Runs the dump command.
pub fn run(path: &Path, prefix: &str, realm: &str) -> anyhow::Result<()> {
    let value = export(path, prefix, realm)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Reads realm `realm` from the journal at `path`. An empty realm is `{}`.
pub fn export(path: &Path, prefix: &str, realm: &str) -> anyhow::Result<Value> {
    let store = open_journal(path)?;
    let service = DynamicDatabaseService::new(Arc::new(store), CoreConfig::new().domain_prefix(prefix));
    Ok(service
        .export_realm(realm)?
        .unwrap_or_else(|| Value::Object(Default::default())))
}
