//! CLI command implementations.

pub mod compact;
pub mod dump;
pub mod inspect;
pub mod serve;

use anyhow::Context;
use arbordb_storage::FileStore;
use std::path::Path;

/// Opens an existing journal. Maintenance commands never create one.
fn open_journal(path: &Path) -> anyhow::Result<FileStore> {
    anyhow::ensure!(path.exists(), "no journal found at {}", path.display());
    FileStore::open(path, false).with_context(|| format!("failed to open {}", path.display()))
}
