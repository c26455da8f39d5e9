//! Compact command implementation.

use super::open_journal;
use std::path::Path;

/// Compaction statistics.
#[derive(Debug)]
pub struct CompactStats {
    /// Live keys kept.
    pub live_keys: usize,
    /// Bytes before compaction.
    pub bytes_before: u64,
    /// Bytes reclaimed. Zero on a dry run.
    pub bytes_reclaimed: u64,
}

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool) -> anyhow::Result<()> {
    println!("Compacting journal at {}", path.display());
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    let stats = compact(path, dry_run)?;
    println!("  Live keys:   {}", stats.live_keys);
    println!("  Size before: {} bytes", stats.bytes_before);
    if !dry_run {
        println!(
            "  Reclaimed:   {} bytes ({:.1}%)",
            stats.bytes_reclaimed,
            if stats.bytes_before > 0 {
                (stats.bytes_reclaimed as f64 / stats.bytes_before as f64) * 100.0
            } else {
                0.0
            }
        );
        println!("✓ Compaction complete");
    }
    Ok(())
}

/// Compacts the journal at `path` unless `dry_run` is set.
pub fn compact(path: &Path, dry_run: bool) -> anyhow::Result<CompactStats> {
    let store = open_journal(path)?;
    let live_keys = store.snapshot().values().map(|keys| keys.len()).sum();
    let bytes_before = store.journal_size()?;
    let bytes_reclaimed = if dry_run { 0 } else { store.compact()? };
    Ok(CompactStats {
        live_keys,
        bytes_before,
        bytes_reclaimed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbordb_storage::{FileStore, KeyValueStore};
    use tempfile::TempDir;

    fn churned_journal(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("realms.journal");
        let store = FileStore::open(&path, false).unwrap();
        for i in 0..50 {
            store.set("arbor:app", "/counter", &i.to_string()).unwrap();
        }
        store.set("arbor:app", "/gone", "1").unwrap();
        store.delete("arbor:app", "/gone").unwrap();
        path
    }

    #[test]
    fn compact_reclaims_space() {
        let dir = TempDir::new().unwrap();
        let path = churned_journal(&dir);

        let stats = compact(&path, false).unwrap();
        assert_eq!(stats.live_keys, 1);
        assert!(stats.bytes_reclaimed > 0);

        let store = FileStore::open(&path, false).unwrap();
        assert_eq!(store.get("arbor:app", "/counter").unwrap().as_deref(), Some("49"));
    }

    #[test]
    fn dry_run_leaves_journal() {
        let dir = TempDir::new().unwrap();
        let path = churned_journal(&dir);
        let before = std::fs::metadata(&path).unwrap().len();

        let stats = compact(&path, true).unwrap();
        assert_eq!(stats.bytes_reclaimed, 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), before);
    }
}
