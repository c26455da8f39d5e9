//! Inspect command implementation.

use super::open_journal;
use serde::Serialize;
use std::path::Path;

/// Journal inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Journal path.
    pub path: String,
    /// Journal size in bytes.
    pub journal_size: u64,
    /// Live bytes (keys plus values) across every domain.
    pub live_bytes: u64,
    /// Realms found under the prefix.
    pub realms: Vec<RealmStats>,
    /// Domains not under the prefix.
    pub other_domains: Vec<String>,
}

/// Statistics for a single realm.
#[derive(Debug, Serialize)]
pub struct RealmStats {
    /// Database id.
    pub id: String,
    /// Number of flat keys.
    pub key_count: usize,
    /// Live bytes (keys plus values).
    pub data_size: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, prefix: &str, format: &str) -> anyhow::Result<()> {
    let result = inspect(path, prefix)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => {
            println!("ArborDB Journal: {}", result.path);
            println!("  Size:       {} bytes", result.journal_size);
            println!("  Live data:  {} bytes", result.live_bytes);
            println!();
            println!("Realms ({}):", result.realms.len());
            for realm in &result.realms {
                println!(
                    "  {:<24} {:>8} keys {:>10} bytes",
                    realm.id, realm.key_count, realm.data_size
                );
            }
            if !result.other_domains.is_empty() {
                println!();
                println!("Other domains: {}", result.other_domains.join(", "));
            }
        }
    }

    Ok(())
}

/// Collects statistics for the journal at `path`.
pub fn inspect(path: &Path, prefix: &str) -> anyhow::Result<InspectResult> {
    let store = open_journal(path)?;
    let realm_prefix = format!("{prefix}:");

    let mut realms = Vec::new();
    let mut other_domains = Vec::new();
    let mut live_bytes = 0u64;
    for (domain, entries) in store.snapshot() {
        let data_size: u64 = entries
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum();
        live_bytes += data_size;
        match domain.strip_prefix(&realm_prefix) {
            Some(id) => realms.push(RealmStats {
                id: id.to_string(),
                key_count: entries.len(),
                data_size,
            }),
            None => other_domains.push(domain),
        }
    }
    realms.sort_by(|a, b| a.id.cmp(&b.id));
    other_domains.sort();

    Ok(InspectResult {
        path: path.display().to_string(),
        journal_size: store.journal_size()?,
        live_bytes,
        realms,
        other_domains,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbordb_storage::{FileStore, KeyValueStore};
    use tempfile::TempDir;

    #[test]
    fn inspect_counts_realms() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("realms.journal");
        {
            let store = FileStore::open(&path, false).unwrap();
            store.set("arbor:chat", "/a", "1").unwrap();
            store.set("arbor:chat", "/b", "2").unwrap();
            store.set("arbor:notes", "/c", "3").unwrap();
            store.set("legacy", "/d", "4").unwrap();
        }

        let result = inspect(&path, "arbor").unwrap();
        assert_eq!(result.realms.len(), 2);
        assert_eq!(result.realms[0].id, "chat");
        assert_eq!(result.realms[0].key_count, 2);
        assert_eq!(result.realms[0].data_size, 6);
        assert_eq!(result.other_domains, vec!["legacy"]);
        assert_eq!(result.live_bytes, 12);
        assert!(result.journal_size > 0);
    }

    #[test]
    fn missing_journal() {
        let dir = TempDir::new().unwrap();
        assert!(inspect(&dir.path().join("nope.journal"), "arbor").is_err());
    }
}
