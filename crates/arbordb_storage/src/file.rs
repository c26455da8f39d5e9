//! Journal-backed persistent key-value store.

use crate::error::{StorageError, StorageResult};
use crate::journal::JournalRecord;
use crate::memory::InMemoryStore;
use crate::store::KeyValueStore;
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-backed key-value store.
///
/// Every mutation is appended to a journal file before it is applied to an
/// in-memory index; reads are served from the index. Opening the store
/// replays the journal.
///
/// # Durability
///
/// - with `sync_on_write`, every append calls `File::sync_data()`
/// - otherwise appends reach the OS on `flush()` and the disk on `sync()`
///
/// # Recovery
///
/// A torn or corrupt tail (a crash mid-append) is truncated on open; every
/// record before it is kept.
///
/// # Example
///
/// ```no_run
/// use arbordb_storage::{KeyValueStore, FileStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("realms.journal"), true).unwrap();
/// store.set("arbor:app", "/users/ada", "\"admin\"").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    index: InMemoryStore,
    file: Mutex<File>,
    sync_on_write: bool,
}

impl FileStore {
    /// Opens or creates a journal at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, is locked by another
    /// process, or cannot be replayed.
    pub fn open(path: &Path, sync_on_write: bool) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = Self::open_locked(path)?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let index = InMemoryStore::new();
        let mut offset = 0usize;
        let mut replayed = 0usize;
        loop {
            match JournalRecord::decode_at(&buf, offset) {
                Ok(Some((record, next))) => {
                    apply(&index, record)?;
                    offset = next;
                    replayed += 1;
                }
                Ok(None) => break,
                Err(StorageError::Corrupted { offset: at, message }) => {
                    tracing::warn!(
                        path = %path.display(),
                        offset = at,
                        %message,
                        "truncating corrupt journal tail"
                    );
                    file.set_len(at)?;
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        file.seek(SeekFrom::End(0))?;
        tracing::debug!(path = %path.display(), records = replayed, "journal replayed");

        Ok(Self {
            path: path.to_path_buf(),
            index,
            file: Mutex::new(file),
            sync_on_write,
        })
    }

    fn open_locked(path: &Path) -> StorageResult<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.try_lock_exclusive()
            .map_err(|_| StorageError::Locked(path.display().to_string()))?;
        Ok(file)
    }

    /// Returns the path to the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current journal size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn journal_size(&self) -> StorageResult<u64> {
        Ok(self.file.lock().metadata()?.len())
    }

    /// Returns a copy of every live domain.
    #[must_use]
    pub fn snapshot(&self) -> std::collections::HashMap<String, std::collections::HashMap<String, String>> {
        self.index.snapshot()
    }

    /// Pushes buffered appends to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> StorageResult<()> {
        self.file.lock().flush()?;
        Ok(())
    }

    /// Syncs the journal to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&self) -> StorageResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    /// Rewrites the journal so it holds one `Set` record per live key.
    ///
    /// Returns the number of bytes reclaimed.
    ///
    /// # Errors
    ///
    /// Returns an error if the compacted journal cannot be written or swapped
    /// in. The original journal is left untouched in that case.
    pub fn compact(&self) -> StorageResult<u64> {
        let mut file = self.file.lock();
        let before = file.metadata()?.len();

        let tmp_path = self.path.with_extension("compact");
        {
            let mut tmp = File::create(&tmp_path)?;
            for (domain, keys) in self.index.snapshot() {
                for (key, value) in keys {
                    let record = JournalRecord::Set {
                        domain: domain.clone(),
                        key,
                        value,
                    };
                    tmp.write_all(&record.encode()?)?;
                }
            }
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        let mut reopened = Self::open_locked(&self.path)?;
        reopened.seek(SeekFrom::End(0))?;
        *file = reopened;
        let after = file.metadata()?.len();

        tracing::info!(path = %self.path.display(), before, after, "journal compacted");
        Ok(before.saturating_sub(after))
    }

    fn append(&self, file: &mut File, record: &JournalRecord) -> StorageResult<()> {
        file.write_all(&record.encode()?)?;
        if self.sync_on_write {
            file.sync_data()?;
        }
        Ok(())
    }
}

fn apply(index: &InMemoryStore, record: JournalRecord) -> StorageResult<()> {
    match record {
        JournalRecord::Set { domain, key, value } => {
            index.set(&domain, &key, &value)?;
        }
        JournalRecord::Delete { domain, key } => {
            index.delete(&domain, &key)?;
        }
    }
    Ok(())
}

impl KeyValueStore for FileStore {
    fn exists(&self, domain: &str) -> StorageResult<bool> {
        self.index.exists(domain)
    }

    fn get(&self, domain: &str, key: &str) -> StorageResult<Option<String>> {
        self.index.get(domain, key)
    }

    fn set(&self, domain: &str, key: &str, value: &str) -> StorageResult<bool> {
        let mut file = self.file.lock();
        let record = JournalRecord::Set {
            domain: domain.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        };
        self.append(&mut file, &record)?;
        self.index.set(domain, key, value)
    }

    fn delete(&self, domain: &str, key: &str) -> StorageResult<bool> {
        let mut file = self.file.lock();
        if self.index.get(domain, key)?.is_none() {
            return Ok(false);
        }
        let record = JournalRecord::Delete {
            domain: domain.to_string(),
            key: key.to_string(),
        };
        self.append(&mut file, &record)?;
        self.index.delete(domain, key)
    }

    fn keys(&self, domain: &str) -> StorageResult<Vec<String>> {
        self.index.keys(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_set_get_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.journal");

        {
            let store = FileStore::open(&path, true).unwrap();
            store.set("realm", "/a", "1").unwrap();
            store.set("realm", "/b", "2").unwrap();
            store.delete("realm", "/a").unwrap();
        }

        let store = FileStore::open(&path, true).unwrap();
        assert_eq!(store.get("realm", "/a").unwrap(), None);
        assert_eq!(store.get("realm", "/b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn file_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("store.journal");
        let store = FileStore::open(&path, false).unwrap();
        store.set("realm", "/a", "1").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn file_delete_missing_is_not_journaled() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("s.journal"), false).unwrap();
        assert!(!store.delete("realm", "/nothing").unwrap());
        assert_eq!(store.journal_size().unwrap(), 0);
    }

    #[test]
    fn file_truncates_torn_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.journal");

        {
            let store = FileStore::open(&path, true).unwrap();
            store.set("realm", "/a", "1").unwrap();
            store.set("realm", "/b", "2").unwrap();
        }
        let full = fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(full - 2).unwrap();
        drop(file);

        let store = FileStore::open(&path, true).unwrap();
        assert_eq!(store.get("realm", "/a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("realm", "/b").unwrap(), None);
        assert!(store.journal_size().unwrap() < full);
    }

    #[test]
    fn file_second_open_is_locked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.journal");
        let _first = FileStore::open(&path, false).unwrap();
        let second = FileStore::open(&path, false);
        assert!(matches!(second, Err(StorageError::Locked(_))));
    }

    #[test]
    fn file_compact_reclaims_space() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.journal");
        let store = FileStore::open(&path, false).unwrap();
        for i in 0..20 {
            store.set("realm", "/counter", &i.to_string()).unwrap();
        }
        store.set("realm", "/gone", "x").unwrap();
        store.delete("realm", "/gone").unwrap();

        let reclaimed = store.compact().unwrap();
        assert!(reclaimed > 0);

        store.set("realm", "/after", "y").unwrap();
        drop(store);

        let store = FileStore::open(&path, false).unwrap();
        assert_eq!(store.get("realm", "/counter").unwrap().as_deref(), Some("19"));
        assert_eq!(store.get("realm", "/after").unwrap().as_deref(), Some("y"));
        assert_eq!(store.get("realm", "/gone").unwrap(), None);
    }
}
