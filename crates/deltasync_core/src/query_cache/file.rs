//! File-backed query cache.

use crate::error::{CoreError, CoreResult};
use crate::query_cache::{QueryCacheItem, QueryCacheStore};
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const LOCK_SUFFIX: &str = "lock";
const TEMP_SUFFIX: &str = "tmp";

/// A [`QueryCacheStore`] persisted to a single CBOR file.
///
/// Fetch cursors survive process restarts. Every mutation rewrites the file
/// through a temporary sibling followed by a rename, so a crash leaves
/// either the old or the new contents.
///
/// # Locking
///
/// An exclusive lock on `<path>.lock` is held for the lifetime of the
/// store. Opening the same path twice fails with [`CoreError::Locked`].
pub struct FileQueryCache {
    path: PathBuf,
    items: RwLock<BTreeMap<(String, String), QueryCacheItem>>,
    /// Held to keep the exclusive lock.
    _lock_file: File,
}

impl FileQueryCache {
    /// Opens or creates the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_path = path.with_extension(LOCK_SUFFIX);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        lock_file.try_lock_exclusive().map_err(|_| CoreError::Locked {
            path: lock_path.display().to_string(),
        })?;

        let items = Self::load(&path)?;
        tracing::debug!(path = %path.display(), items = items.len(), "opened query cache");

        Ok(Self {
            path,
            items: RwLock::new(items),
            _lock_file: lock_file,
        })
    }

    /// Returns the path of the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> CoreResult<BTreeMap<(String, String), QueryCacheItem>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let items: Vec<QueryCacheItem> =
            ciborium::from_reader(reader).map_err(|e| CoreError::Codec(e.to_string()))?;

        Ok(items.into_iter().map(|item| (item.key(), item)).collect())
    }

    fn persist(&self, items: &BTreeMap<(String, String), QueryCacheItem>) -> CoreResult<()> {
        let temp_path = self.path.with_extension(TEMP_SUFFIX);
        let snapshot: Vec<&QueryCacheItem> = items.values().collect();

        {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            ciborium::into_writer(&snapshot, &mut writer)
                .map_err(|e| CoreError::Codec(e.to_string()))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl QueryCacheStore for FileQueryCache {
    fn get(&self, collection: &str, query: &str) -> CoreResult<Option<QueryCacheItem>> {
        Ok(self
            .items
            .read()
            .get(&(collection.to_string(), query.to_string()))
            .cloned())
    }

    fn set(&self, item: &QueryCacheItem) -> CoreResult<()> {
        let mut items = self.items.write();
        items.insert(item.key(), item.clone());
        self.persist(&items)
    }

    fn delete(&self, item: &QueryCacheItem) -> CoreResult<bool> {
        let mut items = self.items.write();
        let existed = items.remove(&item.key()).is_some();
        if existed {
            self.persist(&items)?;
        }
        Ok(existed)
    }

    fn items(&self) -> CoreResult<Vec<QueryCacheItem>> {
        Ok(self.items.read().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("query_cache.cbor");

        {
            let store = FileQueryCache::open(&path).unwrap();
            store.set(&QueryCacheItem::new("tasks", "", "0010")).unwrap();
            store
                .set(&QueryCacheItem::new("tasks", r#"query={"done":false}"#, "0011"))
                .unwrap();
        }

        let store = FileQueryCache::open(&path).unwrap();
        assert_eq!(store.items().unwrap().len(), 2);
        assert_eq!(
            store.get("tasks", "").unwrap().unwrap().last_request,
            "0010"
        );
    }

    #[test]
    fn delete_is_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qc.cbor");
        let item = QueryCacheItem::new("notes", "", "1");

        {
            let store = FileQueryCache::open(&path).unwrap();
            store.set(&item).unwrap();
            assert!(store.delete(&item).unwrap());
        }

        let store = FileQueryCache::open(&path).unwrap();
        assert!(store.get("notes", "").unwrap().is_none());
    }

    #[test]
    fn second_open_is_locked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qc.cbor");

        let _first = FileQueryCache::open(&path).unwrap();
        let second = FileQueryCache::open(&path);
        assert!(matches!(second, Err(CoreError::Locked { .. })));
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("qc.cbor");

        let store = FileQueryCache::open(&path).unwrap();
        store.set(&QueryCacheItem::new("a", "", "1")).unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn corrupt_file_is_codec_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qc.cbor");
        fs::write(&path, [0xFF, 0x00, 0x13]).unwrap();

        let result = FileQueryCache::open(&path);
        assert!(matches!(result, Err(CoreError::Codec(_))));
    }
}
