//! Per-query fetch bookkeeping for incremental sync.

mod file;

pub use file::FileQueryCache;

use crate::error::CoreResult;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The last successful fetch time for one `(collection, query)` pair.
///
/// Created by the first full fetch of a query with delta-set fetching
/// enabled, advanced by every successful incremental fetch, and deleted
/// when an incremental fetch fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCacheItem {
    /// Collection name.
    pub collection: String,
    /// Normalized backend query string (empty for the whole collection).
    pub query: String,
    /// Backend request start time of the last successful fetch.
    pub last_request: String,
}

impl QueryCacheItem {
    /// Creates an item.
    pub fn new(
        collection: impl Into<String>,
        query: impl Into<String>,
        last_request: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            query: query.into(),
            last_request: last_request.into(),
        }
    }

    /// Returns true if the item holds a usable cursor.
    pub fn has_cursor(&self) -> bool {
        !self.last_request.is_empty()
    }

    fn key(&self) -> (String, String) {
        (self.collection.clone(), self.query.clone())
    }
}

/// Storage for [`QueryCacheItem`]s.
pub trait QueryCacheStore: Send + Sync {
    /// Returns the item for a collection and normalized query.
    fn get(&self, collection: &str, query: &str) -> CoreResult<Option<QueryCacheItem>>;

    /// Inserts or replaces an item.
    fn set(&self, item: &QueryCacheItem) -> CoreResult<()>;

    /// Deletes an item. Returns true if it existed.
    fn delete(&self, item: &QueryCacheItem) -> CoreResult<bool>;

    /// Returns every stored item.
    fn items(&self) -> CoreResult<Vec<QueryCacheItem>>;
}

/// An in-memory [`QueryCacheStore`]. State is lost when dropped.
#[derive(Default)]
pub struct MemoryQueryCache {
    items: RwLock<BTreeMap<(String, String), QueryCacheItem>>,
}

impl MemoryQueryCache {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns true if no item is stored.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl QueryCacheStore for MemoryQueryCache {
    fn get(&self, collection: &str, query: &str) -> CoreResult<Option<QueryCacheItem>> {
        Ok(self
            .items
            .read()
            .get(&(collection.to_string(), query.to_string()))
            .cloned())
    }

    fn set(&self, item: &QueryCacheItem) -> CoreResult<()> {
        self.items.write().insert(item.key(), item.clone());
        Ok(())
    }

    fn delete(&self, item: &QueryCacheItem) -> CoreResult<bool> {
        Ok(self.items.write().remove(&item.key()).is_some())
    }

    fn items(&self) -> CoreResult<Vec<QueryCacheItem>> {
        Ok(self.items.read().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete() {
        let store = MemoryQueryCache::new();
        let item = QueryCacheItem::new("tasks", "", "0007");

        assert!(store.get("tasks", "").unwrap().is_none());
        store.set(&item).unwrap();
        assert_eq!(store.get("tasks", "").unwrap(), Some(item.clone()));

        assert!(store.delete(&item).unwrap());
        assert!(!store.delete(&item).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn keyed_by_collection_and_query() {
        let store = MemoryQueryCache::new();
        store.set(&QueryCacheItem::new("tasks", "", "1")).unwrap();
        store
            .set(&QueryCacheItem::new("tasks", r#"query={"done":true}"#, "2"))
            .unwrap();
        store.set(&QueryCacheItem::new("notes", "", "3")).unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(
            store.get("tasks", r#"query={"done":true}"#).unwrap().unwrap().last_request,
            "2"
        );
    }

    #[test]
    fn set_replaces_cursor() {
        let store = MemoryQueryCache::new();
        let mut item = QueryCacheItem::new("tasks", "", "1");
        store.set(&item).unwrap();
        item.last_request = "9".into();
        store.set(&item).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("tasks", "").unwrap().unwrap().last_request, "9");
    }

    #[test]
    fn empty_cursor() {
        assert!(!QueryCacheItem::new("tasks", "", "").has_cursor());
        assert!(QueryCacheItem::new("tasks", "", "1").has_cursor());
    }
}
