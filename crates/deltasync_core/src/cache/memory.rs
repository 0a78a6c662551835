//! In-memory cache.

use crate::cache::Cache;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::query::Query;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory [`Cache`].
///
/// Entities are kept ordered by ID so that scans are deterministic.
/// Suitable for tests and for ephemeral stores.
///
/// Read and write failures can be switched on to exercise the engine's
/// local-storage error paths.
///
/// # Example
///
/// ```rust,ignore
/// let cache = MemoryCache::<Task>::new("tasks");
/// cache.update(task)?;
/// assert_eq!(cache.count()?, 1);
/// ```
pub struct MemoryCache<T> {
    collection: String,
    entities: RwLock<BTreeMap<String, T>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl<T: Entity> MemoryCache<T> {
    /// Creates an empty cache for a collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            entities: RwLock::new(BTreeMap::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent read fail with a storage error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent write fail with a storage error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns all cached IDs in order.
    pub fn ids(&self) -> Vec<String> {
        self.entities.read().keys().cloned().collect()
    }

    fn check_read(&self) -> CoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CoreError::storage(format!(
                "read from {} failed",
                self.collection
            )));
        }
        Ok(())
    }

    fn check_write(&self) -> CoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::storage(format!(
                "write to {} failed",
                self.collection
            )));
        }
        Ok(())
    }

    fn key_of(&self, entity: &T) -> CoreResult<String> {
        entity
            .id()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| CoreError::MissingId {
                collection: self.collection.clone(),
            })
    }
}

impl<T: Entity> Cache<T> for MemoryCache<T> {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn find_all(&self) -> CoreResult<Vec<T>> {
        self.check_read()?;
        Ok(self.entities.read().values().cloned().collect())
    }

    fn find_by_id(&self, id: &str) -> CoreResult<Option<T>> {
        self.check_read()?;
        Ok(self.entities.read().get(id).cloned())
    }

    fn find_by_ids(&self, ids: &[String]) -> CoreResult<Vec<T>> {
        self.check_read()?;
        let entities = self.entities.read();
        Ok(ids.iter().filter_map(|id| entities.get(id).cloned()).collect())
    }

    fn find_by_query(&self, query: &Query<T>) -> CoreResult<Vec<T>> {
        self.check_read()?;
        let entities = self.entities.read();
        Ok(query.apply(entities.values().cloned()))
    }

    fn save(&self, entity: T) -> CoreResult<T> {
        self.check_write()?;
        let key = self.key_of(&entity)?;
        let mut entities = self.entities.write();
        if entities.contains_key(&key) {
            return Err(CoreError::DuplicateId {
                collection: self.collection.clone(),
                id: key,
            });
        }
        entities.insert(key, entity.clone());
        Ok(entity)
    }

    fn update(&self, entity: T) -> CoreResult<T> {
        self.check_write()?;
        let key = self.key_of(&entity)?;
        self.entities.write().insert(key, entity.clone());
        Ok(entity)
    }

    fn delete_by_ids(&self, ids: &[String]) -> CoreResult<usize> {
        self.check_write()?;
        let mut entities = self.entities.write();
        Ok(ids.iter().filter(|id| entities.remove(*id).is_some()).count())
    }

    fn clear(&self, query: Option<&Query<T>>) -> CoreResult<usize> {
        self.check_write()?;
        let mut entities = self.entities.write();
        let before = entities.len();
        match query {
            Some(query) => entities.retain(|_, e| !query.matches(e)),
            None => entities.clear(),
        }
        Ok(before - entities.len())
    }

    fn refresh(&self, entities: &[T]) -> CoreResult<()> {
        self.check_write()?;
        let keyed = entities
            .iter()
            .map(|e| Ok((self.key_of(e)?, e.clone())))
            .collect::<CoreResult<Vec<_>>>()?;
        self.entities.write().extend(keyed);
        Ok(())
    }

    fn is_empty(&self) -> CoreResult<bool> {
        self.check_read()?;
        Ok(self.entities.read().is_empty())
    }

    fn count(&self) -> CoreResult<usize> {
        self.check_read()?;
        Ok(self.entities.read().len())
    }

    fn promote(&self, temp_id: &str, entity: T) -> CoreResult<T> {
        self.check_write()?;
        let key = self.key_of(&entity)?;
        let mut entities = self.entities.write();
        entities.remove(temp_id);
        entities.insert(key, entity.clone());
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::TempId;
    use crate::fixture::Doc;

    fn seeded() -> MemoryCache<Doc> {
        let cache = MemoryCache::new("docs");
        cache
            .refresh(&[
                Doc::with_id("a", "alpha"),
                Doc::with_id("b", "beta"),
                Doc::with_id("c", "gamma"),
            ])
            .unwrap();
        cache
    }

    #[test]
    fn empty_cache() {
        let cache: MemoryCache<Doc> = MemoryCache::new("docs");
        assert!(cache.is_empty().unwrap());
        assert_eq!(cache.count().unwrap(), 0);
        assert_eq!(cache.collection(), "docs");
    }

    #[test]
    fn save_rejects_missing_and_duplicate_ids() {
        let cache = seeded();
        assert!(matches!(
            cache.save(Doc::new("no id")),
            Err(CoreError::MissingId { .. })
        ));
        assert!(matches!(
            cache.save(Doc::with_id("a", "again")),
            Err(CoreError::DuplicateId { .. })
        ));
    }

    #[test]
    fn update_upserts() {
        let cache = seeded();
        cache.update(Doc::with_id("a", "changed")).unwrap();
        cache.update(Doc::with_id("z", "new")).unwrap();

        assert_eq!(cache.count().unwrap(), 4);
        assert_eq!(cache.find_by_id("a").unwrap().unwrap().title, "changed");
    }

    #[test]
    fn find_by_ids_skips_missing() {
        let cache = seeded();
        let found = cache
            .find_by_ids(&["c".into(), "missing".into(), "a".into()])
            .unwrap();
        let ids: Vec<_> = found.into_iter().map(|d| d.id.unwrap()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn clear_by_query_only_removes_matches() {
        let cache = seeded();
        let query = Query::filter("{}", |d: &Doc| d.title.ends_with('a'));
        assert_eq!(cache.clear(Some(&query)).unwrap(), 3);

        let cache = seeded();
        let query = Query::filter("{}", |d: &Doc| d.title == "beta");
        assert_eq!(cache.clear(Some(&query)).unwrap(), 1);
        assert_eq!(cache.ids(), vec!["a", "c"]);

        assert_eq!(cache.clear(None).unwrap(), 2);
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn delete_by_ids_counts_present() {
        let cache = seeded();
        let deleted = cache.delete_by_ids(&["a".into(), "nope".into()]).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(cache.ids(), vec!["b", "c"]);
    }

    #[test]
    fn promote_renames_record() {
        let cache: MemoryCache<Doc> = MemoryCache::new("docs");
        let temp = TempId::generate();
        cache.save(Doc::with_id(temp.as_str(), "draft")).unwrap();

        cache
            .promote(temp.as_str(), Doc::stored("server1", "draft", "0001"))
            .unwrap();

        assert_eq!(cache.ids(), vec!["server1"]);
        assert!(cache.find_by_id(temp.as_str()).unwrap().is_none());
    }

    #[test]
    fn injected_failures() {
        let cache = seeded();
        cache.set_fail_reads(true);
        assert!(matches!(cache.find_all(), Err(CoreError::Storage { .. })));
        cache.set_fail_reads(false);

        cache.set_fail_writes(true);
        assert!(cache.update(Doc::with_id("x", "x")).is_err());
        assert_eq!(cache.count().unwrap(), 3);
    }
}
