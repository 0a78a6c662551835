//! Read policy coordinator and incremental fetch.

use crate::config::DeltaStrategy;
use crate::context::StoreContext;
use crate::delta;
use crate::error::{NetworkErrorKind, SyncError, SyncResult};
use crate::policy::ReadPolicy;
use deltasync_core::{is_temp_id, Entity, Query, QueryCacheItem};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// What a find selects.
pub enum FindRequest<T> {
    /// Entities matching a query.
    Query(Query<T>),
    /// Entities with the given IDs.
    Ids(Vec<String>),
}

impl<T> FindRequest<T> {
    /// Every entity of the collection.
    pub fn all() -> Self {
        Self::Query(Query::all())
    }
}

impl<T> From<Query<T>> for FindRequest<T> {
    fn from(query: Query<T>) -> Self {
        Self::Query(query)
    }
}

impl<T> Clone for FindRequest<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Query(query) => Self::Query(query.clone()),
            Self::Ids(ids) => Self::Ids(ids.clone()),
        }
    }
}

/// Result of a network find.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkReadResponse<T> {
    /// Entities fetched. For an incremental fetch, only the changed ones.
    pub entities: Vec<T>,
    /// Number of entities fetched and applied to the cache.
    pub pull_count: usize,
    /// Number of cached entities removed.
    pub deleted_count: usize,
    /// Whether the fetch was incremental.
    pub delta_fetched: bool,
}

impl<T> NetworkReadResponse<T> {
    fn full(entities: Vec<T>, deleted_count: usize) -> Self {
        Self {
            pull_count: entities.len(),
            entities,
            deleted_count,
            delta_fetched: false,
        }
    }

    fn delta(entities: Vec<T>, deleted_count: usize) -> Self {
        Self {
            delta_fetched: true,
            ..Self::full(entities, deleted_count)
        }
    }
}

/// Result of [`ReadCoordinator::find`].
#[derive(Debug)]
pub struct FindResult<T> {
    /// Cache result, if the policy read the cache. `None` under `BOTH`
    /// when the read failed and the error went to a delegate.
    pub local: Option<Vec<T>>,
    /// Backend result, if the network leg succeeded.
    pub network: Option<NetworkReadResponse<T>>,
    /// Network failure absorbed by `NETWORK_OTHERWISE_LOCAL`.
    pub network_error: Option<SyncError>,
}

impl<T> FindResult<T> {
    /// Returns the most authoritative entities: the backend's if fetched,
    /// else the cache's.
    pub fn entities(&self) -> &[T] {
        match (&self.network, &self.local) {
            (Some(network), _) => &network.entities,
            (None, Some(local)) => local,
            (None, None) => &[],
        }
    }

    /// Consumes the result, returning [`FindResult::entities`].
    pub fn into_entities(self) -> Vec<T> {
        match (self.network, self.local) {
            (Some(network), _) => network.entities,
            (None, Some(local)) => local,
            (None, None) => Vec::new(),
        }
    }
}

/// Receives find results instead of the caller's return path.
pub trait FindDelegate<T>: Send + Sync {
    /// Called with each delivered result. `BOTH` delivers twice.
    fn on_success(&self, entities: &[T]);

    /// Called with the failure that ended the find.
    fn on_error(&self, error: &SyncError);
}

/// Executes finds under a [`ReadPolicy`], reconciling the cache with the
/// backend.
///
/// # Network finds
///
/// A plain fetch replaces the cached scope of the query with the backend
/// result. With delta-set fetching enabled and no skip or limit modifier,
/// a query that was fetched before is instead fetched incrementally from
/// the cursor stored in the query cache:
///
/// 1. No cursor, or an empty cache: plain fetch, then store the cursor.
/// 2. Cursor: apply the backend's changes and deletions, advance the cursor.
/// 3. Incremental fetch failed: drop the cursor. Fall back to step 1 if the
///    error [requires a full refetch](SyncError::requires_full_refetch),
///    else propagate.
pub struct ReadCoordinator<T: Entity> {
    ctx: StoreContext<T>,
}

impl<T: Entity> ReadCoordinator<T> {
    /// Creates a coordinator.
    pub fn new(ctx: StoreContext<T>) -> Self {
        Self { ctx }
    }

    /// Executes a find.
    pub fn find(&self, request: &FindRequest<T>, policy: ReadPolicy) -> SyncResult<FindResult<T>> {
        self.execute(request, policy, None)
    }

    /// Executes a find, routing results and errors to `delegate`.
    ///
    /// Returns `None` if the find failed; the error went to the delegate.
    pub fn find_with(
        &self,
        request: &FindRequest<T>,
        policy: ReadPolicy,
        delegate: &dyn FindDelegate<T>,
    ) -> Option<FindResult<T>> {
        match self.execute(request, policy, Some(delegate)) {
            Ok(result) => {
                delegate.on_success(result.entities());
                Some(result)
            }
            Err(err) => {
                delegate.on_error(&err);
                None
            }
        }
    }

    fn execute(
        &self,
        request: &FindRequest<T>,
        policy: ReadPolicy,
        delegate: Option<&dyn FindDelegate<T>>,
    ) -> SyncResult<FindResult<T>> {
        debug!(collection = self.ctx.collection(), policy = %policy, "find");

        match policy {
            ReadPolicy::ForceLocal => Ok(FindResult {
                local: Some(self.find_local(request)?),
                network: None,
                network_error: None,
            }),
            ReadPolicy::ForceNetwork => Ok(FindResult {
                local: None,
                network: Some(self.find_network(request)?),
                network_error: None,
            }),
            ReadPolicy::Both => {
                let local = match (self.find_local(request), delegate) {
                    (Ok(local), Some(delegate)) => {
                        delegate.on_success(&local);
                        Some(local)
                    }
                    (Ok(local), None) => Some(local),
                    (Err(err), Some(delegate)) => {
                        warn!(
                            collection = self.ctx.collection(),
                            error = %err,
                            "local find failed, continuing with network"
                        );
                        delegate.on_error(&err);
                        None
                    }
                    (Err(err), None) => return Err(err),
                };
                Ok(FindResult {
                    local,
                    network: Some(self.find_network(request)?),
                    network_error: None,
                })
            }
            ReadPolicy::NetworkOtherwiseLocal => match self.find_network(request) {
                Ok(network) => Ok(FindResult {
                    local: None,
                    network: Some(network),
                    network_error: None,
                }),
                Err(err @ SyncError::Network { .. }) => {
                    warn!(
                        collection = self.ctx.collection(),
                        error = %err,
                        "network find failed, reading cache"
                    );
                    Ok(FindResult {
                        local: Some(self.find_local(request)?),
                        network: None,
                        network_error: Some(err),
                    })
                }
                Err(err) => Err(err),
            },
        }
    }

    /// Reads from the cache only.
    pub fn find_local(&self, request: &FindRequest<T>) -> SyncResult<Vec<T>> {
        let cache = self.ctx.cache();
        Ok(match request {
            FindRequest::Query(query) => cache.find_by_query(query)?,
            FindRequest::Ids(ids) => cache.find_by_ids(ids)?,
        })
    }

    /// Reads from the cache, routing a failure to `delegate`.
    ///
    /// Returns `None` if the read failed.
    pub fn find_local_with(
        &self,
        request: &FindRequest<T>,
        delegate: &dyn FindDelegate<T>,
    ) -> Option<Vec<T>> {
        match self.find_local(request) {
            Ok(entities) => {
                delegate.on_success(&entities);
                Some(entities)
            }
            Err(err) => {
                delegate.on_error(&err);
                None
            }
        }
    }

    /// Reads from the backend and reconciles the cache.
    pub fn find_network(&self, request: &FindRequest<T>) -> SyncResult<NetworkReadResponse<T>> {
        match request {
            FindRequest::Ids(ids) => self.fetch_ids(ids),
            FindRequest::Query(query) => self.find_network_query(query),
        }
    }

    fn find_network_query(&self, query: &Query<T>) -> SyncResult<NetworkReadResponse<T>> {
        let config = self.ctx.config();
        if !config.delta_set_fetching || query.has_modifiers() {
            return self.plain_fetch(query, false);
        }

        let query_string = query.to_query_string();
        let item = self
            .ctx
            .query_cache()
            .get(self.ctx.collection(), &query_string)?
            .filter(QueryCacheItem::has_cursor);

        let item = match item {
            Some(item) if !self.ctx.cache().is_empty()? => item,
            _ => return self.plain_fetch(query, true),
        };

        let outcome = match config.delta_strategy {
            DeltaStrategy::ServerDeltaSet => self.delta_set_fetch(query, &item),
            DeltaStrategy::IdDiff => self.id_diff_fetch(query, &item),
        };

        match outcome {
            Ok(response) => Ok(response),
            Err(err) => {
                if let Err(cleanup) = self.ctx.query_cache().delete(&item) {
                    warn!(
                        collection = self.ctx.collection(),
                        error = %cleanup,
                        "failed to drop query cache item"
                    );
                }
                if err.requires_full_refetch() {
                    info!(
                        collection = self.ctx.collection(),
                        error = %err,
                        "incremental fetch rejected, refetching"
                    );
                    self.plain_fetch(query, true)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Fetches the whole query result and replaces its cached scope.
    ///
    /// When `record` is set, the request start becomes the query's cursor.
    fn plain_fetch(&self, query: &Query<T>, record: bool) -> SyncResult<NetworkReadResponse<T>> {
        let response = self.ctx.network().find(self.ctx.collection(), query)?;
        let entities = response.body;

        let removed = if query.has_modifiers() {
            self.ctx.cache().refresh(&entities)?;
            0
        } else {
            self.replace_scope(query, &entities)?
        };

        if record {
            self.ctx.query_cache().set(&QueryCacheItem::new(
                self.ctx.collection(),
                query.to_query_string(),
                response.request_start,
            ))?;
        }

        debug!(
            collection = self.ctx.collection(),
            fetched = entities.len(),
            removed,
            "plain fetch"
        );
        Ok(NetworkReadResponse::full(entities, removed))
    }

    /// Deletes cached entities in the query's scope that the backend did not
    /// return, then upserts the backend result. Entities with pending writes
    /// are kept.
    fn replace_scope(&self, query: &Query<T>, entities: &[T]) -> SyncResult<usize> {
        let pending = self.pending_ids()?;
        let fetched: HashSet<&str> = entities.iter().filter_map(|e| e.id()).collect();

        let stale: Vec<String> = self
            .ctx
            .cache()
            .find_all()?
            .iter()
            .filter(|e| query.matches(e))
            .filter_map(|e| e.id())
            .filter(|id| !fetched.contains(id) && !pending.contains(*id))
            .map(str::to_string)
            .collect();

        let removed = self.ctx.cache().delete_by_ids(&stale)?;
        self.ctx.cache().refresh(entities)?;
        Ok(removed)
    }

    fn delta_set_fetch(
        &self,
        query: &Query<T>,
        item: &QueryCacheItem,
    ) -> SyncResult<NetworkReadResponse<T>> {
        let response =
            self.ctx
                .network()
                .delta_set(self.ctx.collection(), &item.last_request, query)?;
        let delta = response.body;

        if delta.changed.len() > self.ctx.config().max_delta_set_size {
            warn!(
                collection = self.ctx.collection(),
                changed = delta.changed.len(),
                "delta set larger than expected"
            );
        }

        let deleted_ids: Vec<String> = delta.deleted.into_iter().map(|d| d.id).collect();
        let deleted_count = self.ctx.cache().delete_by_ids(&deleted_ids)?;
        self.ctx.cache().refresh(&delta.changed)?;
        self.advance_cursor(item, response.request_start)?;

        debug!(
            collection = self.ctx.collection(),
            changed = delta.changed.len(),
            deleted = deleted_count,
            "delta set applied"
        );
        Ok(NetworkReadResponse::delta(delta.changed, deleted_count))
    }

    fn id_diff_fetch(
        &self,
        query: &Query<T>,
        item: &QueryCacheItem,
    ) -> SyncResult<NetworkReadResponse<T>> {
        let info = self.ctx.network().fetch_info(self.ctx.collection(), query)?;
        let cached: Vec<T> = self
            .ctx
            .cache()
            .find_all()?
            .into_iter()
            .filter(|e| query.matches(e))
            .collect();

        let plan = delta::plan(&info.body, &cached, self.ctx.config());
        let deleted_count = self.ctx.cache().delete_by_ids(&plan.to_delete)?;

        let (changed, batched) = if plan.to_fetch.is_empty() {
            (Vec::new(), true)
        } else if plan.requires_full_fetch() {
            debug!(
                collection = self.ctx.collection(),
                total = plan.network_total,
                "every entity changed, fetching all"
            );
            (self.ctx.network().find(self.ctx.collection(), query)?.body, false)
        } else {
            (self.fetch_batches(&plan.to_fetch)?, true)
        };

        self.ctx.cache().refresh(&changed)?;
        self.advance_cursor(item, info.request_start)?;

        debug!(
            collection = self.ctx.collection(),
            fetched = changed.len(),
            deleted = deleted_count,
            unchanged = plan.unchanged,
            "id diff applied"
        );
        Ok(if batched {
            NetworkReadResponse::delta(changed, deleted_count)
        } else {
            NetworkReadResponse::full(changed, deleted_count)
        })
    }

    /// Fetches entities by ID in sequential batches.
    fn fetch_batches(&self, ids: &[String]) -> SyncResult<Vec<T>> {
        let mut fetched = Vec::with_capacity(ids.len());
        for batch in ids.chunks(self.ctx.config().id_batch_size) {
            let query = Query::ids_in(batch);
            let response = self.ctx.network().find(self.ctx.collection(), &query)?;
            fetched.extend(response.body);
        }
        Ok(fetched)
    }

    /// Fetches each ID in turn and replaces exactly those IDs in the cache.
    ///
    /// Temporary IDs are never sent. An ID the backend does not know is
    /// removed from the cache unless it has a pending write.
    fn fetch_ids(&self, ids: &[String]) -> SyncResult<NetworkReadResponse<T>> {
        let pending = self.pending_ids()?;
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();

        for id in ids.iter().filter(|id| !is_temp_id(id)) {
            match self.ctx.network().find_by_id(self.ctx.collection(), id) {
                Ok(response) => found.push(response.body),
                Err(err) if err.network_kind() == Some(NetworkErrorKind::EntityNotFound) => {
                    if !pending.contains(id) {
                        missing.push(id.clone());
                    }
                }
                Err(err) => return Err(err),
            }
        }

        let removed = self.ctx.cache().delete_by_ids(&missing)?;
        self.ctx.cache().refresh(&found)?;
        Ok(NetworkReadResponse::full(found, removed))
    }

    fn pending_ids(&self) -> SyncResult<HashSet<String>> {
        Ok(self
            .ctx
            .queue()
            .pending(self.ctx.collection(), usize::MAX)?
            .into_iter()
            .map(|action| action.entity_id)
            .collect())
    }

    fn advance_cursor(&self, item: &QueryCacheItem, request_start: String) -> SyncResult<()> {
        let next = QueryCacheItem {
            last_request: request_start,
            ..item.clone()
        };
        self.ctx.query_cache().set(&next)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendOp;
    use crate::config::SyncConfig;
    use crate::policy::WritePolicy;
    use crate::sync::DataSync;
    use crate::testing::{Harness, Note, NOTES};
    use crate::write::WriteCoordinator;
    use deltasync_core::{
        Cache, CoreError, CoreResult, MemoryQueryCache, PendingWriteAction, QueryCacheStore,
        SyncQueue, WriteOperation,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn reader(h: &Harness) -> ReadCoordinator<Note> {
        ReadCoordinator::new(h.context.clone())
    }

    fn cursor(h: &Harness) -> Option<String> {
        h.query_cache
            .get(NOTES, "")
            .unwrap()
            .map(|item| item.last_request)
    }

    #[derive(Default)]
    struct Recorder {
        successes: Mutex<Vec<usize>>,
        errors: Mutex<Vec<String>>,
    }

    impl FindDelegate<Note> for Recorder {
        fn on_success(&self, entities: &[Note]) {
            self.successes.lock().push(entities.len());
        }

        fn on_error(&self, error: &SyncError) {
            self.errors.lock().push(error.to_string());
        }
    }

    /// Query cache whose deletes always fail.
    #[derive(Default)]
    struct UndeletableQueryCache {
        inner: MemoryQueryCache,
    }

    impl QueryCacheStore for UndeletableQueryCache {
        fn get(&self, collection: &str, query: &str) -> CoreResult<Option<QueryCacheItem>> {
            self.inner.get(collection, query)
        }

        fn set(&self, item: &QueryCacheItem) -> CoreResult<()> {
            self.inner.set(item)
        }

        fn delete(&self, _item: &QueryCacheItem) -> CoreResult<bool> {
            Err(CoreError::storage("query cache is read-only"))
        }

        fn items(&self) -> CoreResult<Vec<QueryCacheItem>> {
            self.inner.items()
        }
    }

    #[test]
    fn plain_fetch_without_delta_records_no_cursor() {
        let h = Harness::new(SyncConfig::new());
        h.seed_remote(&["a", "b"]);

        let response = reader(&h).find_network(&FindRequest::all()).unwrap();
        assert_eq!(response.pull_count, 2);
        assert!(!response.delta_fetched);
        assert_eq!(h.cache.count().unwrap(), 2);
        assert!(h.query_cache.is_empty());
    }

    #[test]
    fn first_delta_find_is_full_and_records_cursor() {
        let h = Harness::delta();
        h.seed_remote(&["a", "b", "c"]);

        let response = reader(&h).find_network(&FindRequest::all()).unwrap();
        assert_eq!(response.pull_count, 3);
        assert!(!response.delta_fetched);
        assert!(cursor(&h).is_some());
        assert_eq!(h.backend.call_count(BackendOp::DeltaSet), 0);
    }

    #[test]
    fn second_delta_find_pulls_nothing() {
        let h = Harness::delta();
        h.seed_remote(&["a", "b"]);
        let r = reader(&h);

        r.find_network(&FindRequest::all()).unwrap();
        let first_cursor = cursor(&h);
        let response = r.find_network(&FindRequest::all()).unwrap();

        assert!(response.delta_fetched);
        assert_eq!(response.pull_count, 0);
        assert!(cursor(&h) > first_cursor);
    }

    #[test]
    fn delta_applies_changes_and_deletions() {
        let h = Harness::delta();
        let seeded = h.seed_remote(&["a", "b", "c"]);
        let r = reader(&h);
        r.find_network(&FindRequest::all()).unwrap();

        h.backend
            .modify(NOTES, seeded[0].id().unwrap(), |n| n.title = "a2".into());
        h.backend.remove(NOTES, seeded[1].id().unwrap());

        let response = r.find_network(&FindRequest::all()).unwrap();
        assert_eq!(response.pull_count, 1);
        assert_eq!(response.deleted_count, 1);
        assert_eq!(response.entities[0].title, "a2");
        assert_eq!(h.cache.count().unwrap(), 2);
    }

    #[test]
    fn empty_cache_forces_full_fetch() {
        let h = Harness::delta();
        h.seed_remote(&["a"]);
        let r = reader(&h);
        r.find_network(&FindRequest::all()).unwrap();

        h.cache.clear(None).unwrap();
        let response = r.find_network(&FindRequest::all()).unwrap();
        assert!(!response.delta_fetched);
        assert_eq!(response.pull_count, 1);
    }

    #[test]
    fn fallback_errors_refetch_and_reseed() {
        for kind in [
            NetworkErrorKind::ResultSetSizeExceeded,
            NetworkErrorKind::ParameterValueOutOfRange,
            NetworkErrorKind::MissingConfiguration,
        ] {
            let h = Harness::delta();
            h.seed_remote(&["a", "b"]);
            let r = reader(&h);
            r.find_network(&FindRequest::all()).unwrap();
            let seeded_cursor = cursor(&h);

            h.backend.fail_next(BackendOp::DeltaSet, kind);
            let response = r.find_network(&FindRequest::all()).unwrap();

            assert!(!response.delta_fetched, "{kind:?}");
            assert_eq!(response.pull_count, 2);
            assert!(cursor(&h) > seeded_cursor);
        }
    }

    #[test]
    fn other_delta_errors_propagate_and_drop_cursor() {
        let h = Harness::delta();
        h.seed_remote(&["a"]);
        let r = reader(&h);
        r.find_network(&FindRequest::all()).unwrap();

        h.backend.fail_next(BackendOp::DeltaSet, NetworkErrorKind::Unauthorized);
        let err = r.find_network(&FindRequest::all()).unwrap_err();

        assert_eq!(err.network_kind(), Some(NetworkErrorKind::Unauthorized));
        assert!(cursor(&h).is_none());
        assert_eq!(h.cache.count().unwrap(), 1);
    }

    #[test]
    fn query_cache_cleanup_failure_keeps_network_error() {
        let h = Harness::delta();
        h.seed_remote(&["a", "b"]);
        let ctx = StoreContext::new(
            h.cache.clone(),
            h.backend.clone(),
            h.queue.clone(),
            Arc::new(UndeletableQueryCache::default()),
        )
        .with_config(h.context.config().clone());
        let r = ReadCoordinator::new(ctx);
        r.find_network(&FindRequest::all()).unwrap();

        // Fallback still happens
        h.backend
            .fail_next(BackendOp::DeltaSet, NetworkErrorKind::ResultSetSizeExceeded);
        let response = r.find_network(&FindRequest::all()).unwrap();
        assert!(!response.delta_fetched);
        assert_eq!(response.pull_count, 2);

        // Other errors surface unchanged
        h.backend.fail_next(BackendOp::DeltaSet, NetworkErrorKind::Unauthorized);
        let err = r.find_network(&FindRequest::all()).unwrap_err();
        assert_eq!(err.network_kind(), Some(NetworkErrorKind::Unauthorized));
    }

    #[test]
    fn paged_query_never_uses_delta() {
        let h = Harness::delta();
        h.seed_remote(&["a", "b", "c", "d"]);
        let r = reader(&h);
        let page = FindRequest::Query(Query::all().skip(1).limit(2));

        let first = r.find_network(&page).unwrap();
        let second = r.find_network(&page).unwrap();

        assert_eq!(first.pull_count, 2);
        assert_eq!(second.entities, first.entities);
        assert!(!second.delta_fetched);
        assert_eq!(h.backend.call_count(BackendOp::DeltaSet), 0);
        assert!(h.query_cache.is_empty());
    }

    #[test]
    fn plain_fetch_replaces_scope_but_keeps_pending() {
        let h = Harness::new(SyncConfig::new());
        h.seed_remote(&["remote"]);
        h.cache.update(Note::stored("stale", "x", "0001")).unwrap();
        h.cache.update(Note::with_id("offline", "y")).unwrap();
        h.queue
            .enqueue(PendingWriteAction::new(NOTES, "offline", WriteOperation::Create))
            .unwrap();

        let response = reader(&h).find_network(&FindRequest::all()).unwrap();
        assert_eq!(response.deleted_count, 1);
        assert!(h.cache.find_by_id("stale").unwrap().is_none());
        assert!(h.cache.find_by_id("offline").unwrap().is_some());
    }

    #[test]
    fn plain_fetch_scope_is_the_query_filter() {
        let h = Harness::new(SyncConfig::new());
        h.cache.update(Note::stored("x", "other", "0001")).unwrap();
        h.cache.update(Note::stored("y", "mine", "0001")).unwrap();

        let query = Query::filter(r#"{"title":"mine"}"#, |n: &Note| n.title == "mine");
        reader(&h).find_network(&FindRequest::Query(query)).unwrap();

        assert_eq!(h.cache.ids(), vec!["x"]);
    }

    #[test]
    fn id_diff_fetches_changed_in_batches() {
        let h = Harness::new(
            SyncConfig::new()
                .with_delta_set_fetching(true)
                .with_delta_strategy(DeltaStrategy::IdDiff)
                .with_id_batch_size(2),
        );
        let seeded = h.seed_remote(&["a", "b", "c", "d", "e", "f"]);
        let r = reader(&h);
        r.find_network(&FindRequest::all()).unwrap();

        for note in &seeded[..3] {
            h.backend.modify(NOTES, note.id().unwrap(), |n| n.title.push('!'));
        }
        h.backend.remove(NOTES, seeded[5].id().unwrap());
        h.backend.clear_calls();

        let response = r.find_network(&FindRequest::all()).unwrap();
        assert!(response.delta_fetched);
        assert_eq!(response.pull_count, 3);
        assert_eq!(response.deleted_count, 1);
        assert_eq!(h.backend.call_count(BackendOp::FetchInfo), 1);
        assert_eq!(h.backend.call_count(BackendOp::Find), 2);
        assert_eq!(h.cache.count().unwrap(), 5);
    }

    #[test]
    fn id_diff_all_changed_refetches_everything() {
        let h = Harness::new(
            SyncConfig::new()
                .with_delta_set_fetching(true)
                .with_delta_strategy(DeltaStrategy::IdDiff),
        );
        let seeded = h.seed_remote(&["a", "b"]);
        let r = reader(&h);
        r.find_network(&FindRequest::all()).unwrap();

        for note in &seeded {
            h.backend.modify(NOTES, note.id().unwrap(), |n| n.title.push('!'));
        }
        h.backend.clear_calls();

        let response = r.find_network(&FindRequest::all()).unwrap();
        assert_eq!(response.pull_count, 2);
        assert!(!response.delta_fetched);
        let finds: Vec<_> = h
            .backend
            .calls()
            .into_iter()
            .filter(|c| c.op == BackendOp::Find)
            .collect();
        assert_eq!(finds.len(), 1);
        assert_eq!(finds[0].target, "");
    }

    #[test]
    fn id_list_replaces_only_those_ids() {
        let h = Harness::new(SyncConfig::new());
        let seeded = h.seed_remote(&["a", "b"]);
        h.cache.update(Note::stored("untouched", "z", "0001")).unwrap();
        h.cache.update(Note::stored("vanished", "v", "0001")).unwrap();

        let ids = vec![
            seeded[0].id.clone().unwrap(),
            "vanished".to_string(),
        ];
        let response = reader(&h).find_network(&FindRequest::Ids(ids)).unwrap();

        assert_eq!(response.pull_count, 1);
        assert_eq!(response.deleted_count, 1);
        assert_eq!(h.backend.call_count(BackendOp::FindById), 2);
        assert!(h.cache.find_by_id("untouched").unwrap().is_some());
        assert!(h.cache.find_by_id("vanished").unwrap().is_none());
    }

    #[test]
    fn id_list_keeps_entities_with_pending_writes() {
        let h = Harness::new(SyncConfig::new());
        let writer = WriteCoordinator::new(h.context.clone());
        let draft = writer.save(Note::new("offline"), WritePolicy::ForceLocal).unwrap();
        let temp_id = draft.id.clone().unwrap();
        h.cache.update(Note::stored("queued", "q", "0001")).unwrap();
        h.queue
            .enqueue(PendingWriteAction::new(NOTES, "queued", WriteOperation::Update))
            .unwrap();

        let ids = vec![temp_id.clone(), "queued".to_string()];
        let result = reader(&h)
            .find(&FindRequest::Ids(ids), ReadPolicy::ForceNetwork)
            .unwrap();

        let network = result.network.unwrap();
        assert_eq!(network.deleted_count, 0);
        assert_eq!(h.backend.call_count(BackendOp::FindById), 1);
        assert!(h.cache.find_by_id(&temp_id).unwrap().is_some());
        assert!(h.cache.find_by_id("queued").unwrap().is_some());

        // The offline create can still be pushed
        h.queue.remove(h.queue.snapshot()[1].action_id).unwrap();
        let pushed = DataSync::new(h.context.clone()).push().unwrap();
        assert_eq!(pushed.push_count, 1);
        assert!(pushed.is_complete());
        assert_eq!(h.backend.count(NOTES), 1);
    }

    #[test]
    fn force_local_never_touches_network() {
        let h = Harness::delta();
        h.cache.update(Note::stored("a", "a", "1")).unwrap();

        let result = reader(&h).find(&FindRequest::all(), ReadPolicy::ForceLocal).unwrap();
        assert_eq!(result.entities().len(), 1);
        assert!(h.backend.calls().is_empty());
    }

    #[test]
    fn both_delivers_local_then_network() {
        let h = Harness::delta();
        h.seed_remote(&["a", "b"]);
        h.cache.update(Note::stored("old", "x", "0000")).unwrap();
        let recorder = Recorder::default();

        let result = reader(&h)
            .find_with(&FindRequest::all(), ReadPolicy::Both, &recorder)
            .unwrap();

        assert_eq!(result.local.as_ref().unwrap().len(), 1);
        assert_eq!(result.network.as_ref().unwrap().pull_count, 2);
        assert_eq!(*recorder.successes.lock(), vec![1, 2]);
        assert!(recorder.errors.lock().is_empty());
    }

    #[test]
    fn both_reports_local_error_and_still_fetches() {
        let h = Harness::new(SyncConfig::new());
        let ids: Vec<String> = h
            .seed_remote(&["a", "b"])
            .into_iter()
            .filter_map(|n| n.id)
            .collect();
        h.cache.set_fail_reads(true);
        let recorder = Recorder::default();
        let r = reader(&h);

        let result = r
            .find_with(&FindRequest::Ids(ids.clone()), ReadPolicy::Both, &recorder)
            .unwrap();
        assert!(result.local.is_none());
        assert_eq!(result.network.as_ref().unwrap().pull_count, 2);
        assert_eq!(recorder.errors.lock().len(), 1);
        assert_eq!(*recorder.successes.lock(), vec![2]);
        assert_eq!(h.backend.call_count(BackendOp::FindById), 2);

        // Without a delegate the caller gets the error
        h.backend.clear_calls();
        assert!(matches!(
            r.find(&FindRequest::Ids(ids), ReadPolicy::Both),
            Err(SyncError::Cache(_))
        ));
        assert!(h.backend.calls().is_empty());
    }

    #[test]
    fn network_otherwise_local_falls_back() {
        let h = Harness::delta();
        h.cache.update(Note::stored("a", "a", "1")).unwrap();
        h.backend.set_online(false);

        let result = reader(&h)
            .find(&FindRequest::all(), ReadPolicy::NetworkOtherwiseLocal)
            .unwrap();
        assert!(result.network.is_none());
        assert!(result.network_error.is_some());
        assert_eq!(result.into_entities().len(), 1);
    }

    #[test]
    fn local_errors_go_to_delegate_not_caller() {
        let h = Harness::delta();
        h.cache.set_fail_reads(true);
        let recorder = Recorder::default();

        let r = reader(&h);
        assert!(r.find_local_with(&FindRequest::all(), &recorder).is_none());
        assert!(r
            .find_with(&FindRequest::all(), ReadPolicy::ForceLocal, &recorder)
            .is_none());
        assert_eq!(recorder.errors.lock().len(), 2);
        assert!(recorder.successes.lock().is_empty());

        assert!(matches!(
            r.find(&FindRequest::all(), ReadPolicy::ForceLocal),
            Err(SyncError::Cache(_))
        ));
    }
}
