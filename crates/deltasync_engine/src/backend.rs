//! In-process backend.
//!
//! [`MemoryBackend`] implements [`NetworkClient`] over plain maps so that the
//! coordinators can be exercised without a transport. It keeps enough server
//! behavior to drive every reconciliation path:
//!
//! - A logical clock. Every request and every write takes a tick, rendered
//!   as a fixed-width decimal so that lexical order equals clock order.
//! - Tombstones for deleted entities, reported by delta sets.
//! - A delta-set size limit, a tombstone retention horizon and a delta
//!   support toggle, each producing the matching backend error.
//! - One-shot failure injection per operation and an online switch.
//! - A call log.

use crate::error::{NetworkErrorKind, SyncError, SyncResult};
use crate::network::{DeletedEntity, DeltaSetResponse, FetchInfo, NetworkClient, NetworkResponse};
use deltasync_core::{is_temp_id, Entity, Metadata, Query};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// A backend operation, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    /// Query fetch.
    Find,
    /// Fetch by ID.
    FindById,
    /// ID and timestamp fetch.
    FetchInfo,
    /// POST.
    Create,
    /// PUT.
    Update,
    /// DELETE.
    Delete,
    /// Delta-set fetch.
    DeltaSet,
}

/// One request received by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCall {
    /// Operation.
    pub op: BackendOp,
    /// Target collection.
    pub collection: String,
    /// Entity ID or query string.
    pub target: String,
}

struct Tombstone {
    id: String,
    deleted_at: u64,
}

struct RemoteCollection<T> {
    entities: BTreeMap<String, T>,
    tombstones: Vec<Tombstone>,
}

impl<T> Default for RemoteCollection<T> {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
            tombstones: Vec::new(),
        }
    }
}

struct BackendState<T> {
    clock: u64,
    next_id: u64,
    collections: HashMap<String, RemoteCollection<T>>,
    delta_enabled: bool,
    max_delta_size: Option<usize>,
    horizon: u64,
    online: bool,
    failures: HashMap<BackendOp, NetworkErrorKind>,
    calls: Vec<BackendCall>,
}

/// An in-memory [`NetworkClient`].
///
/// # Example
///
/// ```rust,ignore
/// let backend = MemoryBackend::<Task>::new();
/// backend.insert("tasks", Task::new("remote"));
/// backend.fail_next(BackendOp::DeltaSet, NetworkErrorKind::ResultSetSizeExceeded);
/// ```
pub struct MemoryBackend<T> {
    state: Mutex<BackendState<T>>,
}

impl<T: Entity> MemoryBackend<T> {
    /// Creates an empty, online backend with delta sets enabled.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BackendState {
                clock: 0,
                next_id: 0,
                collections: HashMap::new(),
                delta_enabled: true,
                max_delta_size: None,
                horizon: 0,
                online: true,
                failures: HashMap::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// Renders a clock tick as a backend timestamp.
    pub fn timestamp(tick: u64) -> String {
        format!("{tick:016}")
    }

    /// Returns the current backend time without advancing the clock.
    pub fn now(&self) -> String {
        Self::timestamp(self.state.lock().clock)
    }

    /// Makes every request fail as unreachable while `false`.
    pub fn set_online(&self, online: bool) {
        self.state.lock().online = online;
    }

    /// Enables or disables the delta-set endpoint.
    pub fn set_delta_enabled(&self, enabled: bool) {
        self.state.lock().delta_enabled = enabled;
    }

    /// Limits the number of changed entities a delta set may return.
    pub fn set_max_delta_size(&self, limit: Option<usize>) {
        self.state.lock().max_delta_size = limit;
    }

    /// Drops all tombstones. Cursors older than now become out of range.
    pub fn purge_tombstones(&self) {
        let mut state = self.state.lock();
        state.horizon = state.clock;
        for collection in state.collections.values_mut() {
            collection.tombstones.clear();
        }
    }

    /// Makes the next request of the given operation fail with `kind`.
    pub fn fail_next(&self, op: BackendOp, kind: NetworkErrorKind) {
        self.state.lock().failures.insert(op, kind);
    }

    /// Returns every request received so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    /// Returns how many requests of an operation were received.
    pub fn call_count(&self, op: BackendOp) -> usize {
        self.state.lock().calls.iter().filter(|c| c.op == op).count()
    }

    /// Clears the call log.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Stores an entity as another client would. Not logged.
    pub fn insert(&self, collection: &str, entity: T) -> T {
        self.state.lock().store(collection, entity)
    }

    /// Modifies a stored entity as another client would. Not logged.
    pub fn modify(&self, collection: &str, id: &str, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut state = self.state.lock();
        let mut entity = state.collections.get(collection)?.entities.get(id)?.clone();
        f(&mut entity);
        entity.set_id(Some(id.to_string()));
        Some(state.store(collection, entity))
    }

    /// Deletes an entity as another client would. Not logged.
    pub fn remove(&self, collection: &str, id: &str) -> bool {
        self.state.lock().erase(collection, id)
    }

    /// Returns a stored entity.
    pub fn get(&self, collection: &str, id: &str) -> Option<T> {
        self.state
            .lock()
            .collections
            .get(collection)
            .and_then(|c| c.entities.get(id).cloned())
    }

    /// Returns the number of entities stored in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .collections
            .get(collection)
            .map_or(0, |c| c.entities.len())
    }
}

impl<T: Entity> Default for MemoryBackend<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> BackendState<T> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Logs the call, applies injected failures and returns the request
    /// start time.
    fn begin(&mut self, op: BackendOp, collection: &str, target: String) -> SyncResult<String> {
        self.calls.push(BackendCall {
            op,
            collection: collection.to_string(),
            target,
        });

        if !self.online {
            return Err(SyncError::network(
                NetworkErrorKind::Unavailable,
                "backend unreachable",
            ));
        }
        if let Some(kind) = self.failures.remove(&op) {
            return Err(SyncError::network(kind, format!("injected {op:?} failure")));
        }

        let start = self.tick();
        Ok(MemoryBackend::<T>::timestamp(start))
    }

    fn entities(&self, collection: &str) -> Vec<T> {
        self.collections
            .get(collection)
            .map(|c| c.entities.values().cloned().collect())
            .unwrap_or_default()
    }

    fn store(&mut self, collection: &str, mut entity: T) -> T {
        let now = MemoryBackend::<T>::timestamp(self.tick());
        let id = match entity.id().filter(|id| !id.is_empty() && !is_temp_id(id)) {
            Some(id) => id.to_string(),
            None => {
                self.next_id += 1;
                format!("{:024x}", self.next_id)
            }
        };

        let remote = self.collections.entry(collection.to_string()).or_default();
        let created = remote
            .entities
            .get(&id)
            .and_then(|e| e.metadata())
            .and_then(|m| m.entity_creation_time.clone())
            .unwrap_or_else(|| now.clone());

        entity.set_id(Some(id.clone()));
        entity.set_metadata(Metadata {
            last_modified_time: Some(now),
            entity_creation_time: Some(created),
        });

        remote.tombstones.retain(|t| t.id != id);
        remote.entities.insert(id, entity.clone());
        entity
    }

    fn erase(&mut self, collection: &str, id: &str) -> bool {
        let present = self
            .collections
            .get(collection)
            .is_some_and(|c| c.entities.contains_key(id));
        if !present {
            return false;
        }

        let deleted_at = self.tick();
        let remote = self.collections.entry(collection.to_string()).or_default();
        remote.entities.remove(id);
        remote.tombstones.push(Tombstone {
            id: id.to_string(),
            deleted_at,
        });
        true
    }
}

fn not_found(collection: &str, id: &str) -> SyncError {
    SyncError::network(
        NetworkErrorKind::EntityNotFound,
        format!("entity {id} not found in collection {collection}"),
    )
}

impl<T: Entity> NetworkClient<T> for MemoryBackend<T> {
    fn find(&self, collection: &str, query: &Query<T>) -> SyncResult<NetworkResponse<Vec<T>>> {
        let mut state = self.state.lock();
        let start = state.begin(BackendOp::Find, collection, query.to_query_string())?;
        let found = query.apply(state.entities(collection));
        Ok(NetworkResponse::new(found, start))
    }

    fn find_by_id(&self, collection: &str, id: &str) -> SyncResult<NetworkResponse<T>> {
        let mut state = self.state.lock();
        let start = state.begin(BackendOp::FindById, collection, id.to_string())?;
        state
            .collections
            .get(collection)
            .and_then(|c| c.entities.get(id).cloned())
            .map(|entity| NetworkResponse::new(entity, start))
            .ok_or_else(|| not_found(collection, id))
    }

    fn fetch_info(
        &self,
        collection: &str,
        query: &Query<T>,
    ) -> SyncResult<NetworkResponse<Vec<FetchInfo>>> {
        let mut state = self.state.lock();
        let start = state.begin(BackendOp::FetchInfo, collection, query.to_query_string())?;
        let info = query
            .apply(state.entities(collection))
            .iter()
            .filter_map(FetchInfo::of)
            .collect();
        Ok(NetworkResponse::new(info, start))
    }

    fn create(&self, collection: &str, entity: &T) -> SyncResult<NetworkResponse<T>> {
        let mut state = self.state.lock();
        let target = entity.id().unwrap_or_default().to_string();
        let start = state.begin(BackendOp::Create, collection, target)?;
        let stored = state.store(collection, entity.clone());
        Ok(NetworkResponse::new(stored, start))
    }

    fn update(&self, collection: &str, id: &str, entity: &T) -> SyncResult<NetworkResponse<T>> {
        let mut state = self.state.lock();
        let start = state.begin(BackendOp::Update, collection, id.to_string())?;
        let mut entity = entity.clone();
        entity.set_id(Some(id.to_string()));
        let stored = state.store(collection, entity);
        Ok(NetworkResponse::new(stored, start))
    }

    fn delete(&self, collection: &str, id: &str) -> SyncResult<NetworkResponse<usize>> {
        let mut state = self.state.lock();
        let start = state.begin(BackendOp::Delete, collection, id.to_string())?;
        if !state.erase(collection, id) {
            return Err(not_found(collection, id));
        }
        Ok(NetworkResponse::new(1, start))
    }

    fn delta_set(
        &self,
        collection: &str,
        since: &str,
        query: &Query<T>,
    ) -> SyncResult<NetworkResponse<DeltaSetResponse<T>>> {
        let mut state = self.state.lock();
        let target = format!("since={since}&{}", query.to_query_string());
        let start = state.begin(BackendOp::DeltaSet, collection, target)?;

        if !state.delta_enabled {
            return Err(SyncError::network(
                NetworkErrorKind::MissingConfiguration,
                format!("delta set is not enabled for collection {collection}"),
            ));
        }

        let since_tick: u64 = since.parse().map_err(|_| {
            SyncError::network(
                NetworkErrorKind::ParameterValueOutOfRange,
                format!("invalid since timestamp {since:?}"),
            )
        })?;
        if since_tick < state.horizon {
            return Err(SyncError::network(
                NetworkErrorKind::ParameterValueOutOfRange,
                format!("since timestamp {since} is older than retained changes"),
            ));
        }

        let changed: Vec<T> = state
            .entities(collection)
            .into_iter()
            .filter(|e| query.matches(e))
            .filter(|e| e.last_modified_time().is_some_and(|lmt| lmt > since))
            .collect();

        if let Some(limit) = state.max_delta_size {
            if changed.len() > limit {
                return Err(SyncError::network(
                    NetworkErrorKind::ResultSetSizeExceeded,
                    format!("{} changes exceed the limit of {limit}", changed.len()),
                ));
            }
        }

        let deleted = state
            .collections
            .get(collection)
            .map(|c| {
                c.tombstones
                    .iter()
                    .filter(|t| t.deleted_at > since_tick)
                    .map(|t| DeletedEntity { id: t.id.clone() })
                    .collect()
            })
            .unwrap_or_default();

        Ok(NetworkResponse::new(DeltaSetResponse { changed, deleted }, start))
    }
}
