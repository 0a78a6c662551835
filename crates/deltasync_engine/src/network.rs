//! Backend client abstraction.

use crate::error::SyncResult;
use deltasync_core::{is_temp_id, Entity, Query, WriteOperation};

/// A backend response with the time the request was dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkResponse<R> {
    /// Response payload.
    pub body: R,
    /// Backend timestamp captured when the request started. Stored as the
    /// cursor for the next incremental fetch.
    pub request_start: String,
}

impl<R> NetworkResponse<R> {
    /// Creates a response.
    pub fn new(body: R, request_start: impl Into<String>) -> Self {
        Self {
            body,
            request_start: request_start.into(),
        }
    }

    /// Maps the payload, keeping the request start time.
    pub fn map<U>(self, f: impl FnOnce(R) -> U) -> NetworkResponse<U> {
        NetworkResponse {
            body: f(self.body),
            request_start: self.request_start,
        }
    }
}

/// ID and last-modified time of a backend entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchInfo {
    /// Entity ID.
    pub id: String,
    /// Backend last-modified time, if reported.
    pub last_modified_time: Option<String>,
}

impl FetchInfo {
    /// Extracts fetch info from an entity. Returns `None` if it has no ID.
    pub fn of<T: Entity>(entity: &T) -> Option<Self> {
        entity.id().map(|id| Self {
            id: id.to_string(),
            last_modified_time: entity.last_modified_time().map(str::to_string),
        })
    }
}

/// An entity the backend reports as deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedEntity {
    /// ID of the deleted entity.
    pub id: String,
}

/// Changes to a query's result set since a cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaSetResponse<T> {
    /// Entities created or modified since the cursor.
    pub changed: Vec<T>,
    /// Entities deleted since the cursor.
    pub deleted: Vec<DeletedEntity>,
}

impl<T> Default for DeltaSetResponse<T> {
    fn default() -> Self {
        Self {
            changed: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

/// Issues remote operations against a backend collection.
///
/// Implementations own request construction, authentication and timeouts.
/// Failures are reported as [`SyncError::Network`](crate::SyncError::Network)
/// with a categorized kind.
pub trait NetworkClient<T: Entity>: Send + Sync {
    /// Fetches every entity matching the query, modifiers applied.
    fn find(&self, collection: &str, query: &Query<T>) -> SyncResult<NetworkResponse<Vec<T>>>;

    /// Fetches one entity.
    fn find_by_id(&self, collection: &str, id: &str) -> SyncResult<NetworkResponse<T>>;

    /// Fetches the ID and last-modified time of every entity matching the
    /// query.
    fn fetch_info(
        &self,
        collection: &str,
        query: &Query<T>,
    ) -> SyncResult<NetworkResponse<Vec<FetchInfo>>>;

    /// Creates an entity. The backend assigns the ID if none is given.
    fn create(&self, collection: &str, entity: &T) -> SyncResult<NetworkResponse<T>>;

    /// Replaces the entity stored under `id`.
    fn update(&self, collection: &str, id: &str, entity: &T) -> SyncResult<NetworkResponse<T>>;

    /// Deletes an entity, returning the number removed.
    fn delete(&self, collection: &str, id: &str) -> SyncResult<NetworkResponse<usize>>;

    /// Fetches changes to the query's result set since `since`.
    fn delta_set(
        &self,
        collection: &str,
        since: &str,
        query: &Query<T>,
    ) -> SyncResult<NetworkResponse<DeltaSetResponse<T>>>;
}

/// A save prepared for the backend.
///
/// Built from the entity as the caller passed it, before any temporary ID
/// is assigned locally.
#[derive(Debug, Clone)]
pub enum WriteRequest<T> {
    /// POST of a new entity. Carries no temporary ID.
    Create {
        /// Target collection.
        collection: String,
        /// Entity body.
        entity: T,
    },
    /// PUT of an existing entity.
    Update {
        /// Target collection.
        collection: String,
        /// Backend ID.
        id: String,
        /// Entity body.
        entity: T,
    },
}

impl<T: Entity> WriteRequest<T> {
    /// Builds a create for entities without a backend ID, else an update.
    ///
    /// A temporary ID is stripped: the backend has never seen it.
    pub fn for_entity(collection: impl Into<String>, mut entity: T) -> Self {
        let collection = collection.into();
        let backend_id = entity
            .id()
            .filter(|id| !id.is_empty() && !is_temp_id(id))
            .map(str::to_string);

        match backend_id {
            Some(id) => Self::Update {
                collection,
                id,
                entity,
            },
            None => {
                entity.set_id(None);
                Self::Create { collection, entity }
            }
        }
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &'static str {
        self.operation().method()
    }

    /// Returns the queued operation this request replays as.
    pub fn operation(&self) -> WriteOperation {
        match self {
            Self::Create { .. } => WriteOperation::Create,
            Self::Update { .. } => WriteOperation::Update,
        }
    }

    /// Sends the request.
    pub fn execute(&self, client: &dyn NetworkClient<T>) -> SyncResult<NetworkResponse<T>> {
        match self {
            Self::Create { collection, entity } => client.create(collection, entity),
            Self::Update {
                collection,
                id,
                entity,
            } => client.update(collection, id, entity),
        }
    }
}
