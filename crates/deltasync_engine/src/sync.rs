//! Push, pull and sync of a collection.

use crate::context::StoreContext;
use crate::error::{SyncError, SyncResult};
use crate::read::{FindRequest, NetworkReadResponse, ReadCoordinator};
use deltasync_core::{is_temp_id, Entity, PendingWriteAction, Query, WriteOperation};
use tracing::{debug, info, warn};

/// A queued write that failed during a push.
#[derive(Debug)]
pub struct PushError {
    /// The action.
    pub action: PendingWriteAction,
    /// Why it failed.
    pub error: SyncError,
    /// Whether the action was dropped from the queue. Set when the cached
    /// entity it replays no longer exists; otherwise the action stays queued.
    pub dropped: bool,
}

/// Result of [`DataSync::push`].
#[derive(Debug, Default)]
pub struct PushResult {
    /// Number of actions replayed and removed from the queue.
    pub push_count: usize,
    /// Actions that failed and stay queued.
    pub errors: Vec<PushError>,
}

impl PushResult {
    /// Returns true if every action was replayed.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Result of [`DataSync::pull`].
#[derive(Debug, Clone, PartialEq)]
pub struct PullResult<T> {
    /// Number of entities fetched and applied.
    pub pull_count: usize,
    /// Number of cached entities removed.
    pub deleted_count: usize,
    /// Whether the pull was incremental.
    pub delta_fetched: bool,
    /// The fetched entities.
    pub entities: Vec<T>,
}

impl<T> From<NetworkReadResponse<T>> for PullResult<T> {
    fn from(response: NetworkReadResponse<T>) -> Self {
        Self {
            pull_count: response.pull_count,
            deleted_count: response.deleted_count,
            delta_fetched: response.delta_fetched,
            entities: response.entities,
        }
    }
}

/// Result of [`DataSync::sync`].
#[derive(Debug)]
pub struct SyncOutcome<T> {
    /// Push phase.
    pub push: PushResult,
    /// Pull phase. `None` when failed pushes left writes queued.
    pub pull: Option<PullResult<T>>,
}

/// Moves queued writes to the backend and backend changes to the cache.
pub struct DataSync<T: Entity> {
    ctx: StoreContext<T>,
    reader: ReadCoordinator<T>,
}

impl<T: Entity> DataSync<T> {
    /// Creates a synchronizer.
    pub fn new(ctx: StoreContext<T>) -> Self {
        Self {
            reader: ReadCoordinator::new(ctx.clone()),
            ctx,
        }
    }

    /// Returns the number of queued writes for the collection.
    pub fn pending_count(&self) -> SyncResult<usize> {
        Ok(self.ctx.queue().count(Some(self.ctx.collection()))?)
    }

    /// Replays queued writes in order.
    ///
    /// A failed action stays queued and does not stop the push. A CREATE or
    /// UPDATE whose entity is gone from the cache can never be replayed and
    /// is dropped.
    pub fn push(&self) -> SyncResult<PushResult> {
        let actions = self.ctx.queue().pending(self.ctx.collection(), usize::MAX)?;
        let mut result = PushResult::default();

        for action in actions {
            match self.replay(&action) {
                Ok(()) => {
                    self.ctx.queue().remove(action.action_id)?;
                    result.push_count += 1;
                }
                Err(error @ SyncError::EntityNotFound { .. }) => {
                    warn!(
                        collection = self.ctx.collection(),
                        id = action.entity_id.as_str(),
                        operation = %action.operation,
                        "cached entity missing, dropping queued write"
                    );
                    self.ctx.queue().remove(action.action_id)?;
                    result.errors.push(PushError {
                        action,
                        error,
                        dropped: true,
                    });
                }
                Err(error) => {
                    warn!(
                        collection = self.ctx.collection(),
                        id = action.entity_id.as_str(),
                        operation = %action.operation,
                        error = %error,
                        "push failed"
                    );
                    result.errors.push(PushError {
                        action,
                        error,
                        dropped: false,
                    });
                }
            }
        }

        info!(
            collection = self.ctx.collection(),
            pushed = result.push_count,
            failed = result.errors.len(),
            "push complete"
        );
        Ok(result)
    }

    fn replay(&self, action: &PendingWriteAction) -> SyncResult<()> {
        let collection = self.ctx.collection();
        let id = action.entity_id.as_str();
        debug!(collection, id, operation = %action.operation, "replaying");

        match action.operation {
            WriteOperation::Create => {
                let mut body = self.cached(id)?;
                if is_temp_id(id) {
                    body.set_id(None);
                }
                let server = self.ctx.network().create(collection, &body)?.body;
                if server.id() == Some(id) {
                    self.ctx.cache().update(server)?;
                } else {
                    self.ctx.cache().promote(id, server)?;
                }
            }
            WriteOperation::Update => {
                let body = self.cached(id)?;
                let server = self.ctx.network().update(collection, id, &body)?.body;
                self.ctx.cache().update(server)?;
            }
            WriteOperation::Delete => match self.ctx.network().delete(collection, id) {
                Ok(_) => {}
                Err(err) if err.is_not_found() => {
                    debug!(collection, id, "already deleted on backend");
                }
                Err(err) => return Err(err),
            },
        }
        Ok(())
    }

    fn cached(&self, id: &str) -> SyncResult<T> {
        self.ctx
            .cache()
            .find_by_id(id)?
            .ok_or_else(|| SyncError::EntityNotFound {
                collection: self.ctx.collection().to_string(),
                id: id.to_string(),
            })
    }

    /// Fetches backend changes into the cache.
    ///
    /// Refused while writes are queued: pulling would overwrite them.
    pub fn pull(&self, query: &Query<T>) -> SyncResult<PullResult<T>> {
        let count = self.pending_count()?;
        if count > 0 {
            return Err(SyncError::PendingWrites {
                collection: self.ctx.collection().to_string(),
                count,
            });
        }

        let response = self
            .reader
            .find_network(&FindRequest::Query(query.clone()))?;
        info!(
            collection = self.ctx.collection(),
            pulled = response.pull_count,
            deleted = response.deleted_count,
            delta = response.delta_fetched,
            "pull complete"
        );
        Ok(response.into())
    }

    /// Pushes, then pulls if the push left nothing queued.
    pub fn sync(&self, query: &Query<T>) -> SyncResult<SyncOutcome<T>> {
        let push = self.push()?;
        if !push.is_complete() {
            warn!(
                collection = self.ctx.collection(),
                failed = push.errors.len(),
                "skipping pull, writes still queued"
            );
            return Ok(SyncOutcome { push, pull: None });
        }

        let pull = self.pull(query)?;
        Ok(SyncOutcome {
            push,
            pull: Some(pull),
        })
    }

    /// Clears cached entities and fetch cursors.
    ///
    /// With a query, only its matching entities and its cursor are dropped.
    /// Without, the whole collection is reset, queued writes included.
    /// Returns the number of entities removed.
    pub fn clear(&self, query: Option<&Query<T>>) -> SyncResult<usize> {
        let collection = self.ctx.collection();
        let removed = self.ctx.cache().clear(query)?;

        let query_string = query.map(Query::to_query_string);
        for item in self.ctx.query_cache().items()? {
            let in_scope = item.collection == collection
                && query_string.as_ref().map_or(true, |qs| *qs == item.query);
            if in_scope {
                self.ctx.query_cache().delete(&item)?;
            }
        }

        if query.is_none() {
            let dropped = self.ctx.queue().clear(collection)?;
            debug!(collection, dropped, "dropped queued writes");
        }

        info!(collection, removed, "cache cleared");
        Ok(removed)
    }
}
