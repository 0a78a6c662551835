//! Write policy coordinator.

use crate::context::StoreContext;
use crate::error::{SyncError, SyncResult};
use crate::network::WriteRequest;
use crate::policy::WritePolicy;
use deltasync_core::{is_temp_id, Entity, PendingWriteAction, TempId, WriteOperation};
use tracing::{debug, warn};

/// Executes saves and removes under a [`WritePolicy`].
///
/// # Policies
///
/// | Policy               | Cache | Network | On network failure        |
/// |----------------------|-------|---------|---------------------------|
/// | `FORCE_LOCAL`        | yes   | no      | n/a, write is queued      |
/// | `FORCE_NETWORK`      | no    | yes     | error raised              |
/// | `NETWORK_THEN_LOCAL` | first | second  | error raised, not queued  |
/// | `LOCAL_THEN_NETWORK` | first | second  | write queued, error raised |
///
/// New entities written to the cache get a temporary ID. Once the backend
/// confirms the create, the cache record is promoted to the server ID.
pub struct WriteCoordinator<T: Entity> {
    ctx: StoreContext<T>,
}

impl<T: Entity> WriteCoordinator<T> {
    /// Creates a coordinator.
    pub fn new(ctx: StoreContext<T>) -> Self {
        Self { ctx }
    }

    /// Saves an entity.
    ///
    /// Entities without a backend ID are created, others updated. Returns
    /// the server entity when the backend was written, else the cached one.
    pub fn save(&self, entity: T, policy: WritePolicy) -> SyncResult<T> {
        let request = WriteRequest::for_entity(self.ctx.collection(), entity.clone());
        debug!(
            collection = self.ctx.collection(),
            policy = %policy,
            method = request.method(),
            "save"
        );

        match policy {
            WritePolicy::ForceLocal => {
                let cached = self.save_local(entity)?;
                self.enqueue(&cached, request.operation())?;
                Ok(cached)
            }
            WritePolicy::ForceNetwork => Ok(request.execute(self.ctx.network())?.body),
            WritePolicy::NetworkThenLocal => {
                let cached = self.save_local(entity)?;
                let server = request.execute(self.ctx.network())?.body;
                self.reconcile(&cached, server)
            }
            WritePolicy::LocalThenNetwork => {
                let cached = self.save_local(entity)?;
                match request.execute(self.ctx.network()) {
                    Ok(response) => self.reconcile(&cached, response.body),
                    Err(err) => {
                        warn!(
                            collection = self.ctx.collection(),
                            error = %err,
                            "network save failed, queueing"
                        );
                        self.enqueue(&cached, request.operation())?;
                        Err(err)
                    }
                }
            }
        }
    }

    /// Removes an entity by ID, returning how many records were deleted.
    ///
    /// The count comes from the backend when it was written, else from the
    /// cache. Removing an entity that only exists locally under a temporary
    /// ID drops its pending create and never reaches the network.
    pub fn remove(&self, id: &str, policy: WritePolicy) -> SyncResult<usize> {
        debug!(collection = self.ctx.collection(), policy = %policy, id, "remove");
        let ids = [id.to_string()];

        if is_temp_id(id) && policy.writes_cache() {
            let removed = self.ctx.cache().delete_by_ids(&ids)?;
            self.drop_pending(id)?;
            return Ok(removed);
        }

        match policy {
            WritePolicy::ForceLocal => {
                let removed = self.ctx.cache().delete_by_ids(&ids)?;
                self.ctx.queue().enqueue(PendingWriteAction::new(
                    self.ctx.collection(),
                    id,
                    WriteOperation::Delete,
                ))?;
                Ok(removed)
            }
            WritePolicy::ForceNetwork => {
                Ok(self.ctx.network().delete(self.ctx.collection(), id)?.body)
            }
            WritePolicy::NetworkThenLocal => {
                self.ctx.cache().delete_by_ids(&ids)?;
                let removed = self.ctx.network().delete(self.ctx.collection(), id)?.body;
                self.drop_pending(id)?;
                Ok(removed)
            }
            WritePolicy::LocalThenNetwork => {
                self.ctx.cache().delete_by_ids(&ids)?;
                match self.ctx.network().delete(self.ctx.collection(), id) {
                    Ok(response) => {
                        self.drop_pending(id)?;
                        Ok(response.body)
                    }
                    Err(err) => {
                        warn!(
                            collection = self.ctx.collection(),
                            id,
                            error = %err,
                            "network remove failed, queueing"
                        );
                        self.ctx.queue().enqueue(PendingWriteAction::new(
                            self.ctx.collection(),
                            id,
                            WriteOperation::Delete,
                        ))?;
                        Err(err)
                    }
                }
            }
        }
    }

    /// Cancels an in-flight save. Not supported.
    pub fn cancel(&self) -> SyncResult<()> {
        Err(SyncError::NotImplemented(
            "cancelling a save is not supported".into(),
        ))
    }

    /// Writes the entity to the cache, assigning a temporary ID if new.
    fn save_local(&self, mut entity: T) -> SyncResult<T> {
        if entity.has_id() {
            return Ok(self.ctx.cache().update(entity)?);
        }

        let temp_id = TempId::generate();
        debug!(collection = self.ctx.collection(), temp_id = %temp_id, "assigned temporary id");
        entity.set_id(Some(temp_id.into_string()));
        Ok(self.ctx.cache().save(entity)?)
    }

    fn enqueue(&self, cached: &T, operation: WriteOperation) -> SyncResult<()> {
        let id = cached.id().unwrap_or_default();
        let action_id = self.ctx.queue().enqueue(PendingWriteAction::new(
            self.ctx.collection(),
            id,
            operation,
        ))?;
        debug!(
            collection = self.ctx.collection(),
            id,
            operation = %operation,
            action_id,
            "queued write"
        );
        Ok(())
    }

    /// Replaces the cached record with the server entity.
    ///
    /// A record cached under another ID (a temporary one) is promoted. Any
    /// pending action for the record is dropped: the backend now holds it.
    fn reconcile(&self, cached: &T, server: T) -> SyncResult<T> {
        let cached_id = cached.id().unwrap_or_default();
        let server_id = server.id().map(str::to_string);

        let stored = match server_id.as_deref() {
            Some(server_id) if server_id != cached_id => {
                debug!(
                    collection = self.ctx.collection(),
                    temp_id = cached_id,
                    server_id,
                    "promoting cached record"
                );
                self.ctx.cache().promote(cached_id, server)?
            }
            _ => self.ctx.cache().update(server)?,
        };

        self.drop_pending(cached_id)?;
        Ok(stored)
    }

    fn drop_pending(&self, id: &str) -> SyncResult<()> {
        if let Some(action) = self.ctx.queue().find(self.ctx.collection(), id)? {
            self.ctx.queue().remove(action.action_id)?;
        }
        Ok(())
    }
}
