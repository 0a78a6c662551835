//! Pending write queue.

use crate::error::CoreResult;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Kind of deferred write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WriteOperation {
    /// Entity is new on the backend.
    Create,
    /// Entity exists on the backend and was modified.
    Update,
    /// Entity must be removed from the backend.
    Delete,
}

impl WriteOperation {
    /// Returns the HTTP method the write replays as.
    pub fn method(&self) -> &'static str {
        match self {
            WriteOperation::Create => "POST",
            WriteOperation::Update => "PUT",
            WriteOperation::Delete => "DELETE",
        }
    }

    /// Parses an HTTP method.
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "POST" => Some(WriteOperation::Create),
            "PUT" => Some(WriteOperation::Update),
            "DELETE" => Some(WriteOperation::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// A write that has not yet been confirmed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWriteAction {
    /// Queue-assigned identifier, increasing in enqueue order.
    pub action_id: u64,
    /// Target collection.
    pub collection: String,
    /// Entity ID. Temporary for creates made while offline.
    pub entity_id: String,
    /// The deferred operation.
    pub operation: WriteOperation,
    /// Resource path of the original request.
    pub request_path: String,
}

impl PendingWriteAction {
    /// Creates an action. The ID is assigned on enqueue.
    pub fn new(
        collection: impl Into<String>,
        entity_id: impl Into<String>,
        operation: WriteOperation,
    ) -> Self {
        let collection = collection.into();
        let entity_id = entity_id.into();
        let request_path = match operation {
            WriteOperation::Create => format!("/appdata/{collection}"),
            WriteOperation::Update | WriteOperation::Delete => {
                format!("/appdata/{collection}/{entity_id}")
            }
        };

        Self {
            action_id: 0,
            collection,
            entity_id,
            operation,
            request_path,
        }
    }

    fn same_target(&self, other: &PendingWriteAction) -> bool {
        self.collection == other.collection && self.entity_id == other.entity_id
    }
}

/// An ordered log of writes awaiting network replay.
///
/// # Coalescing
///
/// At most one action is kept per `(collection, entity_id)`:
/// - CREATE then UPDATE stays a CREATE
/// - CREATE then DELETE removes the action (the backend never saw the entity)
/// - otherwise the newer operation replaces the older one in place
pub trait SyncQueue: Send + Sync {
    /// Enqueues an action.
    ///
    /// Returns the ID of the action now pending for the entity, or `None`
    /// if the write cancelled a pending create.
    fn enqueue(&self, action: PendingWriteAction) -> CoreResult<Option<u64>>;

    /// Returns pending actions for a collection in queue order, up to `limit`.
    fn pending(&self, collection: &str, limit: usize) -> CoreResult<Vec<PendingWriteAction>>;

    /// Returns the pending action for an entity, if any.
    fn find(&self, collection: &str, entity_id: &str) -> CoreResult<Option<PendingWriteAction>>;

    /// Removes an action after successful replay.
    fn remove(&self, action_id: u64) -> CoreResult<bool>;

    /// Counts pending actions, for one collection or all.
    fn count(&self, collection: Option<&str>) -> CoreResult<usize>;

    /// Drops every pending action of a collection.
    fn clear(&self, collection: &str) -> CoreResult<usize>;
}

struct QueueState {
    entries: VecDeque<PendingWriteAction>,
    next_action_id: u64,
}

/// An in-memory [`SyncQueue`].
pub struct MemorySyncQueue {
    state: Mutex<QueueState>,
}

impl MemorySyncQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                entries: VecDeque::new(),
                next_action_id: 1,
            }),
        }
    }

    /// Returns every pending action across collections.
    pub fn snapshot(&self) -> Vec<PendingWriteAction> {
        self.state.lock().entries.iter().cloned().collect()
    }
}

impl Default for MemorySyncQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncQueue for MemorySyncQueue {
    fn enqueue(&self, mut action: PendingWriteAction) -> CoreResult<Option<u64>> {
        let mut state = self.state.lock();

        let existing = state.entries.iter().position(|e| e.same_target(&action));
        if let Some(index) = existing {
            let previous = state.entries[index].operation;
            match (previous, action.operation) {
                (WriteOperation::Create, WriteOperation::Delete) => {
                    state.entries.remove(index);
                    return Ok(None);
                }
                (WriteOperation::Create, _) => {
                    return Ok(Some(state.entries[index].action_id));
                }
                _ => {
                    let entry = &mut state.entries[index];
                    entry.operation = action.operation;
                    entry.request_path = action.request_path;
                    return Ok(Some(entry.action_id));
                }
            }
        }

        action.action_id = state.next_action_id;
        state.next_action_id += 1;
        let id = action.action_id;
        state.entries.push_back(action);
        Ok(Some(id))
    }

    fn pending(&self, collection: &str, limit: usize) -> CoreResult<Vec<PendingWriteAction>> {
        Ok(self
            .state
            .lock()
            .entries
            .iter()
            .filter(|e| e.collection == collection)
            .take(limit)
            .cloned()
            .collect())
    }

    fn find(&self, collection: &str, entity_id: &str) -> CoreResult<Option<PendingWriteAction>> {
        Ok(self
            .state
            .lock()
            .entries
            .iter()
            .find(|e| e.collection == collection && e.entity_id == entity_id)
            .cloned())
    }

    fn remove(&self, action_id: u64) -> CoreResult<bool> {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|e| e.action_id != action_id);
        Ok(state.entries.len() != before)
    }

    fn count(&self, collection: Option<&str>) -> CoreResult<usize> {
        let state = self.state.lock();
        Ok(match collection {
            Some(name) => state.entries.iter().filter(|e| e.collection == name).count(),
            None => state.entries.len(),
        })
    }

    fn clear(&self, collection: &str) -> CoreResult<usize> {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|e| e.collection != collection);
        Ok(before - state.entries.len())
    }
}
