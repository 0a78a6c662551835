//! Test fixtures and store helpers.
//!
//! Provides a sample entity and a fully wired store over in-memory
//! collaborators.

use deltasync_core::{
    Acl, Entity, FileQueryCache, MemoryCache, MemoryQueryCache, MemorySyncQueue, Metadata,
    QueryCacheStore,
};
use deltasync_engine::{
    DataSync, MemoryBackend, ReadCoordinator, StoreContext, SyncConfig, WriteCoordinator,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Collection used by [`TestStore`].
pub const TASKS: &str = "tasks";

/// A sample entity with backend wire names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Entity ID.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Title.
    pub title: String,
    /// Completion flag.
    #[serde(default)]
    pub done: bool,
    /// Server metadata.
    #[serde(rename = "_kmd", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Access control.
    #[serde(rename = "_acl", default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<Acl>,
}

impl Task {
    /// Creates a new, unsaved task.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            done: false,
            metadata: None,
            acl: None,
        }
    }

    /// Creates a task with an ID.
    pub fn with_id(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::new(title)
        }
    }

    /// Marks the task done.
    #[must_use]
    pub fn done(mut self) -> Self {
        self.done = true;
        self
    }
}

impl Entity for Task {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = Some(metadata);
    }

    fn acl(&self) -> Option<&Acl> {
        self.acl.as_ref()
    }
}

/// A store over in-memory collaborators, with handles on each of them.
///
/// The query cache is in memory unless the store was created with
/// [`TestStore::durable`].
pub struct TestStore {
    /// The backend.
    pub backend: Arc<MemoryBackend<Task>>,
    /// The local cache.
    pub cache: Arc<MemoryCache<Task>>,
    /// The pending write queue.
    pub queue: Arc<MemorySyncQueue>,
    /// The query cache.
    pub query_cache: Arc<dyn QueryCacheStore>,
    /// The wired context.
    pub context: StoreContext<Task>,
    /// Read coordinator.
    pub reader: ReadCoordinator<Task>,
    /// Write coordinator.
    pub writer: WriteCoordinator<Task>,
    /// Push, pull and sync.
    pub sync: DataSync<Task>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a store with the given configuration.
    pub fn new(config: SyncConfig) -> Self {
        Self::assemble(
            Arc::new(MemoryBackend::new()),
            Arc::new(MemoryCache::new(TASKS)),
            Arc::new(MemorySyncQueue::new()),
            Arc::new(MemoryQueryCache::new()),
            config,
            None,
        )
    }

    /// Creates a store with delta-set fetching enabled.
    pub fn delta() -> Self {
        Self::new(SyncConfig::new().with_delta_set_fetching(true))
    }

    /// Creates a store whose query cache is persisted in a temporary
    /// directory.
    pub fn durable(config: SyncConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let query_cache = FileQueryCache::open(temp_dir.path().join("query_cache.cbor"))
            .expect("Failed to open query cache");

        Self::assemble(
            Arc::new(MemoryBackend::new()),
            Arc::new(MemoryCache::new(TASKS)),
            Arc::new(MemorySyncQueue::new()),
            Arc::new(query_cache),
            config,
            Some(temp_dir),
        )
    }

    /// Simulates a process restart of a durable store.
    ///
    /// The backend, cache and queue survive. The query cache is closed and
    /// reopened from disk.
    pub fn restart(self) -> Self {
        let Self {
            backend,
            cache,
            queue,
            query_cache,
            context,
            reader,
            writer,
            sync,
            _temp_dir: temp_dir,
        } = self;
        let config = context.config().clone();
        drop((query_cache, context, reader, writer, sync));

        let temp_dir = temp_dir.expect("Only durable stores can be restarted");
        let query_cache = FileQueryCache::open(temp_dir.path().join("query_cache.cbor"))
            .expect("Failed to reopen query cache");

        Self::assemble(backend, cache, queue, Arc::new(query_cache), config, Some(temp_dir))
    }

    /// Returns the query cache file path of a durable store.
    pub fn query_cache_path(&self) -> Option<PathBuf> {
        self._temp_dir
            .as_ref()
            .map(|d| d.path().join("query_cache.cbor"))
    }

    /// Stores `count` tasks on the backend as another client would.
    pub fn seed_remote(&self, count: usize) -> Vec<Task> {
        (0..count)
            .map(|i| self.backend.insert(TASKS, Task::new(format!("task-{i}"))))
            .collect()
    }

    fn assemble(
        backend: Arc<MemoryBackend<Task>>,
        cache: Arc<MemoryCache<Task>>,
        queue: Arc<MemorySyncQueue>,
        query_cache: Arc<dyn QueryCacheStore>,
        config: SyncConfig,
        temp_dir: Option<TempDir>,
    ) -> Self {
        let context = StoreContext::new(
            cache.clone(),
            backend.clone(),
            queue.clone(),
            Arc::clone(&query_cache),
        )
        .with_config(config);

        Self {
            reader: ReadCoordinator::new(context.clone()),
            writer: WriteCoordinator::new(context.clone()),
            sync: DataSync::new(context.clone()),
            backend,
            cache,
            queue,
            query_cache,
            context,
            _temp_dir: temp_dir,
        }
    }
}
