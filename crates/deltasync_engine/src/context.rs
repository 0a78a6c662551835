//! Collaborators shared by the coordinators.

use crate::config::SyncConfig;
use crate::network::NetworkClient;
use deltasync_core::{Cache, Entity, QueryCacheStore, SyncQueue};
use std::sync::Arc;

/// The injected dependencies of one collection's store.
///
/// Cheap to clone. Every coordinator built from the same context operates
/// on the same cache, queue and query cache.
pub struct StoreContext<T: Entity> {
    collection: String,
    cache: Arc<dyn Cache<T>>,
    network: Arc<dyn NetworkClient<T>>,
    queue: Arc<dyn SyncQueue>,
    query_cache: Arc<dyn QueryCacheStore>,
    config: SyncConfig,
}

impl<T: Entity> StoreContext<T> {
    /// Creates a context. The collection name is taken from the cache.
    pub fn new(
        cache: Arc<dyn Cache<T>>,
        network: Arc<dyn NetworkClient<T>>,
        queue: Arc<dyn SyncQueue>,
        query_cache: Arc<dyn QueryCacheStore>,
    ) -> Self {
        Self {
            collection: cache.collection().to_string(),
            cache,
            network,
            queue,
            query_cache,
            config: SyncConfig::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the local cache.
    pub fn cache(&self) -> &dyn Cache<T> {
        self.cache.as_ref()
    }

    /// Returns the backend client.
    pub fn network(&self) -> &dyn NetworkClient<T> {
        self.network.as_ref()
    }

    /// Returns the pending write queue.
    pub fn queue(&self) -> &dyn SyncQueue {
        self.queue.as_ref()
    }

    /// Returns the query cache.
    pub fn query_cache(&self) -> &dyn QueryCacheStore {
        self.query_cache.as_ref()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}

impl<T: Entity> Clone for StoreContext<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            cache: Arc::clone(&self.cache),
            network: Arc::clone(&self.network),
            queue: Arc::clone(&self.queue),
            query_cache: Arc::clone(&self.query_cache),
            config: self.config.clone(),
        }
    }
}
