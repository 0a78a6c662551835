//! Shared unit-test scaffolding.

use crate::backend::MemoryBackend;
use crate::config::SyncConfig;
use crate::context::StoreContext;
use deltasync_core::{
    Entity, MemoryCache, MemoryQueryCache, MemorySyncQueue, Metadata,
};
use std::sync::Arc;

pub const NOTES: &str = "notes";

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: Option<String>,
    pub title: String,
    pub metadata: Option<Metadata>,
}

impl Note {
    pub fn new(title: &str) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            metadata: None,
        }
    }

    pub fn with_id(id: &str, title: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::new(title)
        }
    }

    pub fn stored(id: &str, title: &str, lmt: &str) -> Self {
        Self {
            metadata: Some(Metadata::modified_at(lmt)),
            ..Self::with_id(id, title)
        }
    }
}

impl Entity for Note {
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
}

/// Concrete collaborators behind a [`StoreContext`].
pub struct Harness {
    pub backend: Arc<MemoryBackend<Note>>,
    pub cache: Arc<MemoryCache<Note>>,
    pub queue: Arc<MemorySyncQueue>,
    pub query_cache: Arc<MemoryQueryCache>,
    pub context: StoreContext<Note>,
}

impl Harness {
    pub fn new(config: SyncConfig) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let cache = Arc::new(MemoryCache::new(NOTES));
        let queue = Arc::new(MemorySyncQueue::new());
        let query_cache = Arc::new(MemoryQueryCache::new());
        let context = StoreContext::new(
            cache.clone(),
            backend.clone(),
            queue.clone(),
            query_cache.clone(),
        )
        .with_config(config);

        Self {
            backend,
            cache,
            queue,
            query_cache,
            context,
        }
    }

    pub fn delta() -> Self {
        Self::new(SyncConfig::new().with_delta_set_fetching(true))
    }

    pub fn seed_remote(&self, titles: &[&str]) -> Vec<Note> {
        titles
            .iter()
            .map(|t| self.backend.insert(NOTES, Note::new(t)))
            .collect()
    }
}
