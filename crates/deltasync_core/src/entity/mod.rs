//! Entity model.

mod id;

pub use id::{is_temp_id, TempId, TEMP_ID_PREFIX};

use serde::{Deserialize, Serialize};

/// Server-maintained metadata attached to every persisted entity.
///
/// Timestamps are opaque strings. The engine only ever compares them with
/// the configured timestamp order and never parses them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Last time the server modified the entity.
    #[serde(rename = "lmt", default, skip_serializing_if = "Option::is_none")]
    pub last_modified_time: Option<String>,
    /// Time the server first stored the entity.
    #[serde(rename = "ect", default, skip_serializing_if = "Option::is_none")]
    pub entity_creation_time: Option<String>,
}

impl Metadata {
    /// Creates metadata with the given last-modified time.
    pub fn modified_at(lmt: impl Into<String>) -> Self {
        Self {
            last_modified_time: Some(lmt.into()),
            entity_creation_time: None,
        }
    }
}

/// Access control metadata. Carried along untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    /// ID of the user that created the entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    /// Whether every user may read the entity.
    #[serde(rename = "gr", default, skip_serializing_if = "Option::is_none")]
    pub globally_readable: Option<bool>,
    /// Whether every user may write the entity.
    #[serde(rename = "gw", default, skip_serializing_if = "Option::is_none")]
    pub globally_writable: Option<bool>,
    /// Users granted read access.
    #[serde(rename = "r", default, skip_serializing_if = "Vec::is_empty")]
    pub readers: Vec<String>,
    /// Users granted write access.
    #[serde(rename = "w", default, skip_serializing_if = "Vec::is_empty")]
    pub writers: Vec<String>,
}

/// A record that can be cached locally and synchronized with the backend.
///
/// Entities without an ID are new: they receive a temporary ID when written
/// locally and a server ID on their first successful network save.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Returns the entity ID, if assigned.
    fn id(&self) -> Option<&str>;

    /// Replaces the entity ID.
    fn set_id(&mut self, id: Option<String>);

    /// Returns server metadata, if present.
    fn metadata(&self) -> Option<&Metadata>;

    /// Replaces server metadata.
    fn set_metadata(&mut self, metadata: Metadata);

    /// Returns access control metadata, if present.
    fn acl(&self) -> Option<&Acl> {
        None
    }

    /// Returns the last-modified time from metadata.
    fn last_modified_time(&self) -> Option<&str> {
        self.metadata()
            .and_then(|m| m.last_modified_time.as_deref())
    }

    /// Returns true if the entity carries a non-empty ID.
    fn has_id(&self) -> bool {
        self.id().is_some_and(|id| !id.is_empty())
    }
}
