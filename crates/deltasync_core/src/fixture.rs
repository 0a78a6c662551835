//! Minimal entity used by unit tests.

use crate::entity::{Entity, Metadata};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doc {
    pub id: Option<String>,
    pub title: String,
    pub metadata: Option<Metadata>,
}

impl Doc {
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
            title: title.to_string(),
            metadata: None,
        }
    }

    pub fn stored(id: &str, title: &str, lmt: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            title: title.to_string(),
            metadata: Some(Metadata::modified_at(lmt)),
        }
    }
}

impl Entity for Doc {
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
