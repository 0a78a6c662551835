//! Temporary entity identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix of every client-generated temporary ID.
pub const TEMP_ID_PREFIX: &str = "temp_";

/// A client-generated placeholder ID of the form `temp_<uuid>`.
///
/// Assigned to entities created locally before the server has issued a
/// permanent ID. The cache record is renamed to the server ID once the
/// create reaches the backend.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempId(String);

impl TempId {
    /// Generates a new random temporary ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4()))
    }

    /// Parses an existing temporary ID.
    ///
    /// Returns `None` if `id` is not of the form `temp_<uuid>`.
    pub fn parse(id: &str) -> Option<Self> {
        is_temp_id(id).then(|| Self(id.to_string()))
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the temporary ID, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TempId({})", self.0)
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TempId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<TempId> for String {
    fn from(id: TempId) -> Self {
        id.0
    }
}

/// Returns true if `id` is a temporary ID (`temp_<uuid>`).
pub fn is_temp_id(id: &str) -> bool {
    id.strip_prefix(TEMP_ID_PREFIX)
        .is_some_and(|rest| Uuid::parse_str(rest).is_ok())
}
