//! Error types for the sync engine.

use deltasync_core::CoreError;
use std::fmt;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Categorized backend failure.
///
/// Backends report failures as an HTTP-like status plus a machine-readable
/// error string. The engine only branches on this enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkErrorKind {
    /// The delta set holds more changes than the backend will return.
    ResultSetSizeExceeded,
    /// The `since` cursor is older than the backend's change retention,
    /// or delta support was enabled after the cursor was recorded.
    ParameterValueOutOfRange,
    /// Delta-set support is not enabled for the collection.
    MissingConfiguration,
    /// The entity does not exist on the backend.
    EntityNotFound,
    /// Credentials were rejected.
    Unauthorized,
    /// The request timed out below this layer.
    Timeout,
    /// The backend could not be reached.
    Unavailable,
    /// Any other backend failure.
    Backend,
}

impl NetworkErrorKind {
    /// Classifies a backend `(status, error)` pair.
    pub fn from_backend(status: Option<u16>, error: &str) -> Self {
        match (status, error) {
            (Some(400), "ResultSetSizeExceeded") => Self::ResultSetSizeExceeded,
            (Some(400), "ParameterValueOutOfRange") => Self::ParameterValueOutOfRange,
            (Some(403), "MissingConfiguration") => Self::MissingConfiguration,
            (Some(404), _) | (_, "EntityNotFound") => Self::EntityNotFound,
            (Some(401), _) | (_, "InvalidCredentials") => Self::Unauthorized,
            (Some(408) | Some(504), _) => Self::Timeout,
            (None, _) | (Some(502) | Some(503), _) => Self::Unavailable,
            _ => Self::Backend,
        }
    }

    /// Returns the backend error string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResultSetSizeExceeded => "ResultSetSizeExceeded",
            Self::ParameterValueOutOfRange => "ParameterValueOutOfRange",
            Self::MissingConfiguration => "MissingConfiguration",
            Self::EntityNotFound => "EntityNotFound",
            Self::Unauthorized => "InvalidCredentials",
            Self::Timeout => "RequestTimeout",
            Self::Unavailable => "ServiceUnavailable",
            Self::Backend => "KinveyInternalErrorRetry",
        }
    }

    /// Returns the status a backend reports alongside this kind.
    pub fn default_status(&self) -> Option<u16> {
        match self {
            Self::ResultSetSizeExceeded | Self::ParameterValueOutOfRange => Some(400),
            Self::MissingConfiguration => Some(403),
            Self::EntityNotFound => Some(404),
            Self::Unauthorized => Some(401),
            Self::Timeout => Some(408),
            Self::Unavailable => None,
            Self::Backend => Some(500),
        }
    }

    /// Returns true if an incremental fetch failing with this kind should be
    /// replaced by a full fetch.
    pub fn requires_full_refetch(&self) -> bool {
        matches!(
            self,
            Self::ResultSetSizeExceeded | Self::ParameterValueOutOfRange | Self::MissingConfiguration
        )
    }

    /// Returns true if the request may succeed when repeated unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Unavailable | Self::Backend)
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Unrecognized read or write policy.
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// Local storage error.
    #[error("cache error: {0}")]
    Cache(#[from] CoreError),

    /// The backend rejected the request or could not be reached.
    #[error("network error ({kind}): {message}")]
    Network {
        /// Error category.
        kind: NetworkErrorKind,
        /// HTTP-like status code, if a response was received.
        status: Option<u16>,
        /// Backend description.
        message: String,
    },

    /// The operation is not supported.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// A pull was refused because local writes have not been pushed.
    #[error("{count} pending writes in collection {collection} must be pushed first")]
    PendingWrites {
        /// Collection name.
        collection: String,
        /// Number of pending actions.
        count: usize,
    },

    /// A queued write refers to an entity that is no longer cached.
    #[error("entity {id} not found in collection {collection}")]
    EntityNotFound {
        /// Collection name.
        collection: String,
        /// The missing ID.
        id: String,
    },

    /// Malformed backend response.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SyncError {
    /// Creates a network error with the kind's usual status.
    pub fn network(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self::Network {
            kind,
            status: kind.default_status(),
            message: message.into(),
        }
    }

    /// Creates a network error from a raw backend response.
    pub fn backend(status: Option<u16>, error: &str, message: impl Into<String>) -> Self {
        Self::Network {
            kind: NetworkErrorKind::from_backend(status, error),
            status,
            message: message.into(),
        }
    }

    /// Returns the network error kind, if this is a network error.
    pub fn network_kind(&self) -> Option<NetworkErrorKind> {
        match self {
            Self::Network { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns true if an incremental fetch should fall back to a full fetch.
    pub fn requires_full_refetch(&self) -> bool {
        self.network_kind()
            .is_some_and(|kind| kind.requires_full_refetch())
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        self.network_kind().is_some_and(|kind| kind.is_retryable())
    }

    /// Returns true if the backend reported the entity missing.
    pub fn is_not_found(&self) -> bool {
        self.network_kind() == Some(NetworkErrorKind::EntityNotFound)
    }
}
