//! Read and write policies.

use crate::error::SyncError;
use std::fmt;
use std::str::FromStr;

/// Where a find is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadPolicy {
    /// Cache only.
    ForceLocal,
    /// Backend only. Results are written through to the cache.
    ForceNetwork,
    /// Cache first, then backend. Both results are delivered.
    Both,
    /// Backend, falling back to the cache on any network error.
    NetworkOtherwiseLocal,
}

impl ReadPolicy {
    /// Every read policy.
    pub const ALL: [ReadPolicy; 4] = [
        ReadPolicy::ForceLocal,
        ReadPolicy::ForceNetwork,
        ReadPolicy::Both,
        ReadPolicy::NetworkOtherwiseLocal,
    ];

    /// Returns the policy name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadPolicy::ForceLocal => "FORCE_LOCAL",
            ReadPolicy::ForceNetwork => "FORCE_NETWORK",
            ReadPolicy::Both => "BOTH",
            ReadPolicy::NetworkOtherwiseLocal => "NETWORK_OTHERWISE_LOCAL",
        }
    }

    /// Returns true if the policy reads from the backend.
    pub fn reads_network(&self) -> bool {
        !matches!(self, ReadPolicy::ForceLocal)
    }
}

impl fmt::Display for ReadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadPolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReadPolicy::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| SyncError::InvalidPolicy(format!("unknown read policy {s:?}")))
    }
}

/// Where a save or remove is applied, and in what order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WritePolicy {
    /// Cache only; the write is queued for a later push.
    ForceLocal,
    /// Backend only.
    ForceNetwork,
    /// Cache, then backend. A network failure is raised, nothing is queued.
    NetworkThenLocal,
    /// Cache, then backend. A network failure queues the write and is raised.
    LocalThenNetwork,
}

impl WritePolicy {
    /// Every write policy.
    pub const ALL: [WritePolicy; 4] = [
        WritePolicy::ForceLocal,
        WritePolicy::ForceNetwork,
        WritePolicy::NetworkThenLocal,
        WritePolicy::LocalThenNetwork,
    ];

    /// Returns the policy name.
    pub fn as_str(&self) -> &'static str {
        match self {
            WritePolicy::ForceLocal => "FORCE_LOCAL",
            WritePolicy::ForceNetwork => "FORCE_NETWORK",
            WritePolicy::NetworkThenLocal => "NETWORK_THEN_LOCAL",
            WritePolicy::LocalThenNetwork => "LOCAL_THEN_NETWORK",
        }
    }

    /// Returns true if the policy writes to the cache.
    pub fn writes_cache(&self) -> bool {
        !matches!(self, WritePolicy::ForceNetwork)
    }

    /// Returns true if the policy writes to the backend.
    pub fn writes_network(&self) -> bool {
        !matches!(self, WritePolicy::ForceLocal)
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WritePolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WritePolicy::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| SyncError::InvalidPolicy(format!("unknown write policy {s:?}")))
    }
}
