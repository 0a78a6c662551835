//! # deltasync engine
//!
//! Read/write policy coordinators and delta-set reconciliation.
//!
//! This crate provides:
//! - [`WriteCoordinator`]: saves and removes under four write policies,
//!   with temporary IDs for entities created locally
//! - [`ReadCoordinator`]: finds under four read policies, with incremental
//!   fetching through the backend's delta-set endpoint or an ID diff
//! - [`DataSync`]: push of queued writes, pull, and sync
//! - [`MemoryBackend`]: an in-process [`NetworkClient`]
//!
//! ## Architecture
//!
//! Every collaborator (cache, network client, pending write queue, query
//! cache) is injected through a [`StoreContext`]. Each operation runs as one
//! sequential pipeline:
//! 1. Read or write the cache
//! 2. Call the backend
//! 3. Reconcile the cache with the backend result
//!
//! The coordinators hold no locks.
//!
//! ## Key Invariants
//!
//! - The cache only deletes IDs the backend reported deleted, or IDs in
//!   the scope of a full fetch that the backend no longer returns
//! - A failed incremental fetch always drops the query's cursor
//! - Writes that failed under `LOCAL_THEN_NETWORK` are queued and raised
//! - Pull is refused while writes are queued

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod backend;
mod config;
mod context;
pub mod delta;
mod error;
mod network;
mod policy;
mod read;
mod sync;
mod write;

#[cfg(test)]
mod testing;

pub use backend::{BackendCall, BackendOp, MemoryBackend};
pub use config::{
    lexical_order, DeltaStrategy, SyncConfig, TimestampOrder, DEFAULT_ID_BATCH_SIZE,
    DEFAULT_MAX_DELTA_SET_SIZE,
};
pub use context::StoreContext;
pub use delta::DeltaPlan;
pub use error::{NetworkErrorKind, SyncError, SyncResult};
pub use network::{
    DeletedEntity, DeltaSetResponse, FetchInfo, NetworkClient, NetworkResponse, WriteRequest,
};
pub use policy::{ReadPolicy, WritePolicy};
pub use read::{FindDelegate, FindRequest, FindResult, NetworkReadResponse, ReadCoordinator};
pub use sync::{DataSync, PullResult, PushError, PushResult, SyncOutcome};
pub use write::WriteCoordinator;
