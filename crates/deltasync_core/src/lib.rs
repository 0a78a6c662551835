//! # deltasync core
//!
//! Entity model and local collaborators for the deltasync engine.
//!
//! This crate provides:
//! - The [`Entity`] trait with server-maintained [`Metadata`] and [`Acl`]
//! - Temporary IDs for records created while offline ([`TempId`])
//! - [`Query`] values carrying both a local predicate and a backend query string
//! - The [`Cache`] trait and an in-memory implementation
//! - The pending write queue ([`SyncQueue`], [`PendingWriteAction`])
//! - Per-query fetch bookkeeping ([`QueryCacheStore`], [`QueryCacheItem`])
//!
//! ## Invariants
//!
//! - Every cached entity has exactly one current ID
//! - A temporary ID is replaced by the server ID in a single `promote` step
//! - Pending actions are replayed in enqueue order
//!
//! This crate performs no network I/O. The reconciliation logic lives in
//! `deltasync_engine`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod cache;
mod entity;
mod error;
mod query;
mod query_cache;
mod queue;

#[cfg(test)]
pub(crate) mod fixture;

pub use cache::{Cache, MemoryCache};
pub use entity::{is_temp_id, Acl, Entity, Metadata, TempId, TEMP_ID_PREFIX};
pub use error::{CoreError, CoreResult};
pub use query::{normalize_expression, Predicate, Query};
pub use query_cache::{FileQueryCache, MemoryQueryCache, QueryCacheItem, QueryCacheStore};
pub use queue::{MemorySyncQueue, PendingWriteAction, SyncQueue, WriteOperation};
