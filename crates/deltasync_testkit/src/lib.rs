//! # deltasync Testkit
//!
//! Test utilities for deltasync.
//!
//! This crate provides:
//! - A sample [`Task`] entity and a fully wired [`TestStore`]
//! - Property-based test generators using proptest
//! - Log setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use deltasync_testkit::prelude::*;
//!
//! #[test]
//! fn pulls_remote_tasks() {
//!     let store = TestStore::delta();
//!     store.seed_remote(3);
//!     let pulled = store.sync.pull(&Query::all()).unwrap();
//!     assert_eq!(pulled.pull_count, 3);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::init_tracing;
