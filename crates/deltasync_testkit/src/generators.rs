//! Property-based test generators using proptest.

use crate::fixtures::Task;
use deltasync_engine::{ReadPolicy, WritePolicy};
use proptest::prelude::*;

/// Strategy for task titles.
pub fn title_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9 ]{0,15}").expect("Invalid regex")
}

/// Strategy for new, unsaved tasks.
pub fn task_strategy() -> impl Strategy<Value = Task> {
    (title_strategy(), any::<bool>()).prop_map(|(title, done)| Task {
        done,
        ..Task::new(title)
    })
}

/// Strategy for fixed-width backend timestamps.
pub fn timestamp_strategy() -> impl Strategy<Value = String> {
    (0u64..10_000).prop_map(|tick| format!("{tick:016}"))
}

/// Strategy for read policies.
pub fn read_policy_strategy() -> impl Strategy<Value = ReadPolicy> {
    prop::sample::select(ReadPolicy::ALL.to_vec())
}

/// Strategy for write policies.
pub fn write_policy_strategy() -> impl Strategy<Value = WritePolicy> {
    prop::sample::select(WritePolicy::ALL.to_vec())
}

/// A change made on the backend by another client.
#[derive(Debug, Clone)]
pub enum RemoteEdit {
    /// Create a task.
    Insert(String),
    /// Retitle the task at `slot % live_count`.
    Modify(usize, String),
    /// Delete the task at `slot % live_count`.
    Remove(usize),
}

/// Strategy for a single remote edit.
pub fn remote_edit_strategy() -> impl Strategy<Value = RemoteEdit> {
    prop_oneof![
        2 => title_strategy().prop_map(RemoteEdit::Insert),
        2 => (any::<usize>(), title_strategy()).prop_map(|(slot, t)| RemoteEdit::Modify(slot, t)),
        1 => any::<usize>().prop_map(RemoteEdit::Remove),
    ]
}

/// Strategy for a sequence of remote edits.
pub fn remote_edits_strategy(max_len: usize) -> impl Strategy<Value = Vec<RemoteEdit>> {
    prop::collection::vec(remote_edit_strategy(), 0..=max_len)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
