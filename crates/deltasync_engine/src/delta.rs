//! ID-diff reconciliation.
//!
//! Compares the backend's IDs and timestamps for a query against the cached
//! entities in the same scope, and decides what to fetch and what to purge.

use crate::config::SyncConfig;
use crate::network::FetchInfo;
use deltasync_core::Entity;
use std::collections::{BTreeMap, HashSet};

/// Outcome of diffing backend fetch info against the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaPlan {
    /// Backend IDs that are not cached, or newer on the backend.
    pub to_fetch: Vec<String>,
    /// Cached IDs the backend no longer returns.
    pub to_delete: Vec<String>,
    /// Backend IDs whose cached copy is current.
    pub unchanged: usize,
    /// Number of backend entries diffed.
    pub network_total: usize,
}

impl DeltaPlan {
    /// Returns true if every backend entity must be fetched, in which case
    /// one full fetch replaces the batched backfill.
    pub fn requires_full_fetch(&self) -> bool {
        !self.to_fetch.is_empty() && self.to_fetch.len() == self.network_total
    }

    /// Returns true if the cache is already current.
    pub fn is_empty(&self) -> bool {
        self.to_fetch.is_empty() && self.to_delete.is_empty()
    }
}

/// Classifies backend entries against cached entities.
///
/// Cached entities without an ID or a last-modified time take no part in
/// the diff: they are never purged and never make a backend entry current.
/// A backend entry without a timestamp is always fetched.
pub fn plan<T: Entity>(network: &[FetchInfo], cached: &[T], config: &SyncConfig) -> DeltaPlan {
    let local: BTreeMap<&str, &str> = cached
        .iter()
        .filter_map(|e| Some((e.id()?, e.last_modified_time()?)))
        .collect();

    let mut result = DeltaPlan {
        network_total: network.len(),
        ..DeltaPlan::default()
    };
    let mut seen = HashSet::with_capacity(network.len());

    for info in network {
        seen.insert(info.id.as_str());

        let current = match (local.get(info.id.as_str()), &info.last_modified_time) {
            (Some(cached_lmt), Some(network_lmt)) => !config.is_newer(network_lmt, cached_lmt),
            _ => false,
        };

        if current {
            result.unchanged += 1;
        } else {
            result.to_fetch.push(info.id.clone());
        }
    }

    result.to_delete = local
        .keys()
        .filter(|id| !seen.contains(*id))
        .map(|id| id.to_string())
        .collect();

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Note;
    use proptest::prelude::*;

    fn info(id: &str, lmt: Option<&str>) -> FetchInfo {
        FetchInfo {
            id: id.to_string(),
            last_modified_time: lmt.map(str::to_string),
        }
    }

    #[test]
    fn classifies_new_updated_deleted() {
        let cached = vec![
            Note::stored("same", "a", "0005"),
            Note::stored("older", "b", "0003"),
            Note::stored("gone", "c", "0001"),
        ];
        let network = vec![
            info("same", Some("0005")),
            info("older", Some("0004")),
            info("new", Some("0006")),
        ];

        let plan = plan(&network, &cached, &SyncConfig::new());
        assert_eq!(plan.to_fetch, vec!["older", "new"]);
        assert_eq!(plan.to_delete, vec!["gone"]);
        assert_eq!(plan.unchanged, 1);
        assert!(!plan.requires_full_fetch());
    }

    #[test]
    fn cached_newer_than_network_is_current() {
        let cached = vec![Note::stored("a", "a", "0009")];
        let plan = plan(&[info("a", Some("0008"))], &cached, &SyncConfig::new());
        assert!(plan.is_empty());
    }

    #[test]
    fn entities_without_timestamp_are_ignored() {
        let cached = vec![Note::with_id("local", "unsynced"), Note::with_id("a", "a")];
        let plan = plan(&[info("a", Some("0001"))], &cached, &SyncConfig::new());

        assert!(plan.to_delete.is_empty());
        assert_eq!(plan.to_fetch, vec!["a"]);
    }

    #[test]
    fn missing_network_timestamp_is_fetched() {
        let cached = vec![Note::stored("a", "a", "0001")];
        let plan = plan(&[info("a", None)], &cached, &SyncConfig::new());
        assert_eq!(plan.to_fetch, vec!["a"]);
    }

    #[test]
    fn all_changed_requires_full_fetch() {
        let network = vec![info("a", Some("1")), info("b", Some("1"))];
        let full = plan::<Note>(&network, &[], &SyncConfig::new());
        assert!(full.requires_full_fetch());

        let empty = plan::<Note>(&[], &[], &SyncConfig::new());
        assert!(!empty.requires_full_fetch());
        assert!(empty.is_empty());
    }

    fn timestamp() -> impl Strategy<Value = Option<String>> {
        prop::option::of((0u64..20).prop_map(|t| format!("{t:04}")))
    }

    proptest! {
        #[test]
        fn every_network_id_is_fetched_or_current(
            network in prop::collection::btree_map("[a-h]", timestamp(), 0..8),
            cached in prop::collection::btree_map("[a-h]", timestamp(), 0..8),
        ) {
            let network: Vec<FetchInfo> = network
                .into_iter()
                .map(|(id, lmt)| FetchInfo { id, last_modified_time: lmt })
                .collect();
            let cached: Vec<Note> = cached
                .into_iter()
                .map(|(id, lmt)| match lmt {
                    Some(lmt) => Note::stored(&id, "x", &lmt),
                    None => Note::with_id(&id, "x"),
                })
                .collect();

            let plan = plan(&network, &cached, &SyncConfig::new());
            prop_assert_eq!(plan.to_fetch.len() + plan.unchanged, network.len());

            let network_ids: HashSet<&str> = network.iter().map(|i| i.id.as_str()).collect();
            for id in &plan.to_delete {
                prop_assert!(!network_ids.contains(id.as_str()));
                let entity = cached.iter().find(|e| e.id() == Some(id.as_str()));
                prop_assert!(entity.is_some_and(|e| e.last_modified_time().is_some()));
            }
        }
    }
}
