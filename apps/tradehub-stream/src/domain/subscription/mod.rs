//! Subscription Registry
//!
//! Tracks which instrument keys the session intends to be subscribed to,
//! per data class.
//!
//! # Design
//!
//! The registry records *intent*, not confirmed server state: the streaming
//! protocol carries no synchronous subscribe acknowledgement, so an entry
//! here means "a subscribe frame for this key was sent and no unsubscribe
//! has followed". The owning session mutates the registry only after a
//! control frame was handed to the transport successfully, which keeps the
//! snapshot usable for caller-driven resubscription after a reconnect.
//!
//! Market and depth sets are independent: adding a key under one class
//! never touches the other.

use std::collections::HashSet;

use parking_lot::RwLock;

use crate::domain::instrument::{DataClass, InstrumentKey};

// =============================================================================
// Registry Stats
// =============================================================================

/// Key counts per data class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    /// Number of keys in the market (touchline) set.
    pub market: usize,
    /// Number of keys in the depth set.
    pub depth: usize,
}

impl RegistryStats {
    /// Total keys across all data classes.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.market + self.depth
    }
}

// =============================================================================
// Subscription Registry
// =============================================================================

/// Thread-safe record of intended subscriptions per data class.
///
/// All operations are synchronous and lock only the set for the affected
/// class, so a diagnostic snapshot of one class never contends with a
/// mutation of the other.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    market: RwLock<HashSet<InstrumentKey>>,
    depth: RwLock<HashSet<InstrumentKey>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record keys as subscribed under a data class.
    ///
    /// Adding an already-present key is a no-op on the set content.
    pub fn add(&self, class: DataClass, keys: &[InstrumentKey]) {
        let mut set = self.class_set(class).write();
        for key in keys {
            set.insert(key.clone());
        }
    }

    /// Remove keys from a data class.
    ///
    /// Removing a key that was never subscribed is a no-op, not an error.
    pub fn remove(&self, class: DataClass, keys: &[InstrumentKey]) {
        let mut set = self.class_set(class).write();
        for key in keys {
            set.remove(key);
        }
    }

    /// Current key set for a data class.
    #[must_use]
    pub fn snapshot(&self, class: DataClass) -> HashSet<InstrumentKey> {
        self.class_set(class).read().clone()
    }

    /// Whether a key is currently recorded under a data class.
    #[must_use]
    pub fn contains(&self, class: DataClass, key: &str) -> bool {
        self.class_set(class).read().contains(key)
    }

    /// Drop every entry in every class.
    pub fn clear(&self) {
        for class in DataClass::all() {
            self.class_set(*class).write().clear();
        }
    }

    /// Key counts per class.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            market: self.market.read().len(),
            depth: self.depth.read().len(),
        }
    }

    /// The lock guarding one class's key set.
    const fn class_set(&self, class: DataClass) -> &RwLock<HashSet<InstrumentKey>> {
        match class {
            DataClass::Market => &self.market,
            DataClass::Depth => &self.depth,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn keys(raw: &[&str]) -> Vec<InstrumentKey> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_add_records_keys() {
        let registry = SubscriptionRegistry::new();
        registry.add(DataClass::Market, &keys(&["NSE|26000", "NSE|26009"]));

        let snapshot = registry.snapshot(DataClass::Market);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("NSE|26000"));
        assert!(snapshot.contains("NSE|26009"));
    }

    #[test]
    fn test_add_is_union_with_existing() {
        let registry = SubscriptionRegistry::new();
        registry.add(DataClass::Market, &keys(&["NSE|26000"]));
        registry.add(DataClass::Market, &keys(&["NSE|26009", "NSE|14366"]));

        let snapshot = registry.snapshot(DataClass::Market);
        assert_eq!(
            snapshot,
            keys(&["NSE|26000", "NSE|26009", "NSE|14366"])
                .into_iter()
                .collect()
        );
    }

    #[test]
    fn test_resubscribe_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        registry.add(DataClass::Depth, &keys(&["NSE|26000"]));
        registry.add(DataClass::Depth, &keys(&["NSE|26000"]));

        assert_eq!(registry.snapshot(DataClass::Depth).len(), 1);
    }

    #[test]
    fn test_remove_subtracts_keys() {
        let registry = SubscriptionRegistry::new();
        registry.add(DataClass::Market, &keys(&["NSE|26000", "NSE|26009"]));
        registry.remove(DataClass::Market, &keys(&["NSE|26000"]));

        let snapshot = registry.snapshot(DataClass::Market);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains("NSE|26009"));
    }

    #[test]
    fn test_remove_unknown_key_is_noop() {
        let registry = SubscriptionRegistry::new();
        registry.add(DataClass::Market, &keys(&["NSE|26000"]));
        registry.remove(DataClass::Market, &keys(&["NSE|99999"]));

        assert_eq!(registry.snapshot(DataClass::Market).len(), 1);
    }

    #[test]
    fn test_subscribe_then_unsubscribe_round_trips() {
        let registry = SubscriptionRegistry::new();
        registry.add(DataClass::Market, &keys(&["NSE|14366"]));
        let before = registry.snapshot(DataClass::Market);

        let batch = keys(&["NSE|26000", "NSE|26009"]);
        registry.add(DataClass::Market, &batch);
        registry.remove(DataClass::Market, &batch);

        assert_eq!(registry.snapshot(DataClass::Market), before);
    }

    #[test]
    fn test_classes_are_independent() {
        let registry = SubscriptionRegistry::new();
        registry.add(DataClass::Market, &keys(&["NSE|26000"]));
        registry.add(DataClass::Depth, &keys(&["NSE|26009"]));
        registry.remove(DataClass::Depth, &keys(&["NSE|26000"]));

        assert!(registry.contains(DataClass::Market, "NSE|26000"));
        assert!(!registry.contains(DataClass::Depth, "NSE|26000"));
        assert!(registry.contains(DataClass::Depth, "NSE|26009"));
    }

    #[test]
    fn test_clear_empties_every_class() {
        let registry = SubscriptionRegistry::new();
        registry.add(DataClass::Market, &keys(&["NSE|26000"]));
        registry.add(DataClass::Depth, &keys(&["NSE|26009"]));

        registry.clear();

        assert!(registry.snapshot(DataClass::Market).is_empty());
        assert!(registry.snapshot(DataClass::Depth).is_empty());
        assert_eq!(registry.stats().total(), 0);
    }

    #[test]
    fn test_stats_counts_per_class() {
        let registry = SubscriptionRegistry::new();
        registry.add(DataClass::Market, &keys(&["NSE|26000", "NSE|26009"]));
        registry.add(DataClass::Depth, &keys(&["NSE|26000"]));

        let stats = registry.stats();
        assert_eq!(stats.market, 2);
        assert_eq!(stats.depth, 1);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn test_concurrent_mutation_with_snapshots() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let mut handles = Vec::new();

        for i in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                let key = format!("NSE|{}", 26000 + i);
                for _ in 0..100 {
                    registry.add(DataClass::Market, &[key.clone()]);
                    let _ = registry.snapshot(DataClass::Market);
                    registry.remove(DataClass::Market, &[key.clone()]);
                }
                registry.add(DataClass::Market, &[key]);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.snapshot(DataClass::Market).len(), 8);
    }
}
