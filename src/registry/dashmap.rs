//! DashMap-based implementation of SubscriberRegistry for concurrent access.

use super::{RegistryEntry, SnapshotEntry, SubscriberRegistry};
use crate::subscription::SubscriberId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// A thread-safe subscriber registry implementation using DashMap.
///
/// Posting threads only read, while registration and unregistration write
/// single entries, so shard-level locking keeps readers mostly uncontended.
#[derive(Debug, Clone)]
pub struct DashMapRegistry {
    /// Map from subscriber identity to its entry
    subscribers: Arc<DashMap<SubscriberId, RegistryEntry>>,
}

impl DashMapRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(DashMap::new()),
        }
    }

    /// Create a registry with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(DashMap::with_capacity(capacity)),
        }
    }
}

impl Default for DashMapRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberRegistry for DashMapRegistry {
    fn insert(&self, id: SubscriberId, entry: RegistryEntry) -> bool {
        match self.subscribers.entry(id) {
            Entry::Occupied(_) => {
                trace!(subscriber_id = %id, "Subscriber already registered");
                false
            }
            Entry::Vacant(vacant) => {
                debug!(
                    subscriber_id = %id,
                    subscriber = entry.subscriber_name,
                    handlers = entry.descriptors.len(),
                    "Subscriber registered"
                );
                vacant.insert(entry);
                true
            }
        }
    }

    fn remove(&self, id: SubscriberId) -> Option<RegistryEntry> {
        let removed = self.subscribers.remove(&id).map(|(_, entry)| entry);
        if let Some(entry) = &removed {
            debug!(
                subscriber_id = %id,
                subscriber = entry.subscriber_name,
                "Subscriber unregistered"
            );
        }
        removed
    }

    fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    fn snapshot(&self) -> Vec<SnapshotEntry> {
        // Clone the descriptor lists first so no shard lock is held while
        // the flattened view is built.
        let entries: Vec<(SubscriberId, RegistryEntry)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        entries
            .into_iter()
            .flat_map(|(id, entry)| {
                let name = entry.subscriber_name;
                let descriptors = entry.descriptors;
                (0..descriptors.len()).map(move |i| SnapshotEntry {
                    subscriber: id,
                    subscriber_name: name,
                    descriptor: descriptors[i].clone(),
                })
            })
            .collect()
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn subscription_count(&self) -> usize {
        self.subscribers
            .iter()
            .map(|entry| entry.descriptors.len())
            .sum()
    }

    fn clear(&self) {
        self.subscribers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impl_event;
    use crate::registry::RegistryStatistics;
    use crate::subscription::{scan, Handlers, Subscriber, ThreadMode};

    #[derive(Debug, Clone)]
    struct TestEvent;

    impl_event!(TestEvent);

    struct Listener;

    impl Subscriber for Listener {
        fn subscriptions(handlers: &mut Handlers<Self>) {
            handlers
                .on(ThreadMode::Posting, |_: &Listener, _: &TestEvent| {})
                .on(ThreadMode::Async, |_: &Listener, _: &String| {});
        }
    }

    struct Bystander;

    impl Subscriber for Bystander {
        fn subscriptions(_handlers: &mut Handlers<Self>) {}
    }

    fn entry_for<S: Subscriber>(subscriber: &Arc<S>) -> (SubscriberId, RegistryEntry) {
        let descriptors = scan(subscriber).unwrap();
        (
            SubscriberId::of(subscriber),
            RegistryEntry::new(subscriber, descriptors),
        )
    }

    #[test]
    fn test_insert_and_snapshot() {
        let registry = DashMapRegistry::new();
        let listener = Arc::new(Listener);
        let (id, entry) = entry_for(&listener);

        assert!(registry.insert(id, entry));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|e| e.subscriber == id));
        assert_eq!(snapshot[0].descriptor.thread_mode(), ThreadMode::Posting);
        assert_eq!(snapshot[1].descriptor.thread_mode(), ThreadMode::Async);
    }

    #[test]
    fn test_insert_is_idempotent() {
        let registry = DashMapRegistry::new();
        let listener = Arc::new(Listener);

        let (id, entry) = entry_for(&listener);
        assert!(registry.insert(id, entry));
        let (id, entry) = entry_for(&listener);
        assert!(!registry.insert(id, entry));

        assert_eq!(registry.subscriber_count(), 1);
        assert_eq!(registry.subscription_count(), 2);
    }

    #[test]
    fn test_remove() {
        let registry = DashMapRegistry::new();
        let listener = Arc::new(Listener);
        let (id, entry) = entry_for(&listener);

        registry.insert(id, entry);
        assert!(registry.contains(id));

        let removed = registry.remove(id).unwrap();
        assert_eq!(removed.descriptors.len(), 2);
        assert!(!registry.contains(id));
        assert!(registry.snapshot().is_empty());

        // Removing again is a no-op
        assert!(registry.remove(id).is_none());
    }

    #[test]
    fn test_empty_subscriber_is_registered() {
        let registry = DashMapRegistry::new();
        let bystander = Arc::new(Bystander);
        let (id, entry) = entry_for(&bystander);

        assert!(registry.insert(id, entry));
        assert!(registry.contains(id));
        assert!(registry.snapshot().is_empty());

        let stats = registry.stats();
        assert_eq!(stats.subscribers, 1);
        assert_eq!(stats.subscriptions, 0);
        assert_eq!(stats.empty_subscribers, 1);
    }

    #[test]
    fn test_distinct_instances_are_distinct_subscribers() {
        let registry = DashMapRegistry::new();
        for _ in 0..3 {
            let (id, entry) = entry_for(&Arc::new(Listener));
            assert!(registry.insert(id, entry));
        }

        assert_eq!(registry.subscriber_count(), 3);
        assert_eq!(registry.snapshot().len(), 6);

        registry.clear();
        assert_eq!(registry.subscriber_count(), 0);
    }
}
