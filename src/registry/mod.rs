//! Subscription registry mapping subscribers to their descriptors.
//!
//! The registry is shared by every thread that registers, unregisters or
//! posts. Each mutation is a single map operation, so a reader sees a
//! subscriber's descriptor list either whole or not at all.

use crate::subscription::{SubscriberId, SubscriptionDescriptor};
use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;

mod dashmap;
pub use self::dashmap::DashMapRegistry;

/// A registered subscriber and its descriptors
#[derive(Clone)]
pub struct RegistryEntry {
    /// Strong reference keeping the subscriber (and its identity) alive
    subscriber: Arc<dyn Any + Send + Sync>,

    /// Type name of the subscriber
    pub subscriber_name: &'static str,

    /// Descriptors in discovery order; the order is not a contract
    pub descriptors: Arc<[SubscriptionDescriptor]>,
}

impl RegistryEntry {
    /// Create an entry for `subscriber`
    pub fn new<S: Send + Sync + 'static>(
        subscriber: &Arc<S>,
        descriptors: Vec<SubscriptionDescriptor>,
    ) -> Self {
        let subscriber: Arc<S> = Arc::clone(subscriber);
        Self {
            subscriber,
            subscriber_name: std::any::type_name::<S>(),
            descriptors: descriptors.into(),
        }
    }

    /// The registered subscriber
    pub fn subscriber(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.subscriber
    }
}

impl Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("subscriber_name", &self.subscriber_name)
            .field("descriptors", &self.descriptors.len())
            .finish()
    }
}

/// One `(subscriber, descriptor)` pair of a registry snapshot
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    /// Owning subscriber
    pub subscriber: SubscriberId,
    /// Type name of the owning subscriber
    pub subscriber_name: &'static str,
    /// The registered descriptor
    pub descriptor: SubscriptionDescriptor,
}

/// Trait for registries that map subscribers to their descriptors.
///
/// Implementations must be thread-safe as they will be accessed
/// concurrently from posting, registering and unregistering threads.
pub trait SubscriberRegistry: Send + Sync + Debug {
    /// Store `entry` under `id` unless `id` is already present.
    ///
    /// The presence check and the insert are one atomic step. Returns
    /// whether the entry was stored.
    fn insert(&self, id: SubscriberId, entry: RegistryEntry) -> bool;

    /// Remove the entry for `id`
    fn remove(&self, id: SubscriberId) -> Option<RegistryEntry>;

    /// Whether `id` is registered
    fn contains(&self, id: SubscriberId) -> bool;

    /// Point-in-time view of every registered descriptor
    fn snapshot(&self) -> Vec<SnapshotEntry>;

    /// Number of registered subscribers
    fn subscriber_count(&self) -> usize;

    /// Number of descriptors across all subscribers
    fn subscription_count(&self) -> usize;

    /// Remove every entry
    fn clear(&self);
}

/// Registry statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// Registered subscribers
    pub subscribers: usize,

    /// Descriptors across all subscribers
    pub subscriptions: usize,

    /// Subscribers registered without any handler
    pub empty_subscribers: usize,
}

/// Extension trait for registries with statistics
pub trait RegistryStatistics: SubscriberRegistry {
    /// Get current registry statistics
    fn stats(&self) -> RegistryStats {
        let snapshot = self.snapshot();
        let subscribers = self.subscriber_count();
        let mut with_handlers: Vec<SubscriberId> =
            snapshot.iter().map(|entry| entry.subscriber).collect();
        with_handlers.sort_unstable();
        with_handlers.dedup();

        RegistryStats {
            subscribers,
            subscriptions: snapshot.len(),
            empty_subscribers: subscribers.saturating_sub(with_handlers.len()),
        }
    }
}

// Implement statistics for all registries
impl<T: SubscriberRegistry + ?Sized> RegistryStatistics for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_entry() {
        let subscriber = Arc::new(42u32);
        let entry = RegistryEntry::new(&subscriber, Vec::new());

        assert_eq!(entry.subscriber_name, "u32");
        assert!(entry.descriptors.is_empty());
        assert_eq!(entry.subscriber().downcast_ref::<u32>(), Some(&42));
        assert_eq!(Arc::strong_count(&subscriber), 2);
    }
}
