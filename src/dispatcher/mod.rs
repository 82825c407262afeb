//! Event dispatcher for routing events to handlers.
//!
//! The dispatcher takes a snapshot of the registry for every posted event,
//! selects the descriptors whose accepted type the event satisfies and
//! hands one task per match to the execution engine.

use crate::event::{Event, EventEnvelope};
use crate::executor::{Executor, Placement};
use crate::registry::SubscriberRegistry;
use crate::subscription::SubscriptionDescriptor;
use crate::Result;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

mod invoke;

pub use invoke::FailureHook;
pub(crate) use invoke::Invoker;

/// Statistics for the event dispatcher
#[derive(Debug, Clone, Default)]
pub struct DispatcherStats {
    /// Total events posted
    pub events_posted: u64,

    /// Handler invocations started, successful or not
    pub deliveries: u64,

    /// Matches the execution engine refused to schedule
    pub rejected: u64,

    /// Invocations that returned an error or panicked
    pub handler_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct DispatchCounters {
    pub(crate) events_posted: AtomicU64,
    pub(crate) deliveries: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) handler_failures: AtomicU64,
}

impl DispatchCounters {
    fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            events_posted: self.events_posted.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        }
    }
}

/// Routes posted events to matching handlers.
pub(crate) struct Dispatcher {
    registry: Arc<dyn SubscriberRegistry>,
    executor: Executor,
    invoker: Invoker,
    counters: Arc<DispatchCounters>,
}

impl Dispatcher {
    pub(crate) fn new(
        registry: Arc<dyn SubscriberRegistry>,
        executor: Executor,
        hook: Option<FailureHook>,
    ) -> Self {
        let counters = Arc::new(DispatchCounters::default());
        Self {
            registry,
            executor,
            invoker: Invoker::new(counters.clone(), hook),
            counters,
        }
    }

    /// The execution engine used for routing
    pub(crate) fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Deliver `event` to every matching handler.
    ///
    /// A match the execution engine rejects does not stop the remaining
    /// matches from being routed; the first rejection is returned once
    /// all of them have been attempted.
    pub(crate) fn post<E: Event>(&self, event: E) -> Result<Uuid> {
        let envelope = Arc::new(EventEnvelope::new(event));
        let event_id = envelope.event_id();
        self.counters.events_posted.fetch_add(1, Ordering::Relaxed);

        let snapshot = self.registry.snapshot();
        trace!(
            event_id = %event_id,
            event_type = envelope.event_type(),
            candidates = snapshot.len(),
            "Dispatching event"
        );

        let mut matched = 0usize;
        let mut first_error = None;

        for entry in snapshot {
            if !envelope.matches(&entry.descriptor.accepted_type()) {
                continue;
            }
            matched += 1;

            let mode = entry.descriptor.thread_mode();
            let task = self.task_for(&entry.descriptor, &envelope);

            match self.executor.execute(mode, task) {
                Ok(Placement::Inline) => {}
                Ok(placement) => trace!(
                    event_id = %event_id,
                    subscriber = entry.subscriber_name,
                    handler = entry.descriptor.handler().name(),
                    ?placement,
                    "Handler scheduled"
                ),
                Err(e) => {
                    self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        event_id = %event_id,
                        event_type = envelope.event_type(),
                        subscriber = entry.subscriber_name,
                        handler = entry.descriptor.handler().name(),
                        thread_mode = %mode,
                        error = %e,
                        "Failed to route event to handler"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        if matched == 0 {
            debug!(
                event_id = %event_id,
                event_type = envelope.event_type(),
                "No handlers for event"
            );
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(event_id),
        }
    }

    fn task_for<E: Event>(
        &self,
        descriptor: &SubscriptionDescriptor,
        envelope: &Arc<EventEnvelope<E>>,
    ) -> crate::executor::Task {
        let invoker = self.invoker.clone();
        let descriptor = descriptor.clone();
        let envelope = Arc::clone(envelope);
        Box::new(move || invoker.invoke(&descriptor, &envelope))
    }

    /// Get dispatcher statistics
    pub(crate) fn stats(&self) -> DispatcherStats {
        self.counters.snapshot()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("executor", &self.executor)
            .field("stats", &self.stats())
            .finish()
    }
}
