//! Handler invocation with failure isolation.

use super::DispatchCounters;
use crate::error::HandlerFailure;
use crate::event::{Event, EventEnvelope};
use crate::subscription::SubscriptionDescriptor;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, trace, warn};

/// Callback receiving every handler failure
pub type FailureHook = Arc<dyn Fn(&HandlerFailure) + Send + Sync>;

/// Calls one handler with one event.
///
/// A handler that returns an error or panics is logged and reported to the
/// failure hook. Nothing propagates to the thread that runs the invocation.
#[derive(Clone)]
pub(crate) struct Invoker {
    counters: Arc<DispatchCounters>,
    hook: Option<FailureHook>,
}

impl Invoker {
    pub(crate) fn new(counters: Arc<DispatchCounters>, hook: Option<FailureHook>) -> Self {
        Self { counters, hook }
    }

    pub(crate) fn invoke<E: Event>(
        &self,
        descriptor: &SubscriptionDescriptor,
        envelope: &EventEnvelope<E>,
    ) {
        let handler = descriptor.handler();
        let Some(view) = envelope.view_as(&descriptor.accepted_type()) else {
            warn!(
                event_id = %envelope.event_id(),
                event_type = envelope.event_type(),
                accepted = %descriptor.accepted_type(),
                "Event does not match handler, skipping"
            );
            return;
        };

        trace!(
            event_id = %envelope.event_id(),
            subscriber = handler.subscriber_name(),
            handler = handler.name(),
            "Invoking handler"
        );

        self.counters.deliveries.fetch_add(1, Ordering::Relaxed);
        let (message, panicked) =
            match panic::catch_unwind(AssertUnwindSafe(|| handler.call(&view))) {
                Ok(Ok(())) => return,
                Ok(Err(e)) => (e.to_string(), false),
                Err(payload) => (panic_message(payload.as_ref()), true),
            };

        self.counters.handler_failures.fetch_add(1, Ordering::Relaxed);
        let failure = HandlerFailure {
            event_id: envelope.event_id(),
            event_type: envelope.event_type(),
            subscriber: handler.subscriber_name(),
            handler: handler.name().to_string(),
            thread_mode: descriptor.thread_mode(),
            message,
            panicked,
            timestamp: chrono::Utc::now(),
        };

        error!(
            event_id = %failure.event_id,
            event_type = failure.event_type,
            subscriber = failure.subscriber,
            handler = %failure.handler,
            thread_mode = %failure.thread_mode,
            panicked = failure.panicked,
            error = %failure.message,
            "Handler invocation failed"
        );

        if let Some(hook) = &self.hook {
            if panic::catch_unwind(AssertUnwindSafe(|| hook(&failure))).is_err() {
                warn!(event_id = %failure.event_id, "Handler failure hook panicked");
            }
        }
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("has_hook", &self.hook.is_some())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::impl_event;
    use crate::subscription::{scan, Handlers, Subscriber, ThreadMode};
    use parking_lot::Mutex;
    use tracing_test::traced_test;

    #[derive(Debug)]
    struct Ping;

    impl_event!(Ping);

    struct Flaky;

    impl Subscriber for Flaky {
        fn subscriptions(handlers: &mut Handlers<Self>) {
            handlers
                .on(ThreadMode::Posting, |_: &Flaky, _: &Ping| -> Result<(), Error> {
                    Err(Error::handler("printer offline"))
                })
                .on(ThreadMode::Posting, detach);
        }
    }

    fn detach(_: &Flaky, _: &Ping) {
        panic!("screen detached")
    }

    fn invoker_with_log() -> (Invoker, Arc<DispatchCounters>, Arc<Mutex<Vec<HandlerFailure>>>) {
        let counters = Arc::new(DispatchCounters::default());
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = failures.clone();
        let hook: FailureHook = Arc::new(move |failure: &HandlerFailure| sink.lock().push(failure.clone()));
        (Invoker::new(counters.clone(), Some(hook)), counters, failures)
    }

    #[test]
    #[traced_test]
    fn test_errors_and_panics_are_contained() {
        let (invoker, counters, failures) = invoker_with_log();
        let descriptors = scan(&Arc::new(Flaky)).unwrap();
        let envelope = EventEnvelope::new(Ping);

        for descriptor in &descriptors {
            invoker.invoke(descriptor, &envelope);
        }

        let failures = failures.lock();
        assert_eq!(failures.len(), 2);
        assert!(!failures[0].panicked);
        assert!(failures[0].message.contains("printer offline"));
        assert!(failures[1].panicked);
        assert_eq!(failures[1].message, "screen detached");
        assert!(failures.iter().all(|f| f.event_id == envelope.event_id()));

        assert_eq!(counters.deliveries.load(Ordering::Relaxed), 2);
        assert_eq!(counters.handler_failures.load(Ordering::Relaxed), 2);
        assert!(logs_contain("Handler invocation failed"));
        assert!(logs_contain("printer offline"));
    }

    #[test]
    fn test_panicking_hook_is_contained() {
        let counters = Arc::new(DispatchCounters::default());
        let hook: FailureHook = Arc::new(|_: &HandlerFailure| panic!("hook failure"));
        let invoker = Invoker::new(counters.clone(), Some(hook));
        let descriptors = scan(&Arc::new(Flaky)).unwrap();

        invoker.invoke(&descriptors[0], &EventEnvelope::new(Ping));
        assert_eq!(counters.handler_failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }
}
