//! Subscription declarations and descriptors.
//!
//! Subscribers declare their handlers through [`Handlers`]; the
//! [`scanner`] turns those declarations into immutable
//! [`SubscriptionDescriptor`]s bound to one subscriber instance.

use crate::error::BoxError;
use crate::event::{EventType, EventView};
use std::fmt;
use std::sync::Arc;

pub mod handler;
pub mod scanner;

pub use handler::{HandlerMethod, Handlers, IntoHandlerResult, Subscriber};
pub use scanner::scan;

/// Execution context a handler runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ThreadMode {
    /// Run inline on the posting thread
    #[default]
    Posting,
    /// Run on the designated main thread
    Main,
    /// Run off the main thread, in the worker pool when posted from main
    Async,
}

impl fmt::Display for ThreadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadMode::Posting => f.write_str("POSTING"),
            ThreadMode::Main => f.write_str("MAIN"),
            ThreadMode::Async => f.write_str("ASYNC"),
        }
    }
}

/// Identity of a registered subscriber.
///
/// Two handles are the same subscriber iff they point at the same `Arc`
/// allocation; value equality plays no part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(usize);

impl SubscriberId {
    /// Identity of the subscriber behind `subscriber`
    pub fn of<S: ?Sized>(subscriber: &Arc<S>) -> Self {
        Self(Arc::as_ptr(subscriber).cast::<()>() as usize)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Erased callable bound to one subscriber instance
pub(crate) type BoundHandler = Arc<dyn Fn(&EventView) -> Result<(), BoxError> + Send + Sync>;

/// A handler bound to the subscriber that owns it.
#[derive(Clone)]
pub struct HandlerRef {
    subscriber: SubscriberId,
    subscriber_name: &'static str,
    name: Arc<str>,
    call: BoundHandler,
}

impl HandlerRef {
    pub(crate) fn new(
        subscriber: SubscriberId,
        subscriber_name: &'static str,
        name: Arc<str>,
        call: BoundHandler,
    ) -> Self {
        Self {
            subscriber,
            subscriber_name,
            name,
            call,
        }
    }

    /// Owning subscriber
    pub fn subscriber(&self) -> SubscriberId {
        self.subscriber
    }

    /// Type name of the owning subscriber
    pub fn subscriber_name(&self) -> &'static str {
        self.subscriber_name
    }

    /// Handler name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the handler. Panics are not caught here.
    pub fn call(&self, view: &EventView) -> Result<(), BoxError> {
        (self.call)(view)
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRef")
            .field("subscriber", &self.subscriber)
            .field("subscriber_name", &self.subscriber_name)
            .field("name", &self.name)
            .finish()
    }
}

/// Immutable record binding a handler to its thread mode and accepted
/// event type.
#[derive(Debug, Clone)]
pub struct SubscriptionDescriptor {
    handler: HandlerRef,
    thread_mode: ThreadMode,
    accepted_type: EventType,
}

impl SubscriptionDescriptor {
    pub(crate) fn new(handler: HandlerRef, thread_mode: ThreadMode, accepted_type: EventType) -> Self {
        Self {
            handler,
            thread_mode,
            accepted_type,
        }
    }

    /// The bound handler
    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    /// Where the handler runs
    pub fn thread_mode(&self) -> ThreadMode {
        self.thread_mode
    }

    /// Type of the handler's single parameter
    pub fn accepted_type(&self) -> EventType {
        self.accepted_type
    }
}
