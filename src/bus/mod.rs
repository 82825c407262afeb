//! The main EventBus implementation.
//!
//! The EventBus is the primary interface for registering subscribers and
//! posting events. It coordinates between the registry, the dispatcher and
//! the execution engine.

use crate::dispatcher::{Dispatcher, DispatcherStats};
use crate::executor::{MainLoop, MainThread, PoolStats};
use crate::registry::{RegistryEntry, RegistryStatistics, SubscriberRegistry};
use crate::subscription::{scan, Subscriber, SubscriberId};
use crate::{Error, Event, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

pub mod builder;
pub mod config;

pub use builder::EventBusBuilder;
pub use config::EventBusConfig;

static DEFAULT_BUS: OnceLock<EventBus> = OnceLock::new();

/// The main event bus for posting events to registered subscribers.
///
/// # Example
///
/// ```rust
/// use threaded_events::prelude::*;
/// use std::sync::Arc;
///
/// #[derive(Debug)]
/// struct Greeting(String);
///
/// impl_event!(Greeting);
///
/// struct Console;
///
/// impl Subscriber for Console {
///     fn subscriptions(handlers: &mut Handlers<Self>) {
///         handlers.on(ThreadMode::Posting, |_: &Console, greeting: &Greeting| {
///             println!("{}", greeting.0);
///         });
///     }
/// }
///
/// let bus = EventBus::builder().build()?;
/// let main = bus.spawn_main_loop()?;
///
/// bus.register(&Arc::new(Console))?;
/// bus.post(Greeting("hello".into()))?;
///
/// bus.shutdown()?;
/// main.join()?;
/// # Ok::<(), threaded_events::Error>(())
/// ```
pub struct EventBus {
    pub(crate) config: EventBusConfig,
    pub(crate) registry: Arc<dyn SubscriberRegistry>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) main_loop: Mutex<Option<MainLoop>>,
    pub(crate) is_shutting_down: AtomicBool,
}

impl EventBus {
    /// Create a new EventBus builder
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::new()
    }

    /// Register every handler `subscriber` declares.
    ///
    /// Registering the same instance again is a no-op. A malformed
    /// declaration fails the whole registration and nothing is stored.
    pub fn register<S: Subscriber>(&self, subscriber: &Arc<S>) -> Result<()> {
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }

        let id = SubscriberId::of(subscriber);
        if self.registry.contains(id) {
            trace!(subscriber_id = %id, "Subscriber already registered");
            return Ok(());
        }

        let descriptors = scan(subscriber)?;
        if descriptors.is_empty() {
            debug!(
                subscriber = std::any::type_name::<S>(),
                "Subscriber declares no handlers"
            );
        }

        self.registry
            .insert(id, RegistryEntry::new(subscriber, descriptors));
        Ok(())
    }

    /// Remove every handler of `subscriber`.
    ///
    /// Returns whether the subscriber was registered.
    pub fn unregister<S: ?Sized>(&self, subscriber: &Arc<S>) -> bool {
        self.registry.remove(SubscriberId::of(subscriber)).is_some()
    }

    /// Whether `subscriber` is registered
    pub fn is_registered<S: ?Sized>(&self, subscriber: &Arc<S>) -> bool {
        self.registry.contains(SubscriberId::of(subscriber))
    }

    /// Post an event to every matching handler.
    ///
    /// Returns the id assigned to the event. Handler failures are never
    /// returned here; a handler that could not be scheduled is.
    pub fn post<E: Event>(&self, event: E) -> Result<Uuid> {
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }

        self.dispatcher.post(event)
    }

    /// Hand out the main loop; succeeds once per bus
    pub fn take_main_loop(&self) -> Result<MainLoop> {
        self.main_loop.lock().take().ok_or(Error::MainLoopTaken)
    }

    /// Run the main loop on a new thread named after the configuration
    pub fn spawn_main_loop(&self) -> Result<MainThread> {
        let main_loop = self.take_main_loop()?;
        let main = main_loop.spawn(self.config.main_thread_name.clone())?;
        info!(thread = %self.config.main_thread_name, "Main loop spawned");
        Ok(main)
    }

    /// Whether the calling thread is the main thread
    pub fn is_main_context(&self) -> bool {
        self.dispatcher.executor().is_main_thread()
    }

    /// The bound main thread, if any
    pub fn main_thread_id(&self) -> Option<ThreadId> {
        self.dispatcher.executor().main_thread_id()
    }

    /// Get statistics about the event bus
    pub fn stats(&self) -> EventBusStats {
        let registry = self.registry.stats();
        EventBusStats {
            subscribers: registry.subscribers,
            subscriptions: registry.subscriptions,
            empty_subscribers: registry.empty_subscribers,
            dispatcher: self.dispatcher.stats(),
            pool: self.dispatcher.executor().pool_stats(),
        }
    }

    /// Unregister every subscriber
    pub fn clear(&self) {
        debug!(subscribers = self.registry.subscriber_count(), "Clearing registry");
        self.registry.clear();
    }

    /// Check if the event bus is shutting down
    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::Acquire)
    }

    /// Shutdown the event bus gracefully.
    ///
    /// Queued async work still runs; the main loop stops after the tasks
    /// already queued for it. Must not be called from a handler running in
    /// the worker pool.
    pub fn shutdown(&self) -> Result<()> {
        if self.is_shutting_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("Shutting down EventBus");

        if let Err(e) = self
            .dispatcher
            .executor()
            .shutdown(self.config.shutdown_timeout)
        {
            warn!(error = %e, "Executor shutdown incomplete");
        }

        info!("EventBus shutdown complete");
        Ok(())
    }

    /// Install `bus` as the process-wide default
    pub fn install_default(bus: EventBus) -> Result<&'static EventBus> {
        DEFAULT_BUS
            .set(bus)
            .map_err(|_| Error::ConfigError("default EventBus already installed".into()))?;
        info!("Default EventBus installed");
        DEFAULT_BUS
            .get()
            .ok_or_else(|| Error::internal("default EventBus missing after install"))
    }

    /// The process-wide default bus, if one was installed
    pub fn default_bus() -> Option<&'static EventBus> {
        DEFAULT_BUS.get()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("is_shutting_down", &self.is_shutting_down())
            .finish()
    }
}

/// Statistics about the event bus
#[derive(Debug, Clone)]
pub struct EventBusStats {
    /// Registered subscribers
    pub subscribers: usize,

    /// Registered handlers across all subscribers
    pub subscriptions: usize,

    /// Subscribers registered without any handler
    pub empty_subscribers: usize,

    /// Dispatcher statistics
    pub dispatcher: DispatcherStats,

    /// Worker pool statistics
    pub pool: PoolStats,
}

impl fmt::Display for EventBusStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EventBus Stats: {} subscribers, {} subscriptions, {} events posted, {} handler failures, {} rejected",
            self.subscribers,
            self.subscriptions,
            self.dispatcher.events_posted,
            self.dispatcher.handler_failures,
            self.dispatcher.rejected
        )
    }
}
