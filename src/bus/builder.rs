//! Builder pattern for constructing EventBus instances.

use crate::bus::config::EventBusConfig;
use crate::dispatcher::{Dispatcher, FailureHook};
use crate::error::HandlerFailure;
use crate::executor::Executor;
use crate::registry::{DashMapRegistry, SubscriberRegistry};
use crate::{EventBus, Result};
use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

/// Builder for creating EventBus instances
#[allow(missing_debug_implementations)]
pub struct EventBusBuilder {
    config: EventBusConfig,
    registry: Option<Arc<dyn SubscriberRegistry>>,
    failure_hook: Option<FailureHook>,
}

impl EventBusBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: EventBusConfig::default(),
            registry: None,
            failure_hook: None,
        }
    }

    /// Use a custom configuration
    pub fn config(mut self, config: EventBusConfig) -> Self {
        self.config = config;
        self
    }

    /// Configure the event bus
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(EventBusConfig) -> EventBusConfig,
    {
        self.config = f(self.config);
        self
    }

    /// Use a custom registry implementation
    pub fn registry(mut self, registry: Arc<dyn SubscriberRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Receive every handler failure after it has been logged
    pub fn on_handler_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HandlerFailure) + Send + Sync + 'static,
    {
        self.failure_hook = Some(Arc::new(hook));
        self
    }

    /// Build the EventBus
    pub fn build(self) -> Result<EventBus> {
        info!("Building EventBus");
        self.config.validate()?;

        let registry = self.registry.unwrap_or_else(|| {
            info!("Creating default DashMapRegistry");
            Arc::new(DashMapRegistry::with_capacity(64))
        });

        let (executor, main_loop) = Executor::new(self.config.pool.clone());
        let dispatcher = Dispatcher::new(registry.clone(), executor, self.failure_hook);

        let bus = EventBus {
            config: self.config,
            registry,
            dispatcher,
            main_loop: Mutex::new(Some(main_loop)),
            is_shutting_down: AtomicBool::new(false),
        };

        info!("EventBus built successfully");
        Ok(bus)
    }
}

impl Default for EventBusBuilder {
    fn default() -> Self {
        Self::new()
    }
}
