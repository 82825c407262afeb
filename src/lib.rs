//! # threaded-events
//!
//! An in-process publish/subscribe event bus that runs each handler on the
//! thread its subscriber asks for.
//!
//! ## Features
//!
//! - **Typed** handler declarations, checked when a subscriber registers
//! - **Covariant** matching through capability traits (`dyn Animal`)
//! - **Thread modes**: inline on the poster, on a designated main thread,
//!   or off the main thread in a bounded worker pool
//! - **Isolated** handler failures, logged and reported but never returned
//!   to the poster
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use threaded_events::prelude::*;
//!
//! #[derive(Debug)]
//! struct UserRegistered {
//!     email: String,
//! }
//!
//! impl_event!(UserRegistered);
//!
//! struct Mailer;
//!
//! impl Subscriber for Mailer {
//!     fn subscriptions(handlers: &mut Handlers<Self>) {
//!         handlers.on(ThreadMode::Async, |_: &Mailer, event: &UserRegistered| {
//!             println!("Sending welcome mail to {}", event.email);
//!         });
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let bus = EventBus::builder().build()?;
//!     let mut main_loop = bus.take_main_loop()?;
//!     main_loop.bind()?;
//!
//!     let mailer = Arc::new(Mailer);
//!     bus.register(&mailer)?;
//!
//!     bus.post(UserRegistered {
//!         email: "user@example.com".to_string(),
//!     })?;
//!     main_loop.run_pending()?;
//!
//!     bus.unregister(&mailer);
//!     bus.shutdown()
//! }
//! ```

#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    unreachable_pub
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Core event system traits and types
pub mod event;

/// Error types and result aliases
pub mod error;

/// Subscriber declarations, discovery and descriptors
pub mod subscription;

/// Subscriber registry
pub mod registry;

/// Main thread queue and worker pool
pub mod executor;

/// Event dispatcher for routing events
pub mod dispatcher;

/// The main event bus implementation
pub mod bus;

#[cfg(test)]
pub(crate) mod test_util;

// Re-export commonly used types
pub use bus::{EventBus, EventBusBuilder, EventBusConfig, EventBusStats};
pub use dispatcher::{DispatcherStats, FailureHook};
pub use error::{BoxError, Error, HandlerFailure, Result};
pub use event::{Event, EventEnvelope, EventType, EventView};
pub use executor::{MainLoop, MainThread, PoolConfig, PoolStats};
pub use subscription::{
    HandlerMethod, Handlers, Subscriber, SubscriberId, SubscriptionDescriptor, ThreadMode,
};

/// Prelude module for convenient imports
///
/// # Example
/// ```rust
/// use threaded_events::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bus::{EventBus, EventBusBuilder, EventBusConfig};
    pub use crate::error::{Error, Result};
    pub use crate::event::Event;
    pub use crate::impl_event;
    pub use crate::subscription::{Handlers, Subscriber, ThreadMode};
}
