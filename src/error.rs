//! Error types for the threaded-events library.

use crate::subscription::ThreadMode;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by fallible handlers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for threaded-events
#[derive(Error, Debug)]
pub enum Error {
    /// A handler declaration is malformed
    #[error("Invalid handler `{handler}` on {subscriber}: handler must accept exactly one parameter (found {found})")]
    InvalidHandler {
        /// Subscriber type declaring the handler
        subscriber: &'static str,
        /// Handler name
        handler: String,
        /// Number of declared parameters
        found: usize,
    },

    /// The worker pool and its queue are both full
    #[error("Async submission rejected: worker pool saturated ({workers} workers, {queued} queued)")]
    Saturated {
        /// Live workers at rejection time
        workers: usize,
        /// Queued tasks at rejection time
        queued: usize,
    },

    /// The main loop has been dropped or stopped
    #[error("Main context is closed")]
    MainContextClosed,

    /// The main loop was drained from a thread other than the bound one
    #[error("Main loop is bound to another thread")]
    ForeignThread,

    /// The main loop was already handed out
    #[error("Main loop already taken")]
    MainLoopTaken,

    /// Event bus is shutting down
    #[error("Event bus is shutting down")]
    ShuttingDown,

    /// A worker or main-loop thread could not be started
    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Event handler error
    #[error("Handler error: {0}")]
    HandlerError(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Create a new handler error
    pub fn handler(msg: impl Into<String>) -> Self {
        Error::HandlerError(msg.into())
    }

    /// Check if this error indicates the system is shutting down
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Error::ShuttingDown)
    }

    /// Check if this error is an async submission rejection
    pub fn is_saturation(&self) -> bool {
        matches!(self, Error::Saturated { .. })
    }
}

/// Report of a handler that failed during invocation.
///
/// Failures are isolated: they are logged and handed to the failure hook
/// configured on the bus, never returned to the poster.
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    /// Id of the event being delivered
    pub event_id: Uuid,
    /// Type name of the event
    pub event_type: &'static str,
    /// Type name of the subscriber owning the handler
    pub subscriber: &'static str,
    /// Handler name
    pub handler: String,
    /// Mode the handler ran in
    pub thread_mode: ThreadMode,
    /// Error message, or the panic payload if the handler panicked
    pub message: String,
    /// Whether the handler panicked rather than returning an error
    pub panicked: bool,
    /// When the failure was recorded
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler failure at {}", self.timestamp)?;
        write!(f, " [event_id: {}]", self.event_id)?;
        write!(f, " [type: {}]", self.event_type)?;
        write!(f, " [subscriber: {}]", self.subscriber)?;
        write!(f, " [handler: {}]", self.handler)?;
        write!(f, " [mode: {}]", self.thread_mode)?;
        if self.panicked {
            write!(f, " panicked: {}", self.message)
        } else {
            write!(f, " {}", self.message)
        }
    }
}
