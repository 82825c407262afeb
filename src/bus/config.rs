//! Configuration for the event bus.

use crate::executor::PoolConfig;
use crate::Result;
use std::time::Duration;

/// Configuration for the event bus
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Worker pool configuration for async-mode handlers
    pub pool: PoolConfig,

    /// How long shutdown waits for the worker pool to drain
    pub shutdown_timeout: Duration,

    /// Thread name used by [`MainLoop::spawn`](crate::MainLoop::spawn) callers
    pub main_thread_name: String,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            shutdown_timeout: Duration::from_secs(30),
            main_thread_name: "event-main".to_string(),
        }
    }
}

impl EventBusConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set shutdown timeout
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the main thread name
    pub fn main_thread_name(mut self, name: impl Into<String>) -> Self {
        self.main_thread_name = name.into();
        self
    }

    /// Configure the worker pool
    pub fn pool_config<F>(mut self, f: F) -> Self
    where
        F: FnOnce(PoolConfig) -> PoolConfig,
    {
        self.pool = f(self.pool);
        self
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()
    }
}

/// Preset configurations for common use cases
impl EventBusConfig {
    /// Configuration for testing
    pub fn test() -> Self {
        Self::default()
            .pool_config(|p| p.keep_alive(Duration::from_millis(100)).name_prefix("test-worker"))
            .shutdown_timeout(Duration::from_secs(5))
            .main_thread_name("test-main")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EventBusConfig::default();
        assert_eq!(config.pool.core_size, 3);
        assert_eq!(config.pool.max_size, 6);
        assert_eq!(config.pool.queue_capacity, 2);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = EventBusConfig::new()
            .shutdown_timeout(Duration::from_secs(1))
            .main_thread_name("ui")
            .pool_config(|p| p.core_size(1).max_size(2));

        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.main_thread_name, "ui");
        assert_eq!(config.pool.core_size, 1);
        assert_eq!(config.pool.max_size, 2);
    }

    #[test]
    fn test_invalid_pool_is_rejected() {
        let config = EventBusConfig::new().pool_config(|p| p.core_size(4).max_size(2));
        assert!(matches!(config.validate(), Err(crate::Error::ConfigError(_))));
    }

    #[test]
    fn test_preset() {
        let config = EventBusConfig::test();
        assert_eq!(config.pool.name_prefix, "test-worker");
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }
}
