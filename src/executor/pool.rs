//! Bounded worker pool for async-mode handlers.

use super::Task;
use crate::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Workers kept alive while idle
    pub core_size: usize,

    /// Upper bound on live workers
    pub max_size: usize,

    /// Tasks waiting for a worker before the pool grows past core size
    pub queue_capacity: usize,

    /// Idle time after which a worker beyond core size exits
    pub keep_alive: Duration,

    /// Worker thread name prefix
    pub name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            core_size: 3,
            max_size: 6,
            queue_capacity: 2,
            keep_alive: Duration::from_secs(2),
            name_prefix: "event-worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the core size
    pub fn core_size(mut self, size: usize) -> Self {
        self.core_size = size;
        self
    }

    /// Set the maximum size
    pub fn max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Set the queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the keep-alive for workers beyond core size
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Set the worker thread name prefix
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Check the sizes are consistent
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::ConfigError("pool max_size must be at least 1".into()));
        }
        if self.core_size > self.max_size {
            return Err(Error::ConfigError(format!(
                "pool core_size ({}) exceeds max_size ({})",
                self.core_size, self.max_size
            )));
        }
        Ok(())
    }
}

/// Statistics for the worker pool
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Live worker threads
    pub workers: usize,

    /// Tasks waiting for a worker
    pub queued: usize,

    /// Tasks run to completion or failure
    pub completed: u64,

    /// Submissions rejected because the pool was saturated
    pub rejected: u64,
}

struct PoolState {
    queue: VecDeque<Task>,
    workers: usize,
    shutdown: bool,
}

struct Shared {
    config: PoolConfig,
    state: Mutex<PoolState>,
    work_available: Condvar,
    workers_exited: Condvar,
    next_worker: AtomicUsize,
    completed: AtomicU64,
    rejected: AtomicU64,
}

impl Shared {
    /// Account for a worker leaving; called with the state lock held
    fn retire(&self, state: &mut PoolState) {
        state.workers -= 1;
        if state.workers == 0 {
            self.workers_exited.notify_all();
        }
    }
}

/// A pool of worker threads with a bounded task queue.
///
/// Submission follows a fixed policy: start a worker while below core
/// size, otherwise queue while the queue has room, otherwise start a
/// worker while below max size, otherwise reject with
/// [`Error::Saturated`]. Tasks are never dropped silently.
pub(crate) struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Create a new worker pool; workers start on demand
    pub(crate) fn new(config: PoolConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(PoolState {
                    queue: VecDeque::new(),
                    workers: 0,
                    shutdown: false,
                }),
                work_available: Condvar::new(),
                workers_exited: Condvar::new(),
                next_worker: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
            }),
        }
    }

    /// Submit a task
    pub(crate) fn submit(&self, task: Task) -> Result<()> {
        let config = &self.shared.config;
        let mut state = self.shared.state.lock();

        if state.shutdown {
            return Err(Error::ShuttingDown);
        }

        if state.workers < config.core_size {
            state.workers += 1;
            drop(state);
            return self.spawn_worker(Some(task));
        }

        if state.queue.len() < config.queue_capacity {
            state.queue.push_back(task);
            let idle_pool = state.workers == 0;
            if idle_pool {
                state.workers += 1;
            }
            drop(state);

            if idle_pool {
                return self.spawn_worker(None);
            }
            self.shared.work_available.notify_one();
            return Ok(());
        }

        if state.workers < config.max_size {
            state.workers += 1;
            drop(state);
            return self.spawn_worker(Some(task));
        }

        let (workers, queued) = (state.workers, state.queue.len());
        drop(state);

        self.shared.rejected.fetch_add(1, Ordering::Relaxed);
        warn!(workers, queued, "Worker pool saturated, rejecting task");
        Err(Error::Saturated { workers, queued })
    }

    /// Start a worker thread; the caller has already counted it
    fn spawn_worker(&self, first: Option<Task>) -> Result<()> {
        let index = self.shared.next_worker.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{}", self.shared.config.name_prefix, index);
        let shared = self.shared.clone();

        match thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(shared, first))
        {
            Ok(_) => {
                debug!(worker = %name, "Worker started");
                Ok(())
            }
            Err(e) => {
                self.shared.retire(&mut self.shared.state.lock());
                Err(Error::ThreadSpawn(e))
            }
        }
    }

    /// Get pool statistics
    pub(crate) fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            workers: state.workers,
            queued: state.queue.len(),
            completed: self.shared.completed.load(Ordering::Relaxed),
            rejected: self.shared.rejected.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting tasks and wait for workers to finish what is queued.
    ///
    /// A timeout too large to express as a deadline waits without limit.
    /// Must not be called from a worker thread.
    pub(crate) fn shutdown(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.shared.state.lock();

        if !state.shutdown {
            info!(workers = state.workers, queued = state.queue.len(), "Stopping worker pool");
            state.shutdown = true;
            self.shared.work_available.notify_all();
        }

        while state.workers > 0 {
            let Some(deadline) = deadline else {
                self.shared.workers_exited.wait(&mut state);
                continue;
            };
            if self
                .shared
                .workers_exited
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                warn!(workers = state.workers, "Worker pool shutdown timed out");
                return Err(Error::internal("Worker pool shutdown timed out"));
            }
        }

        info!("Worker pool stopped");
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Let idle workers exit; queued tasks still run.
        self.shared.state.lock().shutdown = true;
        self.shared.work_available.notify_all();
    }
}

fn worker_loop(shared: Arc<Shared>, mut next: Option<Task>) {
    let core_size = shared.config.core_size;
    let keep_alive = shared.config.keep_alive;

    loop {
        if let Some(task) = next.take() {
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                warn!("Task panicked in worker");
            }
            shared.completed.fetch_add(1, Ordering::Relaxed);
        }

        let mut state = shared.state.lock();
        loop {
            if let Some(task) = state.queue.pop_front() {
                next = Some(task);
                break;
            }

            if state.shutdown {
                shared.retire(&mut state);
                debug!("Worker stopped");
                return;
            }

            if state.workers > core_size {
                let timed_out = shared
                    .work_available
                    .wait_for(&mut state, keep_alive)
                    .timed_out();
                if timed_out && state.queue.is_empty() && state.workers > core_size {
                    shared.retire(&mut state);
                    debug!("Idle worker retired");
                    return;
                }
            } else {
                shared.work_available.wait(&mut state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::Gate;
    use std::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.core_size, 3);
        assert_eq!(config.max_size, 6);
        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.keep_alive, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(PoolConfig::new().max_size(0).core_size(0).validate().is_err());
        assert!(PoolConfig::new().core_size(8).validate().is_err());
        assert!(PoolConfig::new().core_size(0).max_size(1).validate().is_ok());
    }

    #[test]
    fn test_worker_pool_runs_tasks_off_caller_thread() {
        let pool = WorkerPool::new(PoolConfig::new().queue_capacity(32));
        let (tx, rx) = mpsc::channel();
        let caller = thread::current().id();

        for _ in 0..10 {
            let tx = tx.clone();
            pool.submit(Box::new(move || {
                tx.send(thread::current().id()).unwrap();
            }))
            .unwrap();
        }

        for _ in 0..10 {
            assert_ne!(rx.recv_timeout(WAIT).unwrap(), caller);
        }

        pool.shutdown(WAIT).unwrap();
        assert_eq!(pool.stats().completed, 10);
    }

    #[test]
    fn test_saturation_is_reported() {
        let pool = WorkerPool::new(PoolConfig::default());
        let gate = Arc::new(Gate::new());
        let (tx, rx) = mpsc::channel();

        // 6 running + 2 queued
        for _ in 0..8 {
            let gate = gate.clone();
            let tx = tx.clone();
            pool.submit(Box::new(move || {
                gate.wait();
                tx.send(()).unwrap();
            }))
            .unwrap();
        }

        let err = pool.submit(Box::new(|| {})).unwrap_err();
        assert!(matches!(err, Error::Saturated { workers: 6, queued: 2 }));
        assert_eq!(pool.stats().rejected, 1);

        gate.open();
        for _ in 0..8 {
            rx.recv_timeout(WAIT).unwrap();
        }
        pool.shutdown(WAIT).unwrap();
    }

    #[test]
    fn test_workers_beyond_core_retire_when_idle() {
        let pool = WorkerPool::new(PoolConfig::default().keep_alive(Duration::from_millis(20)));
        let gate = Arc::new(Gate::new());

        for _ in 0..8 {
            let gate = gate.clone();
            pool.submit(Box::new(move || gate.wait())).unwrap();
        }
        assert_eq!(pool.stats().workers, 6);

        gate.open();
        let deadline = Instant::now() + WAIT;
        while pool.stats().workers > 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(pool.stats().workers, 3);
    }

    #[test]
    fn test_shutdown_drains_queue_and_rejects_new_tasks() {
        let pool = WorkerPool::new(PoolConfig::new().core_size(1).max_size(1).queue_capacity(8));
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter = counter.clone();
            pool.submit(Box::new(move || {
                thread::sleep(Duration::from_millis(5));
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }

        pool.shutdown(WAIT).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(pool.stats().workers, 0);
        assert!(pool.submit(Box::new(|| {})).unwrap_err().is_shutdown());
    }

    #[test]
    fn test_unbounded_shutdown_timeout_waits_for_workers() {
        let pool = WorkerPool::new(PoolConfig::default());
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = counter.clone();
            pool.submit(Box::new(move || {
                thread::sleep(Duration::from_millis(10));
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }

        pool.shutdown(Duration::MAX).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(pool.stats().workers, 0);
    }

    #[test]
    fn test_panicking_task_keeps_worker_alive() {
        let pool = WorkerPool::new(PoolConfig::new().core_size(1).max_size(1).queue_capacity(4));
        let (tx, rx) = mpsc::channel();

        pool.submit(Box::new(|| panic!("task failure"))).unwrap();
        pool.submit(Box::new(move || tx.send(()).unwrap())).unwrap();

        rx.recv_timeout(WAIT).unwrap();
        assert_eq!(pool.stats().workers, 1);
        pool.shutdown(WAIT).unwrap();
    }
}
