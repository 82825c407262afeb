//! Execution engine: places handler invocations on the right thread.
//!
//! | Mode    | Caller on main | Caller off main |
//! |---------|----------------|-----------------|
//! | POSTING | inline         | inline          |
//! | MAIN    | inline         | main queue      |
//! | ASYNC   | worker pool    | inline          |

use crate::subscription::ThreadMode;
use crate::Result;
use std::thread::ThreadId;
use std::time::Duration;

pub mod main_context;
pub mod pool;

pub use main_context::{MainLoop, MainThread};
pub use pool::{PoolConfig, PoolStats};

use main_context::MainQueue;
use pool::WorkerPool;

/// A unit of work handed to the main queue or the worker pool
pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

/// Where a task was placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Ran to completion on the calling thread
    Inline,
    /// Queued for the main thread
    MainQueue,
    /// Handed to the worker pool
    WorkerPool,
}

/// Routes tasks by thread mode
pub(crate) struct Executor {
    main: MainQueue,
    pool: WorkerPool,
}

impl Executor {
    /// Create an executor and the main loop that serves its main queue
    pub(crate) fn new(pool: PoolConfig) -> (Self, MainLoop) {
        let (main, main_loop) = main_context::channel();
        let executor = Self {
            main,
            pool: WorkerPool::new(pool),
        };
        (executor, main_loop)
    }

    /// Whether the calling thread is the main thread
    pub(crate) fn is_main_thread(&self) -> bool {
        self.main.is_current()
    }

    /// The bound main thread, if any
    pub(crate) fn main_thread_id(&self) -> Option<ThreadId> {
        self.main.thread_id()
    }

    /// Run or schedule `task` according to `mode` and the calling thread
    pub(crate) fn execute(&self, mode: ThreadMode, task: Task) -> Result<Placement> {
        let on_main = self.main.is_current();

        match (mode, on_main) {
            (ThreadMode::Posting, _) | (ThreadMode::Main, true) | (ThreadMode::Async, false) => {
                task();
                Ok(Placement::Inline)
            }
            (ThreadMode::Main, false) => {
                self.main.enqueue(task)?;
                Ok(Placement::MainQueue)
            }
            (ThreadMode::Async, true) => {
                self.pool.submit(task)?;
                Ok(Placement::WorkerPool)
            }
        }
    }

    /// Get worker pool statistics
    pub(crate) fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Stop the worker pool, then ask the main loop to stop once drained
    pub(crate) fn shutdown(&self, timeout: Duration) -> Result<()> {
        let drained = self.pool.shutdown(timeout);
        self.main.stop();
        drained
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("main_thread", &self.main.thread_id())
            .field("pool", &self.pool.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    const WAIT: Duration = Duration::from_secs(5);

    fn record(tx: &mpsc::Sender<ThreadId>) -> Task {
        let tx = tx.clone();
        Box::new(move || tx.send(thread::current().id()).unwrap())
    }

    #[test]
    fn test_posting_runs_inline_everywhere() {
        let (executor, main_loop) = Executor::new(PoolConfig::default());
        let (tx, rx) = mpsc::channel();

        assert_eq!(
            executor.execute(ThreadMode::Posting, record(&tx)).unwrap(),
            Placement::Inline
        );
        main_loop.bind().unwrap();
        assert_eq!(
            executor.execute(ThreadMode::Posting, record(&tx)).unwrap(),
            Placement::Inline
        );

        let current = thread::current().id();
        assert_eq!(rx.recv().unwrap(), current);
        assert_eq!(rx.recv().unwrap(), current);
    }

    #[test]
    fn test_main_mode_from_main_and_off_main() {
        let (executor, mut main_loop) = Executor::new(PoolConfig::default());
        main_loop.bind().unwrap();
        let main_id = thread::current().id();
        let (tx, rx) = mpsc::channel();

        assert_eq!(
            executor.execute(ThreadMode::Main, record(&tx)).unwrap(),
            Placement::Inline
        );
        assert_eq!(rx.recv().unwrap(), main_id);

        let executor = std::sync::Arc::new(executor);
        let placement = {
            let executor = executor.clone();
            let task = record(&tx);
            thread::spawn(move || executor.execute(ThreadMode::Main, task))
                .join()
                .unwrap()
                .unwrap()
        };
        assert_eq!(placement, Placement::MainQueue);
        assert!(rx.try_recv().is_err());

        assert_eq!(main_loop.run_pending().unwrap(), 1);
        assert_eq!(rx.recv().unwrap(), main_id);
    }

    #[test]
    fn test_async_mode_leaves_main_thread() {
        let (executor, main_loop) = Executor::new(PoolConfig::default());
        main_loop.bind().unwrap();
        let main_id = thread::current().id();
        let (tx, rx) = mpsc::channel();

        assert_eq!(
            executor.execute(ThreadMode::Async, record(&tx)).unwrap(),
            Placement::WorkerPool
        );
        assert_ne!(rx.recv_timeout(WAIT).unwrap(), main_id);

        let executor = std::sync::Arc::new(executor);
        let (placement, worker_id) = {
            let executor = executor.clone();
            let task = record(&tx);
            thread::spawn(move || {
                (
                    executor.execute(ThreadMode::Async, task).unwrap(),
                    thread::current().id(),
                )
            })
            .join()
            .unwrap()
        };
        assert_eq!(placement, Placement::Inline);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), worker_id);

        executor.shutdown(WAIT).unwrap();
    }

    #[test]
    fn test_nothing_is_main_until_bound() {
        let (executor, main_loop) = Executor::new(PoolConfig::default());
        assert!(!executor.is_main_thread());
        assert!(executor.main_thread_id().is_none());

        main_loop.bind().unwrap();
        assert!(executor.is_main_thread());
        assert_eq!(executor.main_thread_id(), Some(thread::current().id()));
    }

    #[test]
    fn test_main_queue_closed_is_reported() {
        let (executor, main_loop) = Executor::new(PoolConfig::default());
        drop(main_loop);

        let err = executor.execute(ThreadMode::Main, Box::new(|| {})).unwrap_err();
        assert!(matches!(err, crate::Error::MainContextClosed));
    }
}
