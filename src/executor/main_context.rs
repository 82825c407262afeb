//! The main execution context: a serial queue drained by one thread.

use super::Task;
use crate::{Error, Result};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info};

enum Message {
    Run(Task),
    Stop,
}

/// Create a connected main queue and main loop
pub(crate) fn channel() -> (MainQueue, MainLoop) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let binding = Arc::new(OnceLock::new());
    (
        MainQueue {
            sender,
            binding: binding.clone(),
        },
        MainLoop { receiver, binding },
    )
}

/// Sending side of the main queue, held by the executor
#[derive(Clone)]
pub(crate) struct MainQueue {
    sender: mpsc::UnboundedSender<Message>,
    binding: Arc<OnceLock<ThreadId>>,
}

impl MainQueue {
    /// Whether the calling thread is the main thread
    pub(crate) fn is_current(&self) -> bool {
        self.binding.get() == Some(&thread::current().id())
    }

    /// The bound main thread, if any
    pub(crate) fn thread_id(&self) -> Option<ThreadId> {
        self.binding.get().copied()
    }

    /// Queue a task behind every task already queued
    pub(crate) fn enqueue(&self, task: Task) -> Result<()> {
        self.sender
            .send(Message::Run(task))
            .map_err(|_| Error::MainContextClosed)
    }

    /// Ask the loop to return once the tasks queued so far have run
    pub(crate) fn stop(&self) {
        let _ = self.sender.send(Message::Stop);
    }
}

/// Receiving side of the main queue.
///
/// The host drives the loop on the thread it designates as main. The first
/// call to [`bind`](MainLoop::bind), [`run`](MainLoop::run) or
/// [`run_pending`](MainLoop::run_pending) binds the calling thread for the
/// lifetime of the bus; draining from any other thread afterwards fails
/// with [`Error::ForeignThread`].
pub struct MainLoop {
    receiver: mpsc::UnboundedReceiver<Message>,
    binding: Arc<OnceLock<ThreadId>>,
}

impl MainLoop {
    /// Designate the calling thread as the main thread
    pub fn bind(&self) -> Result<()> {
        let current = thread::current().id();
        if *self.binding.get_or_init(|| current) == current {
            Ok(())
        } else {
            Err(Error::ForeignThread)
        }
    }

    /// The bound main thread, if any
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.binding.get().copied()
    }

    /// Drain the queue until the bus stops or is dropped.
    ///
    /// Must not be called from within an async runtime. Returns the number
    /// of tasks run.
    pub fn run(mut self) -> Result<usize> {
        self.bind()?;
        info!("Main loop started");

        let mut executed = 0;
        while let Some(message) = self.receiver.blocking_recv() {
            match message {
                Message::Run(task) => {
                    task();
                    executed += 1;
                }
                Message::Stop => break,
            }
        }

        let late = self.drain_after_stop();
        if late > 0 {
            debug!(late, "Ran tasks queued behind the stop marker");
        }
        executed += late;

        info!(executed, "Main loop stopped");
        Ok(executed)
    }

    /// Run tasks that were queued after a stop marker, so none are
    /// dropped with the receiver
    fn drain_after_stop(&mut self) -> usize {
        let mut executed = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(Message::Run(task)) => {
                    task();
                    executed += 1;
                }
                Ok(Message::Stop) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return executed,
            }
        }
    }

    /// Run every task queued so far without blocking.
    ///
    /// Returns the number of tasks run.
    pub fn run_pending(&mut self) -> Result<usize> {
        self.bind()?;

        let mut executed = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(Message::Run(task)) => {
                    task();
                    executed += 1;
                }
                Ok(Message::Stop) => {
                    debug!("Main loop stop requested");
                    break;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(executed)
    }

    /// Run the loop on a dedicated thread
    pub fn spawn(self, name: impl Into<String>) -> Result<MainThread> {
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || self.run())?;
        Ok(MainThread { handle })
    }
}

impl fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainLoop")
            .field("thread_id", &self.thread_id())
            .finish()
    }
}

/// A main loop running on its own thread
#[derive(Debug)]
pub struct MainThread {
    handle: JoinHandle<Result<usize>>,
}

impl MainThread {
    /// Identity of the main thread
    pub fn thread_id(&self) -> ThreadId {
        self.handle.thread().id()
    }

    /// Wait for the loop to stop; returns the number of tasks run
    pub fn join(self) -> Result<usize> {
        self.handle
            .join()
            .map_err(|_| Error::internal("Main thread panicked"))?
    }
}
