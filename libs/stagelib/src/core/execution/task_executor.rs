// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Executors that [`ExecutorThreadingModel`](super::ExecutorThreadingModel)
//! submits rounds to.
//!
//! Whoever creates an executor owns its shutdown. [`ThreadPool`] shuts down
//! explicitly via [`ThreadPool::shutdown`] or when dropped.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::core::{Result, StageError};

/// A unit of work handed to an executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Anything that can run tasks.
pub trait TaskExecutor: Send + Sync {
    /// Hand `task` over for execution.
    ///
    /// # Errors
    /// Returns [`StageError::ExecutorShutdown`] if the executor no longer
    /// accepts work.
    fn execute(&self, task: Task) -> Result<()>;
}

/// Runs each task to completion on the submitting thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialExecutor;

impl SerialExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl TaskExecutor for SerialExecutor {
    fn execute(&self, task: Task) -> Result<()> {
        task();
        Ok(())
    }
}

/// Fixed-size pool of worker threads fed through a channel.
pub struct ThreadPool {
    name: String,
    sender: Mutex<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    completed: Arc<AtomicUsize>,
}

impl ThreadPool {
    /// Spawn `workers` threads named `{name}-{index}`.
    ///
    /// # Errors
    /// Returns [`StageError::InvalidArgument`] for zero workers, or
    /// [`StageError::Runtime`] if a worker thread cannot be spawned.
    pub fn new(name: impl Into<String>, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(StageError::InvalidArgument(
                "thread pool needs at least one worker".into(),
            ));
        }
        let name = name.into();
        let (sender, receiver) = crossbeam_channel::unbounded::<Task>();
        let completed = Arc::new(AtomicUsize::new(0));

        let pool = Self {
            name: name.clone(),
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(Vec::with_capacity(workers)),
            completed: completed.clone(),
        };

        for index in 0..workers {
            let receiver = receiver.clone();
            let completed = completed.clone();
            let worker_name = format!("{}-{}", name, index);
            let handle = std::thread::Builder::new()
                .name(worker_name.clone())
                .spawn(move || worker_loop(&worker_name, receiver, completed))
                .map_err(|e| StageError::Runtime(format!("Failed to spawn thread: {}", e)))?;
            pool.workers.lock().push(handle);
        }

        tracing::debug!("[{}] Thread pool started with {} worker(s)", name, workers);
        Ok(pool)
    }

    /// Number of tasks that have run to completion (or panicked).
    pub fn completed_tasks(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn is_shutdown(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Stop accepting tasks, let queued tasks drain, and join the workers.
    ///
    /// Idempotent. Must not be called from one of the pool's own workers.
    pub fn shutdown(&self) {
        // Dropping the only sender disconnects the channel once it drains.
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let current = std::thread::current().id();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            // Last reference dropped by a task: that worker exits on its own.
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                tracing::warn!("[{}] Worker thread panicked during shutdown", self.name);
            }
        }
        tracing::debug!("[{}] Thread pool shut down", self.name);
    }
}

impl TaskExecutor for ThreadPool {
    fn execute(&self, task: Task) -> Result<()> {
        match self.sender.lock().as_ref() {
            Some(sender) => sender
                .send(task)
                .map_err(|_| StageError::ExecutorShutdown),
            None => Err(StageError::ExecutorShutdown),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.name)
            .field("workers", &self.workers.lock().len())
            .field("completed", &self.completed_tasks())
            .finish()
    }
}

fn worker_loop(name: &str, receiver: Receiver<Task>, completed: Arc<AtomicUsize>) {
    tracing::trace!("[{}] Worker started", name);
    for task in receiver.iter() {
        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            tracing::warn!("[{}] Task panicked", name);
        }
        completed.fetch_add(1, Ordering::AcqRel);
    }
    tracing::trace!("[{}] Worker exiting", name);
}
