// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use super::ThreadingModel;
use crate::core::stages::{run_round, Stage};
use crate::core::{Result, StageError};

/// Spawns one dedicated thread per `run()` that loops until the stage
/// finishes.
///
/// Sharing one instance between several stages still gives each stage its
/// own thread.
#[derive(Debug, Default)]
pub struct SingleThreadThreadingModel {
    handles: Mutex<Vec<JoinHandle<()>>>,
    spawned: AtomicUsize,
}

impl SingleThreadThreadingModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many driving threads this model has spawned.
    pub fn threads_spawned(&self) -> usize {
        self.spawned.load(Ordering::Acquire)
    }

    /// Wait for every driving thread spawned so far to exit.
    pub fn join_all(&self) {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            let name = handle.thread().name().unwrap_or("stage").to_string();
            if handle.join().is_err() {
                tracing::warn!("[{}] Driving thread panicked", name);
            }
        }
    }
}

impl ThreadingModel for SingleThreadThreadingModel {
    fn run(&self, stage: Arc<dyn Stage>) -> Result<()> {
        let name = stage.lifecycle().name().to_string();
        let thread_name = format!("stage-{}", name);

        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                tracing::trace!("[{}] Dedicated thread started", name);
                while !stage.is_finished() {
                    run_round(stage.as_ref());
                }
                tracing::debug!(
                    "[{}] Dedicated thread stopped: {:?}",
                    name,
                    stage.lifecycle().finish_reason()
                );
            })
            .map_err(|e| StageError::Runtime(format!("Failed to spawn thread: {}", e)))?;

        self.spawned.fetch_add(1, Ordering::AcqRel);
        self.handles.lock().push(handle);
        Ok(())
    }

    fn description(&self) -> String {
        "SingleThread (one dedicated thread per stage)".to_string()
    }
}
