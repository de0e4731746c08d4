// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use parking_lot::Mutex;

use super::task_executor::TaskExecutor;
use super::ThreadingModel;
use crate::core::stages::{run_round, Stage};
use crate::core::{Result, StageError};

/// Default pause between two round submissions.
pub const DEFAULT_SPAWN_DELAY: Duration = Duration::from_millis(1000);

/// Feeds rounds to a caller-supplied [`TaskExecutor`].
///
/// Each `run()` starts a monitor thread that submits one
/// "run a round unless finished" task, waits for it to complete, sleeps for
/// the spawn delay and repeats until the stage finishes. Many models can
/// share one executor. The executor's shutdown stays with whoever created
/// it.
pub struct ExecutorThreadingModel {
    executor: Arc<dyn TaskExecutor>,
    spawn_delay_ms: Arc<AtomicU64>,
    rounds_submitted: Arc<AtomicUsize>,
    monitors: Mutex<Vec<JoinHandle<()>>>,
}

impl ExecutorThreadingModel {
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            executor,
            spawn_delay_ms: Arc::new(AtomicU64::new(DEFAULT_SPAWN_DELAY.as_millis() as u64)),
            rounds_submitted: Arc::new(AtomicUsize::new(0)),
            monitors: Mutex::new(Vec::new()),
        }
    }

    pub fn with_spawn_delay(executor: Arc<dyn TaskExecutor>, delay: Duration) -> Self {
        let model = Self::new(executor);
        model.set_spawn_delay(delay);
        model
    }

    pub fn spawn_delay(&self) -> Duration {
        Duration::from_millis(self.spawn_delay_ms.load(Ordering::Acquire))
    }

    /// Delays under 1ms are treated as 1ms.
    pub fn set_spawn_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX).max(1);
        self.spawn_delay_ms.store(millis, Ordering::Release);
    }

    /// Rounds handed to the executor across every `run()`.
    pub fn rounds_submitted(&self) -> usize {
        self.rounds_submitted.load(Ordering::Acquire)
    }

    /// Wait for every monitor thread started so far to exit.
    pub fn join_monitors(&self) {
        let monitors: Vec<_> = self.monitors.lock().drain(..).collect();
        for monitor in monitors {
            if monitor.join().is_err() {
                tracing::warn!("Executor monitor thread panicked");
            }
        }
    }
}

impl ThreadingModel for ExecutorThreadingModel {
    fn run(&self, stage: Arc<dyn Stage>) -> Result<()> {
        let name = stage.lifecycle().name().to_string();
        let executor = Arc::clone(&self.executor);
        let spawn_delay_ms = Arc::clone(&self.spawn_delay_ms);
        let rounds_submitted = Arc::clone(&self.rounds_submitted);

        let monitor = std::thread::Builder::new()
            .name(format!("stage-{}-monitor", name))
            .spawn(move || {
                monitor_loop(&name, stage, executor, spawn_delay_ms, rounds_submitted)
            })
            .map_err(|e| StageError::Runtime(format!("Failed to spawn thread: {}", e)))?;

        self.monitors.lock().push(monitor);
        Ok(())
    }

    fn description(&self) -> String {
        format!(
            "ExecutorBacked (rounds submitted every {}ms)",
            self.spawn_delay().as_millis()
        )
    }
}

impl std::fmt::Debug for ExecutorThreadingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorThreadingModel")
            .field("spawn_delay", &self.spawn_delay())
            .field("rounds_submitted", &self.rounds_submitted())
            .finish()
    }
}

fn monitor_loop(
    name: &str,
    stage: Arc<dyn Stage>,
    executor: Arc<dyn TaskExecutor>,
    spawn_delay_ms: Arc<AtomicU64>,
    rounds_submitted: Arc<AtomicUsize>,
) {
    tracing::trace!("[{}] Executor monitor started", name);

    while !stage.is_finished() {
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let round_stage = Arc::clone(&stage);
        let submitted = executor.execute(Box::new(move || {
            if !round_stage.is_finished() {
                run_round(round_stage.as_ref());
            }
            let _ = done_tx.send(());
        }));

        if let Err(e) = submitted {
            stage.log_message("Executor refused round, stopping monitor", &e);
            return;
        }
        rounds_submitted.fetch_add(1, Ordering::AcqRel);

        let delay = Duration::from_millis(spawn_delay_ms.load(Ordering::Acquire));
        // Never more than one round of this stage in the executor.
        loop {
            match done_rx.recv_timeout(delay) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) if stage.is_finished() => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
        std::thread::sleep(delay);
    }

    tracing::debug!(
        "[{}] Executor monitor finished: {:?}",
        name,
        stage.lifecycle().finish_reason()
    );
}
