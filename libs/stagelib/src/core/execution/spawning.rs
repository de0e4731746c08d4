// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use parking_lot::Mutex;

use super::ThreadingModel;
use crate::core::stages::{run_round, Stage};
use crate::core::{Result, StageError};

/// Default time the driving loop waits on a round before spawning the next.
pub const DEFAULT_SPAWN_PERIOD: Duration = Duration::from_millis(1000);

/// Spawns a fresh thread for every round.
///
/// The driving loop runs on the caller's thread and waits up to the spawn
/// period for each round. A round that overruns does not hold the loop up,
/// but the next round still waits for it to release the round gate before
/// calling `execute()`.
#[derive(Debug)]
pub struct SpawningThreadingModel {
    spawn_period_ms: AtomicU64,
    spawned: AtomicUsize,
}

impl SpawningThreadingModel {
    pub fn new() -> Self {
        Self {
            spawn_period_ms: AtomicU64::new(DEFAULT_SPAWN_PERIOD.as_millis() as u64),
            spawned: AtomicUsize::new(0),
        }
    }

    /// # Errors
    /// Returns [`StageError::InvalidArgument`] for a period under 1ms.
    pub fn with_spawn_period(period: Duration) -> Result<Self> {
        let model = Self::new();
        model.set_spawn_period(period)?;
        Ok(model)
    }

    pub fn spawn_period(&self) -> Duration {
        Duration::from_millis(self.spawn_period_ms.load(Ordering::Acquire))
    }

    /// # Errors
    /// Returns [`StageError::InvalidArgument`] for a period under 1ms.
    pub fn set_spawn_period(&self, period: Duration) -> Result<()> {
        let millis = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        if millis == 0 {
            return Err(StageError::InvalidArgument(format!(
                "spawn period must be positive; was {:?}",
                period
            )));
        }
        self.spawn_period_ms.store(millis, Ordering::Release);
        Ok(())
    }

    /// How many round threads this model has spawned.
    pub fn threads_spawned(&self) -> usize {
        self.spawned.load(Ordering::Acquire)
    }
}

impl Default for SpawningThreadingModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadingModel for SpawningThreadingModel {
    fn run(&self, stage: Arc<dyn Stage>) -> Result<()> {
        let name = stage.lifecycle().name().to_string();
        let gate = Arc::new(Mutex::new(()));

        while !stage.is_finished() {
            let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
            let round_stage = Arc::clone(&stage);
            let round_gate = Arc::clone(&gate);

            std::thread::Builder::new()
                .name(format!("stage-{}-round", name))
                .spawn(move || {
                    {
                        let _round = round_gate.lock();
                        if !round_stage.is_finished() {
                            run_round(round_stage.as_ref());
                        }
                    }
                    let _ = done_tx.send(());
                })
                .map_err(|e| StageError::Runtime(format!("Failed to spawn thread: {}", e)))?;
            self.spawned.fetch_add(1, Ordering::AcqRel);

            let period = self.spawn_period();
            match done_rx.recv_timeout(period) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => {
                    tracing::debug!(
                        "[{}] Round still running after {:?}, spawning the next one",
                        name,
                        period
                    );
                }
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("[{}] Round thread exited without reporting", name);
                }
            }
        }

        tracing::debug!(
            "[{}] Spawning loop finished: {:?}",
            name,
            stage.lifecycle().finish_reason()
        );
        Ok(())
    }

    fn description(&self) -> String {
        format!(
            "Spawning (one thread per round, {}ms spawn period)",
            self.spawn_period().as_millis()
        )
    }
}
