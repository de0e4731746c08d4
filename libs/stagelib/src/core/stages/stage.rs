// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The lifecycle every pipeline participant shares.
//!
//! ```text
//! NotStarted --start()--> Running --latch closes--> Finished(reason)
//! ```
//!
//! `start()` hands the stage to its [`ThreadingModel`] exactly once. The
//! threading model then calls [`Stage::execute`] repeatedly until
//! [`Stage::is_finished`] turns true, which it does through a one-way
//! [`TerminationLatch`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::state::{FinishReason, StageState, TerminationLatch};
use crate::core::execution::ThreadingModel;
use crate::core::{Result, StageError, StageUniqueId};

/// A pipeline participant driven by a [`ThreadingModel`].
///
/// Implementations must tolerate `execute()` being called after they
/// finished: log a misuse diagnostic and return without side effects.
pub trait Stage: Send + Sync + 'static {
    /// Identity, threading model and termination latch of this stage.
    fn lifecycle(&self) -> &StageLifecycle;

    /// Perform exactly one unit of work.
    fn execute(&self);

    /// Authoritative terminal predicate. Once true, stays true.
    fn is_finished(&self) -> bool;

    /// The single error-reporting hook a stage exposes.
    fn log_message(&self, message: &str, cause: &StageError);
}

/// State shared by every [`Stage`] implementation.
pub struct StageLifecycle {
    id: StageUniqueId,
    name: String,
    threading: Arc<dyn ThreadingModel>,
    started: AtomicBool,
    latch: TerminationLatch,
}

impl StageLifecycle {
    pub fn new(name: impl Into<String>, threading: Arc<dyn ThreadingModel>) -> Self {
        Self {
            id: StageUniqueId::new(),
            name: name.into(),
            threading,
            started: AtomicBool::new(false),
            latch: TerminationLatch::new(),
        }
    }

    pub fn id(&self) -> &StageUniqueId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threading_model(&self) -> &Arc<dyn ThreadingModel> {
        &self.threading
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn latch(&self) -> &TerminationLatch {
        &self.latch
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.latch.reason()
    }

    pub fn state(&self) -> StageState {
        match self.latch.reason() {
            Some(reason) => StageState::Finished(reason),
            None if self.is_started() => StageState::Running,
            None => StageState::NotStarted,
        }
    }

    fn mark_started(&self) -> bool {
        self.started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl std::fmt::Debug for StageLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageLifecycle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("threading", &self.threading.description())
            .field("state", &self.state())
            .finish()
    }
}

/// Start `stage` on its threading model.
///
/// Only the first call reaches the threading model. Later calls log a
/// diagnostic through the stage and return `Ok(())`.
///
/// # Errors
/// Returns whatever the threading model returns from `run()`.
pub fn start_stage(stage: Arc<dyn Stage>) -> Result<()> {
    let lifecycle = stage.lifecycle();
    if !lifecycle.mark_started() {
        stage.log_message("Can only start once", &StageError::AlreadyStarted);
        return Ok(());
    }

    let threading = Arc::clone(lifecycle.threading_model());
    tracing::info!(
        "[{}] Starting with {}",
        lifecycle.name(),
        threading.description()
    );
    threading.run(stage)
}

/// `start()` for stages held behind an `Arc`.
pub trait StageExt {
    fn start(&self) -> Result<()>;
}

impl<S: Stage> StageExt for Arc<S> {
    fn start(&self) -> Result<()> {
        start_stage(self.clone())
    }
}

/// Run one round of `stage`, turning an escaping panic into a diagnostic.
///
/// Threading models call this instead of `execute()` directly so a
/// misbehaving round never kills the driving loop.
pub fn run_round(stage: &dyn Stage) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| stage.execute())) {
        stage.log_message(
            "Unhandled error during execute",
            &StageError::from_panic(payload),
        );
    }
}
