// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use crate::core::stages::Stage;
use crate::core::Result;

/// Strategy deciding how a stage's `execute()` is invoked over time.
///
/// Every implementation keeps calling `execute()` until `is_finished()`
/// returns true, never runs two rounds of the same stage at once, and
/// reports anything escaping a round through `Stage::log_message` instead of
/// stopping.
///
/// | Model | Where rounds run | Does `run()` block? |
/// |-------|------------------|---------------------|
/// | [`InlineThreadingModel`] | caller's thread | until finished |
/// | [`SingleThreadThreadingModel`] | one dedicated thread per `run()` | no |
/// | [`SpawningThreadingModel`] | a fresh thread per round | until finished |
/// | [`ExecutorThreadingModel`] | a caller-supplied executor | no |
/// | [`AlwaysFailsThreadingModel`] | nowhere | fails immediately |
///
/// [`InlineThreadingModel`]: super::InlineThreadingModel
/// [`SingleThreadThreadingModel`]: super::SingleThreadThreadingModel
/// [`SpawningThreadingModel`]: super::SpawningThreadingModel
/// [`ExecutorThreadingModel`]: super::ExecutorThreadingModel
/// [`AlwaysFailsThreadingModel`]: super::AlwaysFailsThreadingModel
pub trait ThreadingModel: Send + Sync {
    /// Drive `stage` until it reports finished.
    ///
    /// # Errors
    /// Fails if the model cannot drive the stage at all (for example a
    /// thread could not be spawned). Failures inside rounds are logged, not
    /// returned.
    fn run(&self, stage: Arc<dyn Stage>) -> Result<()>;

    /// Human-readable description for logs.
    fn description(&self) -> String;
}
