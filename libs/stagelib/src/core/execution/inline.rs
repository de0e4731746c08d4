// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use super::ThreadingModel;
use crate::core::stages::{run_round, Stage};
use crate::core::Result;

/// Runs every round on the thread that called `start()`.
///
/// `run()` returns only once the stage is finished, which makes this model
/// the deterministic choice for tests and simple single-threaded pipelines.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineThreadingModel;

impl InlineThreadingModel {
    pub fn new() -> Self {
        Self
    }
}

impl ThreadingModel for InlineThreadingModel {
    fn run(&self, stage: Arc<dyn Stage>) -> Result<()> {
        let name = stage.lifecycle().name().to_string();
        tracing::trace!("[{}] Entering inline loop", name);

        while !stage.is_finished() {
            run_round(stage.as_ref());
        }

        tracing::debug!(
            "[{}] Inline loop finished: {:?}",
            name,
            stage.lifecycle().finish_reason()
        );
        Ok(())
    }

    fn description(&self) -> String {
        "Inline (rounds run on the caller's thread)".to_string()
    }
}
