// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use super::ThreadingModel;
use crate::core::stages::Stage;
use crate::core::{Result, StageError};

/// Refuses to drive anything.
///
/// Useful where a stage needs a threading model but must never be started,
/// such as the two halves a [`Processor`](crate::core::stages::Processor)
/// drives itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysFailsThreadingModel;

impl AlwaysFailsThreadingModel {
    pub fn new() -> Self {
        Self
    }
}

impl ThreadingModel for AlwaysFailsThreadingModel {
    fn run(&self, stage: Arc<dyn Stage>) -> Result<()> {
        Err(StageError::ThreadingRefused(format!(
            "'{}' must not be started",
            stage.lifecycle().name()
        )))
    }

    fn description(&self) -> String {
        "AlwaysFails (never runs the stage)".to_string()
    }
}
