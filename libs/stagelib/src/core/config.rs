// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::execution::{
    AlwaysFailsThreadingModel, ExecutorThreadingModel, InlineThreadingModel,
    SingleThreadThreadingModel, SpawningThreadingModel, TaskExecutor, ThreadingModel,
    DEFAULT_SPAWN_DELAY, DEFAULT_SPAWN_PERIOD,
};
use crate::core::{Result, StageError};

/// Settings for building a [`Link`](crate::core::Link).
///
/// The default is an unbounded link that never waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Maximum queued items. `None` means unbounded.
    #[serde(default)]
    pub capacity: Option<usize>,

    /// How long `add()` waits for space, in milliseconds.
    #[serde(default)]
    pub add_timeout_ms: u64,

    /// How long `get()` waits on an empty link with live sources, in
    /// milliseconds.
    #[serde(default)]
    pub fetch_timeout_ms: u64,
}

impl LinkConfig {
    /// # Errors
    /// Returns [`StageError::Configuration`] if `json` does not describe a
    /// link config.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| StageError::Configuration(format!("Invalid link config: {}", e)))
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn with_add_timeout(mut self, timeout: Duration) -> Self {
        self.add_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

/// Which [`ThreadingModel`] drives a stage.
///
/// | Strategy | Model |
/// |----------|-------|
/// | [`Inline`] | [`InlineThreadingModel`] |
/// | [`SingleThread`] | [`SingleThreadThreadingModel`] |
/// | [`Spawning`] | [`SpawningThreadingModel`] |
/// | [`ExecutorBacked`] | [`ExecutorThreadingModel`] |
/// | [`AlwaysFails`] | [`AlwaysFailsThreadingModel`] |
///
/// [`Inline`]: ThreadingStrategy::Inline
/// [`SingleThread`]: ThreadingStrategy::SingleThread
/// [`Spawning`]: ThreadingStrategy::Spawning
/// [`ExecutorBacked`]: ThreadingStrategy::ExecutorBacked
/// [`AlwaysFails`]: ThreadingStrategy::AlwaysFails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ThreadingStrategy {
    #[default]
    Inline,

    SingleThread,

    Spawning {
        /// How long the driving loop waits on one round before spawning the
        /// next. Must be positive.
        #[serde(default = "default_spawn_period_ms")]
        spawn_period_ms: u64,
    },

    ExecutorBacked {
        /// Pause between two round submissions. Values under 1 are raised
        /// to 1.
        #[serde(default = "default_spawn_delay_ms")]
        spawn_delay_ms: u64,
    },

    AlwaysFails,
}

fn default_spawn_period_ms() -> u64 {
    DEFAULT_SPAWN_PERIOD.as_millis() as u64
}

fn default_spawn_delay_ms() -> u64 {
    DEFAULT_SPAWN_DELAY.as_millis() as u64
}

impl ThreadingStrategy {
    /// # Errors
    /// Returns [`StageError::Configuration`] if `json` names no known
    /// strategy.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| StageError::Configuration(format!("Invalid threading strategy: {}", e)))
    }

    pub const fn spawning() -> Self {
        ThreadingStrategy::Spawning {
            spawn_period_ms: DEFAULT_SPAWN_PERIOD.as_millis() as u64,
        }
    }

    pub const fn executor_backed() -> Self {
        ThreadingStrategy::ExecutorBacked {
            spawn_delay_ms: DEFAULT_SPAWN_DELAY.as_millis() as u64,
        }
    }

    /// Get a human-readable description.
    pub fn description(&self) -> String {
        match self {
            ThreadingStrategy::Inline => "Inline".to_string(),
            ThreadingStrategy::SingleThread => "SingleThread".to_string(),
            ThreadingStrategy::Spawning { spawn_period_ms } => {
                format!("Spawning (every {}ms)", spawn_period_ms)
            }
            ThreadingStrategy::ExecutorBacked { spawn_delay_ms } => {
                format!("ExecutorBacked (every {}ms)", spawn_delay_ms)
            }
            ThreadingStrategy::AlwaysFails => "AlwaysFails".to_string(),
        }
    }

    /// Instantiate the model.
    ///
    /// # Errors
    /// [`StageError::Configuration`] for `ExecutorBacked` without an
    /// executor, [`StageError::InvalidArgument`] for a zero spawn period.
    pub fn build(
        &self,
        executor: Option<Arc<dyn TaskExecutor>>,
    ) -> Result<Arc<dyn ThreadingModel>> {
        let model: Arc<dyn ThreadingModel> = match *self {
            ThreadingStrategy::Inline => Arc::new(InlineThreadingModel::new()),
            ThreadingStrategy::SingleThread => Arc::new(SingleThreadThreadingModel::new()),
            ThreadingStrategy::Spawning { spawn_period_ms } => Arc::new(
                SpawningThreadingModel::with_spawn_period(Duration::from_millis(spawn_period_ms))?,
            ),
            ThreadingStrategy::ExecutorBacked { spawn_delay_ms } => {
                let executor = executor.ok_or_else(|| {
                    StageError::Configuration(
                        "ExecutorBacked threading needs a task executor".into(),
                    )
                })?;
                Arc::new(ExecutorThreadingModel::with_spawn_delay(
                    executor,
                    Duration::from_millis(spawn_delay_ms),
                ))
            }
            ThreadingStrategy::AlwaysFails => Arc::new(AlwaysFailsThreadingModel::new()),
        };
        Ok(model)
    }
}

impl std::fmt::Display for ThreadingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description())
    }
}
