// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Stage diagnostics.
//!
//! Stages never propagate pipeline-internal failures to their caller. They
//! report them through a [`StageLogger`] instead, which defaults to
//! [`TracingStageLogger`].

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::core::StageError;

/// Environment variable read by [`init_logging`] for the filter directive.
pub const LOG_ENV_VAR: &str = "STAGELIB_LOG";

/// Sink for the diagnostics a stage reports about itself.
///
/// Called from whatever thread the stage's threading model runs on.
pub trait StageLogger: Send + Sync {
    fn log_message(&self, stage: &str, message: &str, cause: &StageError);
}

/// Default sink: forwards every diagnostic to `tracing` at WARN.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStageLogger;

impl StageLogger for TracingStageLogger {
    fn log_message(&self, stage: &str, message: &str, cause: &StageError) {
        tracing::warn!("[{}] {}: {}", stage, message, cause);
    }
}

/// Decorates another sink by prefixing every message.
pub struct PrefixedStageLogger {
    prefix: String,
    inner: Arc<dyn StageLogger>,
}

impl PrefixedStageLogger {
    pub fn new(prefix: impl Into<String>, inner: Arc<dyn StageLogger>) -> Self {
        Self {
            prefix: prefix.into(),
            inner,
        }
    }
}

impl StageLogger for PrefixedStageLogger {
    fn log_message(&self, stage: &str, message: &str, cause: &StageError) {
        let message = format!("{}{}", self.prefix, message);
        self.inner.log_message(stage, &message, cause);
    }
}

/// Shared handle to the default sink.
pub fn default_logger() -> Arc<dyn StageLogger> {
    Arc::new(TracingStageLogger)
}

/// Install a fmt subscriber filtered by `STAGELIB_LOG` (default `info`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
