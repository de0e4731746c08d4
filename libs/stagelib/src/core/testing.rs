// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Helpers for asserting on pipelines in tests.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::logging::StageLogger;
use crate::core::StageError;

/// One captured `log_message` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub stage: String,
    pub message: String,
    pub cause: String,
}

/// A [`StageLogger`] that keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of entries whose message contains `needle`.
    pub fn count_containing(&self, needle: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.message.contains(needle))
            .count()
    }
}

impl StageLogger for RecordingLogger {
    fn log_message(&self, stage: &str, message: &str, cause: &StageError) {
        tracing::debug!("[{}] recorded: {}: {}", stage, message, cause);
        self.entries.lock().push(LogEntry {
            stage: stage.to_string(),
            message: message.to_string(),
            cause: cause.to_string(),
        });
    }
}

/// Poll `condition` every millisecond until it holds or `timeout` elapses.
///
/// Returns whether the condition was observed to hold.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}
