// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

use crate::core::stages::FinishReason;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Absent items cannot be sent through a link")]
    AbsentItem,

    #[error("Called start() when already started")]
    AlreadyStarted,

    #[error("Stage already finished: {0}")]
    AlreadyFinished(FinishReason),

    #[error("Beyond the end of the pipe")]
    EndOfStream,

    #[error("Adding to link failed: {0}")]
    AddFailed(String),

    #[error("Link is broken")]
    LinkBroken,

    #[error("Produce failed: {0}")]
    Produce(String),

    #[error("Consume failed: {0}")]
    Consume(String),

    #[error("Transform failed: {0}")]
    Transform(String),

    #[error("Round panicked: {0}")]
    Panicked(String),

    #[error("Threading model refused to run stage: {0}")]
    ThreadingRefused(String),

    #[error("Executor has been shut down")]
    ExecutorShutdown,

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    /// Build a [`StageError::Panicked`] from a `catch_unwind` payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        StageError::Panicked(message)
    }
}

pub type Result<T> = std::result::Result<T, StageError>;
