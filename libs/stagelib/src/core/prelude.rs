// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Commonly used types for `use stagelib::prelude::*`.

pub use crate::core::{
    // Errors
    error::{Result, StageError},

    // Links
    links::Link,

    // Stages
    stages::{
        CollectSink, Consume, Consumer, FinishReason, IterSource, Processor, Produce, Producer,
        Stage, StageExt, Transform,
    },

    // Threading
    execution::{
        ExecutorThreadingModel, InlineThreadingModel, SingleThreadThreadingModel,
        SpawningThreadingModel, ThreadPool, ThreadingModel,
    },
};
