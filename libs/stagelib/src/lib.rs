// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Staged processing pipelines.
//!
//! Stages ([`Producer`], [`Consumer`], [`Processor`]) hand items to each
//! other through timeout-aware [`Link`]s. How often and on which thread a
//! stage runs is decided by its [`ThreadingModel`].

#![allow(clippy::type_complexity)] // Complex types are clear in context

pub mod core;

pub use crate::core::prelude;

pub use crate::core::{
    init_logging,
    run_round,
    start_stage,
    AlwaysFailsThreadingModel,
    CollectSink,
    Consume,
    Consumer,
    ExecutorThreadingModel,
    FinishReason,
    InlineThreadingModel,
    IterSource,
    Link,
    LinkConfig,
    PrefixedStageLogger,
    Processor,
    Produce,
    Producer,
    Result,
    SerialExecutor,
    SingleThreadThreadingModel,
    SpawningThreadingModel,
    Stage,
    StageError,
    StageExt,
    StageLifecycle,
    StageLogger,
    StageState,
    StageUniqueId,
    Task,
    TaskExecutor,
    TerminationLatch,
    ThreadPool,
    ThreadingModel,
    ThreadingStrategy,
    Transform,
    TracingStageLogger,
};
