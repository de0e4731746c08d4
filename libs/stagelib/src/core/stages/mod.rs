// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod collection;
mod consumer;
mod processor;
mod producer;
mod stage;
mod state;

pub use collection::{CollectSink, IterSource};
pub use consumer::{Consume, Consumer};
pub use processor::{Processor, Transform};
pub use producer::{Produce, Producer};
pub use stage::{run_round, start_stage, Stage, StageExt, StageLifecycle};
pub use state::{FinishReason, StageState, TerminationLatch};
