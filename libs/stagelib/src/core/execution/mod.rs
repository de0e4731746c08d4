// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod always_fails;
mod executor_backed;
mod inline;
mod single_thread;
mod spawning;
mod task_executor;
mod threading_model;

pub use always_fails::AlwaysFailsThreadingModel;
pub use executor_backed::{ExecutorThreadingModel, DEFAULT_SPAWN_DELAY};
pub use inline::InlineThreadingModel;
pub use single_thread::SingleThreadThreadingModel;
pub use spawning::{SpawningThreadingModel, DEFAULT_SPAWN_PERIOD};
pub use task_executor::{SerialExecutor, Task, TaskExecutor, ThreadPool};
pub use threading_model::ThreadingModel;
