// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod config;
pub mod error;
pub mod execution;
pub mod ids;
pub mod links;
pub mod logging;
pub mod prelude;
pub mod stages;
pub mod testing;

pub use config::{LinkConfig, ThreadingStrategy};
pub use error::*;
pub use ids::StageUniqueId;
pub use links::Link;
pub use logging::{init_logging, PrefixedStageLogger, StageLogger, TracingStageLogger};

pub use execution::*;
pub use stages::*;
