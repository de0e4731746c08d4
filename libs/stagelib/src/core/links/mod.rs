// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod link;
mod source_registry;

pub use link::Link;
pub use source_registry::SourceRegistry;
