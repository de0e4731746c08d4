// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;

/// Unique identifier for a pipeline stage.
///
/// Links key their source registry by this ID, so two stages never share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StageUniqueId(String);

impl StageUniqueId {
    pub fn new() -> Self {
        Self(format!("S{}", cuid2::create_id()))
    }
}

impl Default for StageUniqueId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StageUniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
