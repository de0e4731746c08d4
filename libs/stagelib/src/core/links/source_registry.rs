// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Liveness index of the stages feeding a link.
//!
//! Entries are `Weak` so registering a stage never extends its lifetime. A
//! stage is dropped from the index once it reports finished or once its last
//! strong reference is gone.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::core::stages::Stage;
use crate::core::StageUniqueId;

#[derive(Default)]
pub struct SourceRegistry {
    sources: Mutex<HashMap<StageUniqueId, Weak<dyn Stage>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source` by its stage ID. Re-registering is a no-op.
    pub fn register<S: Stage>(&self, source: &Arc<S>) {
        let id = source.lifecycle().id().clone();
        let weak: Weak<S> = Arc::downgrade(source);
        let weak: Weak<dyn Stage> = weak;
        self.sources.lock().entry(id).or_insert(weak);
    }

    pub fn len(&self) -> usize {
        self.sources.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.lock().is_empty()
    }

    /// Drop every source that finished or no longer exists.
    ///
    /// Returns how many sources remain. `is_finished()` is called without the
    /// registry lock held, through strong references that only live for the
    /// duration of the check.
    pub fn prune(&self) -> usize {
        let snapshot: Vec<(StageUniqueId, Weak<dyn Stage>)> = self
            .sources
            .lock()
            .iter()
            .map(|(id, weak)| (id.clone(), weak.clone()))
            .collect();

        let finished: Vec<StageUniqueId> = snapshot
            .into_iter()
            .filter_map(|(id, weak)| match weak.upgrade() {
                Some(source) if !source.is_finished() => None,
                _ => Some(id),
            })
            .collect();

        let mut sources = self.sources.lock();
        for id in &finished {
            tracing::trace!("[{}] Source finished, removing from link registry", id);
            sources.remove(id);
        }
        sources.len()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::execution::AlwaysFailsThreadingModel;
    use crate::core::stages::{FinishReason, StageLifecycle};
    use crate::core::StageError;

    struct FlagStage {
        lifecycle: StageLifecycle,
    }

    impl FlagStage {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                lifecycle: StageLifecycle::new("flag", Arc::new(AlwaysFailsThreadingModel::new())),
            })
        }

        fn finish(&self) {
            self.lifecycle.latch().close(FinishReason::NaturallyExhausted);
        }
    }

    impl Stage for FlagStage {
        fn lifecycle(&self) -> &StageLifecycle {
            &self.lifecycle
        }

        fn execute(&self) {}

        fn is_finished(&self) -> bool {
            self.lifecycle.latch().is_closed()
        }

        fn log_message(&self, _message: &str, _cause: &StageError) {}
    }

    #[test]
    fn test_prune_removes_finished_sources() {
        let registry = SourceRegistry::new();
        let a = FlagStage::new();
        let b = FlagStage::new();
        registry.register(&a);
        registry.register(&b);
        registry.register(&a);
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.prune(), 2);
        a.finish();
        assert_eq!(registry.prune(), 1);
        b.finish();
        assert_eq!(registry.prune(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_does_not_keep_sources_alive() {
        let registry = SourceRegistry::new();
        let source = FlagStage::new();
        registry.register(&source);
        assert_eq!(Arc::strong_count(&source), 1);

        drop(source);
        assert_eq!(registry.prune(), 0);
    }
}
