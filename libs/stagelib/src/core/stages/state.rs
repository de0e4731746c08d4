// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Why a stage stopped.
///
/// Set exactly once per stage through a [`TerminationLatch`]; the first
/// reason recorded wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinishReason {
    /// The stage body reported it has nothing more to do.
    NaturallyExhausted,
    /// A producer body returned no item.
    ProducedAbsent,
    /// The outbound link refused an item.
    FailedAdd,
    /// A consumer pulled nothing from a link with no live sources.
    SawEndOfStream,
    /// The link the stage talks to was broken.
    LinkBroken,
}

impl FinishReason {
    const ALL: [FinishReason; 5] = [
        FinishReason::NaturallyExhausted,
        FinishReason::ProducedAbsent,
        FinishReason::FailedAdd,
        FinishReason::SawEndOfStream,
        FinishReason::LinkBroken,
    ];

    fn code(self) -> u8 {
        match self {
            FinishReason::NaturallyExhausted => 1,
            FinishReason::ProducedAbsent => 2,
            FinishReason::FailedAdd => 3,
            FinishReason::SawEndOfStream => 4,
            FinishReason::LinkBroken => 5,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.code() == code)
    }

    pub fn description(&self) -> &'static str {
        match self {
            FinishReason::NaturallyExhausted => "stage is exhausted",
            FinishReason::ProducedAbsent => "previously produced an absent item",
            FinishReason::FailedAdd => "previously failed to add downstream",
            FinishReason::SawEndOfStream => "already exhausted incoming link",
            FinishReason::LinkBroken => "link was broken",
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Observable lifecycle state of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageState {
    NotStarted,
    Running,
    Finished(FinishReason),
}

impl StageState {
    pub fn is_finished(&self) -> bool {
        matches!(self, StageState::Finished(_))
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageState::NotStarted => write!(f, "NotStarted"),
            StageState::Running => write!(f, "Running"),
            StageState::Finished(reason) => write!(f, "Finished({})", reason),
        }
    }
}

/// One-way `Open -> Finished(reason)` latch.
///
/// Once set it never clears, which is what makes `is_finished()` monotonic.
#[derive(Debug, Default)]
pub struct TerminationLatch {
    state: AtomicU8,
}

const OPEN: u8 = 0;

impl TerminationLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `reason` if nothing was recorded yet.
    ///
    /// Returns `true` for the caller that actually closed the latch.
    pub fn close(&self, reason: FinishReason) -> bool {
        self.state
            .compare_exchange(OPEN, reason.code(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) != OPEN
    }

    pub fn reason(&self) -> Option<FinishReason> {
        FinishReason::from_code(self.state.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latch_first_reason_wins() {
        let latch = TerminationLatch::new();
        assert!(!latch.is_closed());
        assert_eq!(latch.reason(), None);

        assert!(latch.close(FinishReason::ProducedAbsent));
        assert!(!latch.close(FinishReason::FailedAdd));

        assert!(latch.is_closed());
        assert_eq!(latch.reason(), Some(FinishReason::ProducedAbsent));
    }

    #[test]
    fn test_latch_races_to_single_winner() {
        let latch = std::sync::Arc::new(TerminationLatch::new());
        let handles: Vec<_> = FinishReason::ALL
            .into_iter()
            .map(|reason| {
                let latch = latch.clone();
                std::thread::spawn(move || latch.close(reason))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(latch.reason().is_some());
    }

    #[test]
    fn test_reason_codes_are_distinct() {
        for reason in FinishReason::ALL {
            assert_eq!(FinishReason::from_code(reason.code()), Some(reason));
        }
        assert_eq!(FinishReason::from_code(OPEN), None);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(StageState::Running.to_string(), "Running");
        assert_eq!(
            StageState::Finished(FinishReason::SawEndOfStream).to_string(),
            "Finished(already exhausted incoming link)"
        );
        assert!(StageState::Finished(FinishReason::FailedAdd).is_finished());
        assert!(!StageState::NotStarted.is_finished());
    }
}
