use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SettlementError;

/// Phases of a single scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HarnessPhase {
    /// Nothing has been read or sent yet.
    Idle,
    /// Balances before submission are captured.
    SnapshotBefore,
    /// The transaction was accepted by the chain.
    Submitted,
    /// Balances after submission are captured.
    SnapshotAfter,
    /// Observed deltas matched the expectation. Final state.
    Verified,
    /// Rejected, unreadable or mismatched. Final state.
    Failed,
}

impl HarnessPhase {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Verified | Self::Failed)
    }
}

impl fmt::Display for HarnessPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::SnapshotBefore => write!(f, "SnapshotBefore"),
            Self::Submitted => write!(f, "Submitted"),
            Self::SnapshotAfter => write!(f, "SnapshotAfter"),
            Self::Verified => write!(f, "Verified"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Events that move a run forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessEvent {
    BeforeCaptured,
    TxAccepted,
    AfterCaptured,
    DeltasMatched,
    /// Any error, rejection or mismatch.
    Failure,
}

/// Valid transitions:
/// - Idle → SnapshotBefore (BeforeCaptured)
/// - SnapshotBefore → Submitted (TxAccepted)
/// - Submitted → SnapshotAfter (AfterCaptured)
/// - SnapshotAfter → Verified (DeltasMatched)
/// - any non-final phase → Failed (Failure)
pub struct PhaseMachine;

impl PhaseMachine {
    pub fn transition(
        current: HarnessPhase,
        event: HarnessEvent,
    ) -> Result<HarnessPhase, SettlementError> {
        let next = match (current, event) {
            (HarnessPhase::Idle, HarnessEvent::BeforeCaptured) => HarnessPhase::SnapshotBefore,
            (HarnessPhase::SnapshotBefore, HarnessEvent::TxAccepted) => HarnessPhase::Submitted,
            (HarnessPhase::Submitted, HarnessEvent::AfterCaptured) => HarnessPhase::SnapshotAfter,
            (HarnessPhase::SnapshotAfter, HarnessEvent::DeltasMatched) => HarnessPhase::Verified,
            (phase, HarnessEvent::Failure) if !phase.is_final() => HarnessPhase::Failed,
            _ => {
                let target = match event {
                    HarnessEvent::BeforeCaptured => HarnessPhase::SnapshotBefore,
                    HarnessEvent::TxAccepted => HarnessPhase::Submitted,
                    HarnessEvent::AfterCaptured => HarnessPhase::SnapshotAfter,
                    HarnessEvent::DeltasMatched => HarnessPhase::Verified,
                    HarnessEvent::Failure => HarnessPhase::Failed,
                };
                return Err(SettlementError::InvalidStateTransition {
                    from: current,
                    to: target,
                });
            }
        };

        tracing::debug!(from = %current, to = %next, event = ?event, "harness phase transition");
        Ok(next)
    }

    pub fn can_transition(current: HarnessPhase, event: HarnessEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
