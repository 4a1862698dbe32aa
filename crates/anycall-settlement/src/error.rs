use anycall_core::CodecError;

use crate::state_machine::HarnessPhase;
use crate::types::{BalanceKey, DeltaMismatch, TxId};

/// Settlement-harness errors.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// A balance read failed on the node or network.
    #[error("balance query failed: {0}")]
    Query(String),

    /// The chain refused the transaction (revert, expired deadline,
    /// slippage, insufficient balance).
    #[error("submission rejected: {reason}")]
    SubmissionRejected { reason: String },

    /// The submission could not be delivered or its outcome is unknown.
    #[error("network error: {0}")]
    Network(String),

    /// The transaction was sent and has a hash, but its outcome could not be
    /// observed. It may still be mined.
    #[error("transaction {tx_id} unconfirmed: {reason}")]
    Unconfirmed { tx_id: TxId, reason: String },

    #[error("{} balance delta(s) differ from expectation", mismatches.len())]
    VerificationMismatch { mismatches: Vec<DeltaMismatch> },

    /// The balance change does not fit a signed 256-bit delta.
    #[error("balance change of {key} does not fit in a signed 256-bit delta")]
    DeltaOverflow { key: BalanceKey },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("invalid harness phase transition from {from} to {to}")]
    InvalidStateTransition { from: HarnessPhase, to: HarnessPhase },

    #[error("invalid scenario configuration: {0}")]
    InvalidConfig(String),
}

impl SettlementError {
    /// Only reads are safe to repeat. A submission is never retried because
    /// it may already have been accepted.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Query(_))
    }

    /// Hash of a transaction that reached the chain before the error.
    pub fn tx_id(&self) -> Option<TxId> {
        match self {
            Self::Unconfirmed { tx_id, .. } => Some(*tx_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    #[test]
    fn test_only_queries_are_retryable() {
        assert!(SettlementError::Query("timeout".into()).is_retryable());
        assert!(!SettlementError::Network("reset".into()).is_retryable());
        assert!(!SettlementError::SubmissionRejected {
            reason: "EXPIRED".into()
        }
        .is_retryable());
        assert!(!SettlementError::VerificationMismatch { mismatches: vec![] }.is_retryable());
        assert!(!SettlementError::Codec(CodecError::InvalidPayload("x".into())).is_retryable());
        assert!(!SettlementError::Unconfirmed {
            tx_id: TxId(B256::ZERO),
            reason: "timeout".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_unconfirmed_carries_tx_id() {
        let tx_id = TxId(B256::repeat_byte(0x11));
        let err = SettlementError::Unconfirmed {
            tx_id,
            reason: "rate limited".into(),
        };
        assert_eq!(err.tx_id(), Some(tx_id));
        assert_eq!(SettlementError::Network("reset".into()).tx_id(), None);
    }

    #[test]
    fn test_rejection_message() {
        let err = SettlementError::SubmissionRejected {
            reason: "EXPIRED".into(),
        };
        assert_eq!(err.to_string(), "submission rejected: EXPIRED");
    }
}
