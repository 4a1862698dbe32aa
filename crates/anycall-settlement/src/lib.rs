//! Anycall Settlement Harness
//!
//! Runs a payload scenario end to end: snapshot the watched balances,
//! submit the encoded call through a [`TxSubmitter`], snapshot again and
//! compare the observed deltas against the caller's expectation.

pub mod error;
pub mod types;
pub mod traits;
pub mod state_machine;
pub mod retry;
pub mod config;
pub mod harness;
pub mod adapters;

pub use error::SettlementError;
pub use types::{
    Asset, BalanceDelta, BalanceKey, DeltaMismatch, ScenarioId, ScenarioResult,
    SettlementReport, SettlementSnapshot, TxId,
};
pub use traits::{ChainQuery, TxSubmitter};
pub use state_machine::{HarnessEvent, HarnessPhase, PhaseMachine};
pub use retry::RetryPolicy;
pub use config::{HarnessConfig, ScenarioSpec};
pub use harness::{ScenarioConfig, SettlementHarness};
