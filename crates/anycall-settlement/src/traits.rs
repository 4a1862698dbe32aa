use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;

use crate::error::SettlementError;
use crate::types::{Asset, TxId};

/// Read access to on-chain balances.
///
/// Implementations must not mutate chain state from a read: two calls with
/// no submission in between return the same value.
#[async_trait]
pub trait ChainQuery: Send + Sync {
    /// Balance of `asset` held by `account`.
    async fn get_balance(&self, account: Address, asset: Asset) -> Result<U256, SettlementError>;

    /// Identifier used in logs (e.g. "local-ledger").
    fn query_id(&self) -> &str;
}

/// Delivers call data to a contract.
///
/// Signing, nonce ordering and timeouts are the implementation's concern.
#[async_trait]
pub trait TxSubmitter: Send + Sync {
    /// Send `calldata` to `target` and wait for it to be mined.
    ///
    /// Fails with [`SettlementError::SubmissionRejected`] when the chain
    /// refuses or reverts the call and [`SettlementError::Network`] when the
    /// outcome could not be observed.
    async fn submit(&self, target: Address, calldata: Bytes) -> Result<TxId, SettlementError>;

    fn submitter_id(&self) -> &str;
}
