use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::SettlementError;
use crate::traits::{ChainQuery, TxSubmitter};
use crate::types::{Asset, TxId};

sol! {
    function balanceOf(address account) external view returns (uint256 balance);
}

/// Connection settings for an Ethereum-compatible JSON-RPC node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_url")]
    pub url: String,
    /// Unlocked sender account. The node's first account when unset.
    #[serde(default)]
    pub from: Option<Address>,
    /// Gas limit for submissions. Left to the node when unset.
    #[serde(default)]
    pub gas: Option<u64>,
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    #[serde(default = "default_max_receipt_polls")]
    pub max_receipt_polls: u32,
}

fn default_url() -> String {
    "http://127.0.0.1:8545".to_string()
}
fn default_receipt_poll_interval_ms() -> u64 {
    1_000
}
fn default_max_receipt_polls() -> u32 {
    60
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            from: None,
            gas: None,
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            max_receipt_polls: default_max_receipt_polls(),
        }
    }
}

/// Error object of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// Why a request produced no result.
#[derive(Debug)]
enum RpcFailure {
    /// HTTP or decoding failure; the node's view is unknown.
    Transport(String),
    /// The node answered with an error object.
    Node(RpcErrorObject),
}

impl RpcFailure {
    fn into_query_error(self, what: &str) -> SettlementError {
        match self {
            Self::Transport(msg) => SettlementError::Query(format!("{}: {}", what, msg)),
            Self::Node(err) => SettlementError::Query(format!("{}: {} ({})", what, err.message, err.code)),
        }
    }

    fn into_submit_error(self) -> SettlementError {
        match self {
            Self::Transport(msg) => SettlementError::Network(msg),
            Self::Node(err) => SettlementError::SubmissionRejected {
                reason: revert_reason(&err),
            },
        }
    }
}

/// Message plus any revert data the node attached.
fn revert_reason(err: &RpcErrorObject) -> String {
    match err.data.as_ref().and_then(Value::as_str) {
        Some(data) => format!("{} ({})", err.message, data),
        None => err.message.clone(),
    }
}

/// Parse a hex quantity such as `"0x3e8"`.
pub fn parse_quantity(value: &Value) -> Result<U256, String> {
    let text = value
        .as_str()
        .ok_or_else(|| format!("expected hex quantity, got {}", value))?;
    let digits = text.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).map_err(|e| format!("bad quantity {:?}: {}", text, e))
}

pub fn parse_data(value: &Value) -> Result<Bytes, String> {
    let text = value
        .as_str()
        .ok_or_else(|| format!("expected hex data, got {}", value))?;
    Bytes::from_str(text).map_err(|e| format!("bad data {:?}: {}", text, e))
}

pub fn balance_of_calldata(account: Address) -> Bytes {
    balanceOfCall { account }.abi_encode().into()
}

pub fn decode_balance_of(data: &[u8]) -> Result<U256, String> {
    balanceOfCall::abi_decode_returns(data, true)
        .map(|ret| ret.balance)
        .map_err(|e| format!("balanceOf returned {} bytes: {}", data.len(), e))
}

/// `Some(true)` for a successful receipt, `Some(false)` for a revert. Receipts
/// without a status field predate it and count as success.
pub fn receipt_succeeded(receipt: &Value) -> Result<bool, String> {
    match receipt.get("status") {
        None | Some(Value::Null) => Ok(true),
        Some(status) => Ok(!parse_quantity(status)?.is_zero()),
    }
}

/// Balance reads and transaction submission over JSON-RPC.
///
/// Submissions use `eth_sendTransaction`, so the sender must be unlocked on
/// the node (a dev chain or a node holding the key).
pub struct JsonRpcAdapter {
    client: reqwest::Client,
    config: RpcConfig,
    from: Address,
    next_id: AtomicU64,
}

impl JsonRpcAdapter {
    /// Use `from` as the sender without asking the node.
    pub fn with_sender(config: RpcConfig, from: Address) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            from,
            next_id: AtomicU64::new(1),
        }
    }

    /// Resolve the sender, falling back to the node's first account.
    pub async fn connect(config: RpcConfig) -> Result<Self, SettlementError> {
        if let Some(from) = config.from {
            return Ok(Self::with_sender(config, from));
        }
        let adapter = Self::with_sender(config, Address::ZERO);
        let accounts = adapter
            .request("eth_accounts", json!([]))
            .await
            .map_err(|e| e.into_query_error("eth_accounts"))?;
        let first = accounts
            .as_array()
            .and_then(|list| list.first())
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SettlementError::InvalidConfig(format!(
                    "node at {} has no unlocked accounts; set rpc.from",
                    adapter.config.url
                ))
            })?;
        let from = Address::from_str(first)
            .map_err(|e| SettlementError::InvalidConfig(format!("eth_accounts: {}", e)))?;
        tracing::info!(url = %adapter.config.url, from = %from, "Using node account as sender");
        Ok(Self { from, ..adapter })
    }

    pub fn sender(&self) -> Address {
        self.from
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcFailure> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(method, id, "rpc request");

        let response = self
            .client
            .post(self.config.url.as_str())
            .json(&json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": id,
            }))
            .send()
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;
        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;

        if let Some(err) = body.error {
            return Err(RpcFailure::Node(err));
        }
        Ok(body.result.unwrap_or(Value::Null))
    }

    fn transaction(&self, target: Address, calldata: &Bytes) -> Value {
        let mut tx = json!({
            "from": self.from,
            "to": target,
            "data": calldata,
        });
        if let Some(gas) = self.config.gas {
            tx["gas"] = json!(format!("{:#x}", gas));
        }
        tx
    }

    /// Poll until the node has a receipt for `hash`. Errors are plain
    /// reasons; the caller attaches the hash.
    async fn wait_for_receipt(&self, hash: B256) -> Result<Value, String> {
        let interval = Duration::from_millis(self.config.receipt_poll_interval_ms);
        for poll in 0..self.config.max_receipt_polls {
            let receipt = match self.request("eth_getTransactionReceipt", json!([hash])).await {
                Ok(receipt) => receipt,
                Err(RpcFailure::Transport(msg)) => return Err(msg),
                Err(RpcFailure::Node(err)) => return Err(format!("{} ({})", err.message, err.code)),
            };
            if !receipt.is_null() {
                return Ok(receipt);
            }
            tracing::debug!(tx_hash = %hash, poll, "receipt not yet available");
            tokio::time::sleep(interval).await;
        }
        Err(format!("no receipt after {} polls", self.config.max_receipt_polls))
    }
}

#[async_trait]
impl ChainQuery for JsonRpcAdapter {
    async fn get_balance(&self, account: Address, asset: Asset) -> Result<U256, SettlementError> {
        match asset {
            Asset::Native => {
                let value = self
                    .request("eth_getBalance", json!([account, "latest"]))
                    .await
                    .map_err(|e| e.into_query_error("eth_getBalance"))?;
                parse_quantity(&value).map_err(SettlementError::Query)
            }
            Asset::Token(token) => {
                let call = json!({ "to": token, "data": balance_of_calldata(account) });
                let value = self
                    .request("eth_call", json!([call, "latest"]))
                    .await
                    .map_err(|e| e.into_query_error("balanceOf"))?;
                let data = parse_data(&value).map_err(SettlementError::Query)?;
                decode_balance_of(&data).map_err(SettlementError::Query)
            }
        }
    }

    fn query_id(&self) -> &str {
        &self.config.url
    }
}

#[async_trait]
impl TxSubmitter for JsonRpcAdapter {
    async fn submit(&self, target: Address, calldata: Bytes) -> Result<TxId, SettlementError> {
        let tx = self.transaction(target, &calldata);
        let value = self
            .request("eth_sendTransaction", json!([tx]))
            .await
            .map_err(RpcFailure::into_submit_error)?;
        let hash = value
            .as_str()
            .and_then(|text| B256::from_str(text).ok())
            .ok_or_else(|| SettlementError::Network(format!("unexpected transaction hash {}", value)))?;
        tracing::info!(tx_hash = %hash, to = %target, from = %self.from, "Transaction sent");

        let tx_id = TxId(hash);
        let unconfirmed = |reason: String| {
            tracing::warn!(tx_hash = %hash, %reason, "Transaction outcome unknown");
            SettlementError::Unconfirmed { tx_id, reason }
        };
        let receipt = self.wait_for_receipt(hash).await.map_err(unconfirmed)?;
        let succeeded = receipt_succeeded(&receipt).map_err(unconfirmed)?;
        if !succeeded {
            return Err(SettlementError::SubmissionRejected {
                reason: format!("transaction {} reverted", hash),
            });
        }
        Ok(tx_id)
    }

    fn submitter_id(&self) -> &str {
        &self.config.url
    }
}
