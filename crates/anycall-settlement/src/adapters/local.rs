use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use alloy_primitives::{keccak256, Address, Bytes, U256};
use anycall_core::{swap, xcm, EntryPoint, SwapMode, SwapPayload};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::error::SettlementError;
use crate::traits::{ChainQuery, TxSubmitter};
use crate::types::{Asset, BalanceKey, TxId};

const BPS: u64 = 10_000;

/// Pool fee charged on every hop, in basis points.
pub const DEFAULT_FEE_BPS: u32 = 100;

/// In-memory chain with a constant-fee router and an anycall proxy.
///
/// Every submission is sent from a single caller account. Call data is
/// either a bare swap payload, executed directly against the router, or an
/// `exec(token, receiver, amount, data)` call: the proxy pulls `amount` from
/// the caller, runs the swap (or burns the tokens for an XCM transfer) and
/// refunds whatever is left to `receiver`. A failed `exec` still succeeds as
/// a transaction, returning the whole amount to `receiver`.
///
/// Pools have unlimited liquidity. Reads never change state.
pub struct LocalLedger {
    caller: Address,
    fee_bps: u32,
    /// Block timestamp in unix seconds.
    clock: AtomicU64,
    balances: DashMap<BalanceKey, U256>,
    nonce: AtomicU64,
    submit_calls: AtomicU64,
    failing_reads: AtomicU32,
    /// Transactions apply one at a time.
    tx_lock: Mutex<()>,
}

impl LocalLedger {
    pub fn new(caller: Address) -> Self {
        Self {
            caller,
            fee_bps: DEFAULT_FEE_BPS,
            clock: AtomicU64::new(u64::try_from(Utc::now().timestamp()).unwrap_or_default()),
            balances: DashMap::new(),
            nonce: AtomicU64::new(0),
            submit_calls: AtomicU64::new(0),
            failing_reads: AtomicU32::new(0),
            tx_lock: Mutex::new(()),
        }
    }

    /// Capped just below 100%.
    pub fn with_fee_bps(mut self, fee_bps: u32) -> Self {
        self.fee_bps = fee_bps.min(BPS as u32 - 1);
        self
    }

    pub fn caller(&self) -> Address {
        self.caller
    }

    pub fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    pub fn mint(&self, account: Address, asset: Asset, amount: U256) {
        let mut balance = self.balances.entry(BalanceKey::new(account, asset)).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub fn set_balance(&self, account: Address, asset: Asset, amount: U256) {
        self.balances.insert(BalanceKey::new(account, asset), amount);
    }

    pub fn balance(&self, account: Address, asset: Asset) -> U256 {
        self.balances
            .get(&BalanceKey::new(account, asset))
            .map(|b| *b)
            .unwrap_or_default()
    }

    pub fn now(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    pub fn set_time(&self, timestamp: u64) {
        self.clock.store(timestamp, Ordering::SeqCst);
    }

    pub fn advance_time(&self, seconds: u64) {
        self.clock.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Make the next `count` balance reads fail with a query error.
    pub fn fail_next_reads(&self, count: u32) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// Number of accepted transactions.
    pub fn transaction_count(&self) -> u64 {
        self.nonce.load(Ordering::SeqCst)
    }

    /// Number of `submit` calls, including reverted ones.
    pub fn submission_attempts(&self) -> u64 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    fn hop_out(&self, amount_in: U256) -> Result<U256, String> {
        let keep = U256::from(BPS - u64::from(self.fee_bps));
        amount_in
            .checked_mul(keep)
            .map(|scaled| scaled / U256::from(BPS))
            .ok_or_else(|| "OVERFLOW".to_string())
    }

    /// Smallest input that yields `amount_out` after one hop.
    fn hop_in(&self, amount_out: U256) -> Result<U256, String> {
        let keep = U256::from(BPS - u64::from(self.fee_bps));
        let scaled = amount_out
            .checked_mul(U256::from(BPS))
            .ok_or_else(|| "OVERFLOW".to_string())?;
        let (quotient, remainder) = (scaled / keep, scaled % keep);
        if remainder.is_zero() {
            Ok(quotient)
        } else {
            Ok(quotient + U256::from(1))
        }
    }

    /// `(amount_in, amount_out)` for `payload`, spending at most `available`.
    fn quote(&self, payload: &SwapPayload, available: U256) -> Result<(U256, U256), String> {
        let hops = payload.path.len().saturating_sub(1);
        match payload.mode() {
            SwapMode::ExactInput => {
                let mut amount_out = available;
                for _ in 0..hops {
                    amount_out = self.hop_out(amount_out)?;
                }
                if amount_out < payload.amount_out_min {
                    return Err(format!(
                        "INSUFFICIENT_OUTPUT_AMOUNT: {} < {}",
                        amount_out, payload.amount_out_min
                    ));
                }
                Ok((available, amount_out))
            }
            SwapMode::ExactOutput => {
                let mut amount_in = payload.amount_out;
                for _ in 0..hops {
                    amount_in = self.hop_in(amount_in)?;
                }
                let limit = payload.amount_in_max.min(available);
                if amount_in > limit {
                    return Err(format!("EXCESSIVE_INPUT_AMOUNT: {} > {}", amount_in, limit));
                }
                Ok((amount_in, payload.amount_out))
            }
        }
    }

    /// Run a swap paid by `payer`. Returns the input spent.
    fn swap(
        &self,
        tx: &mut PendingTx<'_>,
        payer: Address,
        payload: &SwapPayload,
        available: U256,
    ) -> Result<U256, String> {
        if payload.has_deadline() && payload.deadline < U256::from(self.now()) {
            return Err("EXPIRED".into());
        }
        payload.validate().map_err(|e| e.to_string())?;
        if payload.receiver.is_zero() {
            return Err("INVALID_TO".into());
        }
        let (token_in, token_out) = match (payload.token_in(), payload.token_out()) {
            (Some(token_in), Some(token_out)) => (token_in, token_out),
            _ => return Err("INVALID_PATH".into()),
        };

        let (amount_in, amount_out) = self.quote(payload, available)?;
        let asset_out = if payload.to_native {
            Asset::Native
        } else {
            Asset::Token(token_out)
        };
        tx.debit(BalanceKey::token(payer, token_in), amount_in)?;
        tx.credit(BalanceKey::new(payload.receiver, asset_out), amount_out)?;
        tracing::debug!(
            payer = %payer,
            receiver = %payload.receiver,
            amount_in = %amount_in,
            amount_out = %amount_out,
            hops = payload.path.len() - 1,
            "local swap"
        );
        Ok(amount_in)
    }

    /// Proxy-side execution of `exec` data. Returns the input consumed.
    fn exec(
        &self,
        tx: &mut PendingTx<'_>,
        proxy: Address,
        token: Address,
        amount: U256,
        data: &[u8],
    ) -> Result<U256, String> {
        if let Some(payload) = decode_swap(data) {
            if payload.token_in() != Some(token) {
                return Err(format!("exec token {} is not the path input", token));
            }
            return self.swap(tx, proxy, &payload, amount);
        }

        let transfer = xcm::decode(data).map_err(|_| "unrecognised exec data".to_string())?;
        transfer.validate().map_err(|e| e.to_string())?;
        // The X-Tokens precompile burns the bridged tokens on this chain.
        tx.debit(BalanceKey::token(proxy, token), amount)?;
        tracing::debug!(
            token = %token,
            amount = %amount,
            parents = transfer.destination.parents,
            weight = transfer.weight,
            "local xcm transfer"
        );
        Ok(amount)
    }

    fn apply(&self, target: Address, calldata: &Bytes) -> Result<TxId, String> {
        let (entry, payload) = EntryPoint::split_calldata(calldata).map_err(|e| e.to_string())?;
        let mut tx = PendingTx::new(self);

        match entry {
            EntryPoint::Raw => {
                let order =
                    decode_swap(&payload).ok_or_else(|| "unrecognised call data".to_string())?;
                self.swap(&mut tx, self.caller, &order, order.amount_in_max)?;
            }
            EntryPoint::AnycallExec {
                token,
                receiver,
                amount,
            } => {
                let asset = Asset::Token(token);
                tx.transfer(self.caller, target, asset, amount)?;
                let checkpoint = tx.staged.clone();
                match self.exec(&mut tx, target, token, amount, &payload) {
                    Ok(spent) => {
                        let leftover = amount.saturating_sub(spent);
                        if !leftover.is_zero() {
                            tx.transfer(target, receiver, asset, leftover)?;
                        }
                    }
                    Err(reason) => {
                        tracing::warn!(proxy = %target, receiver = %receiver, %reason, "exec failed, refunding input");
                        tx.staged = checkpoint;
                        tx.transfer(target, receiver, asset, amount)?;
                    }
                }
            }
        }

        tx.commit();
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst) + 1;
        let mut preimage = Vec::with_capacity(8 + 20 + calldata.len());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        preimage.extend_from_slice(target.as_slice());
        preimage.extend_from_slice(calldata);
        Ok(TxId(keccak256(&preimage)))
    }
}

fn decode_swap(data: &[u8]) -> Option<SwapPayload> {
    swap::decode(data).or_else(|_| swap::decode_single(data)).ok()
}

/// Balance changes staged until the whole transaction succeeds.
struct PendingTx<'a> {
    ledger: &'a LocalLedger,
    staged: BTreeMap<BalanceKey, U256>,
}

impl<'a> PendingTx<'a> {
    fn new(ledger: &'a LocalLedger) -> Self {
        Self {
            ledger,
            staged: BTreeMap::new(),
        }
    }

    fn balance(&self, key: &BalanceKey) -> U256 {
        match self.staged.get(key) {
            Some(balance) => *balance,
            None => self.ledger.balance(key.account, key.asset),
        }
    }

    fn debit(&mut self, key: BalanceKey, amount: U256) -> Result<(), String> {
        let balance = self.balance(&key);
        let rest = balance.checked_sub(amount).ok_or_else(|| {
            format!(
                "TRANSFER_AMOUNT_EXCEEDS_BALANCE: {} holds {}, needs {}",
                key, balance, amount
            )
        })?;
        self.staged.insert(key, rest);
        Ok(())
    }

    fn credit(&mut self, key: BalanceKey, amount: U256) -> Result<(), String> {
        let total = self
            .balance(&key)
            .checked_add(amount)
            .ok_or_else(|| "OVERFLOW".to_string())?;
        self.staged.insert(key, total);
        Ok(())
    }

    fn transfer(&mut self, from: Address, to: Address, asset: Asset, amount: U256) -> Result<(), String> {
        self.debit(BalanceKey::new(from, asset), amount)?;
        self.credit(BalanceKey::new(to, asset), amount)
    }

    fn commit(self) {
        for (key, balance) in self.staged {
            self.ledger.balances.insert(key, balance);
        }
    }
}

#[async_trait]
impl ChainQuery for LocalLedger {
    async fn get_balance(&self, account: Address, asset: Asset) -> Result<U256, SettlementError> {
        if self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SettlementError::Query("injected read failure".into()));
        }
        Ok(self.balance(account, asset))
    }

    fn query_id(&self) -> &str {
        "local-ledger"
    }
}

#[async_trait]
impl TxSubmitter for LocalLedger {
    async fn submit(&self, target: Address, calldata: Bytes) -> Result<TxId, SettlementError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let result = {
            let _guard = self.tx_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.apply(target, &calldata)
        };
        match result {
            Ok(tx_id) => {
                tracing::info!(tx_id = %tx_id, to = %target, "local transaction applied");
                Ok(tx_id)
            }
            Err(reason) => {
                tracing::info!(to = %target, %reason, "local transaction reverted");
                Err(SettlementError::SubmissionRejected { reason })
            }
        }
    }

    fn submitter_id(&self) -> &str {
        "local-ledger"
    }
}
