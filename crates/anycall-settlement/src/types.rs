use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, B256, I256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SettlementError;
use crate::state_machine::HarnessPhase;

/// Unique identifier for one scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioId(pub Uuid);

impl ScenarioId {
    /// Create a new run ID (UUID v7, time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ScenarioId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction hash returned by the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub B256);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Something an account can hold a balance of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Asset {
    /// The chain's native coin.
    Native,
    /// An ERC-20 token contract.
    Token(Address),
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Token(address) => write!(f, "{}", address),
        }
    }
}

impl FromStr for Asset {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("native") {
            return Ok(Self::Native);
        }
        Address::from_str(s)
            .map(Self::Token)
            .map_err(|e| SettlementError::InvalidConfig(format!("invalid asset {:?}: {}", s, e)))
    }
}

impl TryFrom<String> for Asset {
    type Error = SettlementError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.to_string()
    }
}

/// An (account, asset) pair whose balance is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BalanceKey {
    pub account: Address,
    pub asset: Asset,
}

impl BalanceKey {
    pub fn new(account: Address, asset: Asset) -> Self {
        Self { account, asset }
    }

    pub fn token(account: Address, token: Address) -> Self {
        Self::new(account, Asset::Token(token))
    }

    pub fn native(account: Address) -> Self {
        Self::new(account, Asset::Native)
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.asset)
    }
}

/// Signed `after - before`, or `None` when the change is outside the `I256`
/// range.
pub fn signed_delta(before: U256, after: U256) -> Option<I256> {
    if after >= before {
        let value = I256::from_raw(after - before);
        (!value.is_negative()).then_some(value)
    } else {
        let value = I256::from_raw(before - after);
        if value.is_negative() {
            // Only 2^255 itself wraps to a representable value.
            (value == I256::MIN).then_some(I256::MIN)
        } else {
            Some(-value)
        }
    }
}

/// Balances of a fixed key set at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementSnapshot {
    pub balances: BTreeMap<BalanceKey, U256>,
    pub taken_at: DateTime<Utc>,
}

impl SettlementSnapshot {
    pub fn new(balances: BTreeMap<BalanceKey, U256>) -> Self {
        Self {
            balances,
            taken_at: Utc::now(),
        }
    }

    pub fn balance(&self, key: &BalanceKey) -> Option<U256> {
        self.balances.get(key).copied()
    }

    /// Per-key change from `self` to `after`. Keys missing on one side
    /// read as zero.
    pub fn diff(&self, after: &SettlementSnapshot) -> Result<BalanceDelta, SettlementError> {
        let keys: BTreeSet<&BalanceKey> = self.balances.keys().chain(after.balances.keys()).collect();
        keys.into_iter()
            .map(|key| {
                let before = self.balance(key).unwrap_or_default();
                let now = after.balance(key).unwrap_or_default();
                signed_delta(before, now)
                    .map(|delta| (*key, delta))
                    .ok_or(SettlementError::DeltaOverflow { key: *key })
            })
            .collect()
    }
}

/// Signed balance change per key. Keys not present read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceDelta(BTreeMap<BalanceKey, I256>);

impl BalanceDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: BalanceKey, delta: I256) -> Option<I256> {
        self.0.insert(key, delta)
    }

    /// Builder form of [`BalanceDelta::insert`].
    pub fn with(mut self, key: BalanceKey, delta: I256) -> Self {
        self.0.insert(key, delta);
        self
    }

    pub fn get(&self, key: &BalanceKey) -> I256 {
        self.0.get(key).copied().unwrap_or(I256::ZERO)
    }

    pub fn keys(&self) -> impl Iterator<Item = &BalanceKey> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BalanceKey, &I256)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries that differ from `expected`, compared exactly over the union
    /// of both key sets.
    pub fn mismatches(&self, expected: &BalanceDelta) -> Vec<DeltaMismatch> {
        let keys: BTreeSet<&BalanceKey> = self.keys().chain(expected.keys()).collect();
        keys.into_iter()
            .filter_map(|key| {
                let observed = self.get(key);
                let expected = expected.get(key);
                (observed != expected).then_some(DeltaMismatch {
                    key: *key,
                    expected,
                    observed,
                })
            })
            .collect()
    }
}

impl FromIterator<(BalanceKey, I256)> for BalanceDelta {
    fn from_iter<T: IntoIterator<Item = (BalanceKey, I256)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for BalanceDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (key, delta)) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, delta)?;
        }
        write!(f, "}}")
    }
}

/// One key whose observed delta differs from the expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaMismatch {
    pub key: BalanceKey,
    pub expected: I256,
    pub observed: I256,
}

impl fmt::Display for DeltaMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, observed {}",
            self.key, self.expected, self.observed
        )
    }
}

/// Full diagnostic state of a scenario that reached its second snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReport {
    pub before: SettlementSnapshot,
    pub after: SettlementSnapshot,
    pub expected: BalanceDelta,
    pub observed: BalanceDelta,
    pub mismatches: Vec<DeltaMismatch>,
}

/// Terminal outcome of a scenario run.
#[derive(Debug)]
pub enum ScenarioResult {
    Verified {
        scenario: String,
        run_id: ScenarioId,
        tx_id: TxId,
        deltas: BalanceDelta,
    },
    Failed {
        scenario: String,
        run_id: ScenarioId,
        /// Phase the run had reached when it failed.
        phase: HarnessPhase,
        reason: SettlementError,
        /// Set once the transaction was accepted; the call must not be
        /// resubmitted blindly.
        tx_id: Option<TxId>,
        observed: Option<BalanceDelta>,
        report: Option<Box<SettlementReport>>,
    },
}

impl ScenarioResult {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }

    pub fn scenario(&self) -> &str {
        match self {
            Self::Verified { scenario, .. } | Self::Failed { scenario, .. } => scenario,
        }
    }

    pub fn tx_id(&self) -> Option<TxId> {
        match self {
            Self::Verified { tx_id, .. } => Some(*tx_id),
            Self::Failed { tx_id, .. } => *tx_id,
        }
    }

    /// Deltas observed after submission, if the run got that far.
    pub fn observed_deltas(&self) -> Option<&BalanceDelta> {
        match self {
            Self::Verified { deltas, .. } => Some(deltas),
            Self::Failed { observed, .. } => observed.as_ref(),
        }
    }

    pub fn failure_reason(&self) -> Option<&SettlementError> {
        match self {
            Self::Verified { .. } => None,
            Self::Failed { reason, .. } => Some(reason),
        }
    }
}
