//! Harness settings and the file form of a scenario.

use std::str::FromStr;

use alloy_primitives::{Address, I256, U256};
use anycall_core::{
    EntryPoint, MultiLocation, Payload, PayloadLayout, SwapPayload, XcmTransferPayload,
};
use serde::{Deserialize, Serialize};

use crate::error::SettlementError;
use crate::harness::ScenarioConfig;
use crate::retry::RetryPolicy;
use crate::types::{Asset, BalanceDelta, BalanceKey};

/// Settings shared by every scenario a harness runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Backoff for balance reads.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Refuse to submit swap payloads whose deadline has passed.
    #[serde(default = "default_true")]
    pub enforce_deadline: bool,
}

fn default_true() -> bool {
    true
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            enforce_deadline: true,
        }
    }
}

/// A scenario as written in `anycall.toml`. Amounts are strings so that
/// 256-bit values survive TOML; they accept decimal or `0x` hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    /// Contract receiving the call.
    pub target: String,
    #[serde(default)]
    pub layout: PayloadLayout,
    #[serde(default)]
    pub entry: EntrySpec,
    pub payload: PayloadSpec,
    /// Balances to track besides those named in `expect`.
    #[serde(default)]
    pub watch: Vec<KeySpec>,
    #[serde(default)]
    pub expect: Vec<ExpectSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntrySpec {
    #[default]
    Raw,
    AnycallExec {
        token: String,
        receiver: String,
        amount: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayloadSpec {
    Swap {
        #[serde(default = "zero")]
        amount_out: String,
        #[serde(default = "zero")]
        amount_out_min: String,
        amount_in_max: String,
        path: Vec<String>,
        receiver: String,
        /// Unix seconds; omitted or "max" means no deadline.
        #[serde(default)]
        deadline: Option<String>,
        #[serde(default)]
        to_native: bool,
    },
    XcmTransfer {
        #[serde(default = "relay_parent")]
        parents: u8,
        parachain: u32,
        /// 32-byte account public key, hex.
        account_id32: String,
        weight: u64,
    },
}

fn zero() -> String {
    "0".into()
}

fn relay_parent() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    pub account: String,
    /// "native" or a token address.
    pub asset: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectSpec {
    pub account: String,
    pub asset: String,
    /// Signed decimal change, e.g. "-1000" or "+990".
    pub delta: String,
}

fn invalid(field: &str, value: &str, err: impl std::fmt::Display) -> SettlementError {
    SettlementError::InvalidConfig(format!("{} {:?}: {}", field, value, err))
}

pub fn parse_address(field: &str, value: &str) -> Result<Address, SettlementError> {
    Address::from_str(value.trim()).map_err(|e| invalid(field, value, e))
}

pub fn parse_u256(field: &str, value: &str) -> Result<U256, SettlementError> {
    U256::from_str(value.trim()).map_err(|e| invalid(field, value, e))
}

pub fn parse_i256(field: &str, value: &str) -> Result<I256, SettlementError> {
    let value = value.trim();
    let unsigned = value.strip_prefix('+').unwrap_or(value);
    I256::from_dec_str(unsigned).map_err(|e| invalid(field, value, e))
}

fn parse_deadline(value: Option<&str>) -> Result<U256, SettlementError> {
    match value.map(str::trim) {
        None => Ok(U256::MAX),
        Some(v) if v.eq_ignore_ascii_case("max") => Ok(U256::MAX),
        Some(v) => parse_u256("deadline", v),
    }
}

impl KeySpec {
    pub fn to_key(&self) -> Result<BalanceKey, SettlementError> {
        Ok(BalanceKey::new(
            parse_address("account", &self.account)?,
            self.asset.parse::<Asset>()?,
        ))
    }
}

impl ExpectSpec {
    pub fn to_entry(&self) -> Result<(BalanceKey, I256), SettlementError> {
        let key = BalanceKey::new(
            parse_address("account", &self.account)?,
            self.asset.parse::<Asset>()?,
        );
        Ok((key, parse_i256("delta", &self.delta)?))
    }
}

impl EntrySpec {
    pub fn to_entry_point(&self) -> Result<EntryPoint, SettlementError> {
        match self {
            Self::Raw => Ok(EntryPoint::Raw),
            Self::AnycallExec {
                token,
                receiver,
                amount,
            } => Ok(EntryPoint::AnycallExec {
                token: parse_address("entry.token", token)?,
                receiver: parse_address("entry.receiver", receiver)?,
                amount: parse_u256("entry.amount", amount)?,
            }),
        }
    }
}

impl PayloadSpec {
    pub fn to_payload(&self) -> Result<Payload, SettlementError> {
        match self {
            Self::Swap {
                amount_out,
                amount_out_min,
                amount_in_max,
                path,
                receiver,
                deadline,
                to_native,
            } => {
                let path = path
                    .iter()
                    .map(|hop| parse_address("path", hop))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Payload::Swap(SwapPayload {
                    amount_out: parse_u256("amount_out", amount_out)?,
                    amount_out_min: parse_u256("amount_out_min", amount_out_min)?,
                    amount_in_max: parse_u256("amount_in_max", amount_in_max)?,
                    path,
                    receiver: parse_address("receiver", receiver)?,
                    deadline: parse_deadline(deadline.as_deref())?,
                    to_native: *to_native,
                }))
            }
            Self::XcmTransfer {
                parents,
                parachain,
                account_id32,
                weight,
            } => {
                let mut account = [0u8; 32];
                hex::decode_to_slice(account_id32.trim_start_matches("0x"), &mut account)
                    .map_err(|e| invalid("account_id32", account_id32, e))?;
                let mut destination = MultiLocation::sibling_account(*parachain, account);
                destination.parents = *parents;
                Ok(Payload::XcmTransfer(XcmTransferPayload::new(destination, *weight)))
            }
        }
    }
}

impl ScenarioSpec {
    /// Parse every field into its typed form.
    pub fn to_config(&self) -> Result<ScenarioConfig, SettlementError> {
        let watch = self
            .watch
            .iter()
            .map(KeySpec::to_key)
            .collect::<Result<Vec<_>, _>>()?;
        let mut expected = BalanceDelta::new();
        for spec in &self.expect {
            let (key, delta) = spec.to_entry()?;
            if expected.insert(key, delta).is_some() {
                return Err(SettlementError::InvalidConfig(format!(
                    "scenario {:?} expects {} more than once",
                    self.name, key
                )));
            }
        }

        Ok(ScenarioConfig {
            name: self.name.clone(),
            target: parse_address("target", &self.target)?,
            entry: self.entry.to_entry_point()?,
            layout: self.layout,
            watch,
            payload: self.payload.to_payload()?,
            expected,
        })
    }
}
