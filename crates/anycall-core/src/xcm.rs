//! XCM transfer payload for the X-Tokens precompile.
//!
//! The destination is a `Multilocation { parents, interior }` where every
//! interior junction is a selector byte followed by its data, as documented
//! for the X-Tokens Solidity interface.

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{sol, SolType};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::swap::WORD;

sol! {
    struct XcmMultilocation {
        uint8 parents;
        bytes[] interior;
    }

    struct XcmTransferInfo {
        XcmMultilocation destination;
        uint64 weight;
    }
}

const PARACHAIN: u8 = 0x00;
const ACCOUNT_ID32: u8 = 0x01;
const ACCOUNT_KEY20: u8 = 0x03;
const NETWORK_ANY: u8 = 0x00;

/// Outer offset, destination offset, weight, parents, interior offset and
/// interior length.
pub const MIN_ENCODED_LEN: usize = 6 * WORD;

/// One interior junction of a multilocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Junction {
    /// `0x00 ++ id` (big-endian u32).
    Parachain(u32),
    /// `0x01 ++ public key ++ 0x00`.
    AccountId32([u8; 32]),
    /// `0x03 ++ address ++ 0x00`.
    AccountKey20(Address),
    /// Any other selector, kept verbatim.
    Raw(Bytes),
}

impl Junction {
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Self::Parachain(id) => {
                let mut out = Vec::with_capacity(5);
                out.push(PARACHAIN);
                out.extend_from_slice(&id.to_be_bytes());
                out.into()
            }
            Self::AccountId32(key) => {
                let mut out = Vec::with_capacity(34);
                out.push(ACCOUNT_ID32);
                out.extend_from_slice(key);
                out.push(NETWORK_ANY);
                out.into()
            }
            Self::AccountKey20(address) => {
                let mut out = Vec::with_capacity(22);
                out.push(ACCOUNT_KEY20);
                out.extend_from_slice(address.as_slice());
                out.push(NETWORK_ANY);
                out.into()
            }
            Self::Raw(bytes) => bytes.clone(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        match bytes {
            [PARACHAIN, id @ ..] if id.len() == 4 => {
                Self::Parachain(u32::from_be_bytes([id[0], id[1], id[2], id[3]]))
            }
            [ACCOUNT_ID32, rest @ .., NETWORK_ANY] if rest.len() == 32 => {
                let mut key = [0u8; 32];
                key.copy_from_slice(rest);
                Self::AccountId32(key)
            }
            [ACCOUNT_KEY20, rest @ .., NETWORK_ANY] if rest.len() == 20 => {
                Self::AccountKey20(Address::from_slice(rest))
            }
            _ => Self::Raw(Bytes::copy_from_slice(bytes)),
        }
    }
}

/// Destination of an XCM transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiLocation {
    /// Levels to go up, 1 = relay chain.
    pub parents: u8,
    pub interior: Vec<Junction>,
}

impl MultiLocation {
    /// An account on a sibling parachain, routed through the relay chain.
    pub fn sibling_account(para_id: u32, account: [u8; 32]) -> Self {
        Self {
            parents: 1,
            interior: vec![Junction::Parachain(para_id), Junction::AccountId32(account)],
        }
    }
}

/// Call data passed to the XCM transfer proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XcmTransferPayload {
    pub destination: MultiLocation,
    /// Execution weight bought on the destination chain.
    pub weight: u64,
}

impl XcmTransferPayload {
    pub fn new(destination: MultiLocation, weight: u64) -> Self {
        Self { destination, weight }
    }

    pub fn validate(&self) -> Result<(), CodecError> {
        if let Some(idx) = self
            .destination
            .interior
            .iter()
            .position(|j| matches!(j, Junction::Raw(bytes) if bytes.is_empty()))
        {
            return Err(CodecError::invalid(format!("interior junction {} is empty", idx)));
        }
        if self.weight == 0 {
            return Err(CodecError::invalid("weight must be non-zero"));
        }
        Ok(())
    }
}

impl From<&XcmTransferPayload> for XcmTransferInfo {
    fn from(payload: &XcmTransferPayload) -> Self {
        Self {
            destination: XcmMultilocation {
                parents: payload.destination.parents,
                interior: payload
                    .destination
                    .interior
                    .iter()
                    .map(Junction::to_bytes)
                    .collect(),
            },
            weight: payload.weight,
        }
    }
}

impl From<XcmTransferInfo> for XcmTransferPayload {
    fn from(info: XcmTransferInfo) -> Self {
        Self {
            destination: MultiLocation {
                parents: info.destination.parents,
                interior: info
                    .destination
                    .interior
                    .iter()
                    .map(|bytes| Junction::from_bytes(bytes))
                    .collect(),
            },
            weight: info.weight,
        }
    }
}

/// Encode as `tuple(tuple(uint8,bytes[]),uint64)` in single-parameter form.
pub fn encode(payload: &XcmTransferPayload) -> Result<Bytes, CodecError> {
    payload.validate()?;
    let info = XcmTransferInfo::from(payload);
    Ok(Bytes::from(<XcmTransferInfo as SolType>::abi_encode(&info)))
}

pub fn decode(data: &[u8]) -> Result<XcmTransferPayload, CodecError> {
    if data.len() < MIN_ENCODED_LEN {
        return Err(CodecError::malformed(format!(
            "expected at least {} bytes, got {}",
            MIN_ENCODED_LEN,
            data.len()
        )));
    }
    <XcmTransferInfo as SolType>::abi_decode(data, true)
        .map(XcmTransferPayload::from)
        .map_err(|e| CodecError::malformed(e.to_string()))
}
