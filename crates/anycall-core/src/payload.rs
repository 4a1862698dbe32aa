use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::swap::{self, PayloadLayout, SwapPayload};
use crate::xcm::{self, XcmTransferPayload};

/// Any payload the proxies accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Swap(SwapPayload),
    XcmTransfer(XcmTransferPayload),
}

impl Payload {
    /// Encode the payload. XCM transfers have a single layout and ignore
    /// `layout`.
    pub fn encode(&self, layout: PayloadLayout) -> Result<Bytes, CodecError> {
        match self {
            Self::Swap(payload) => swap::encode_with(payload, layout),
            Self::XcmTransfer(payload) => xcm::encode(payload),
        }
    }

    /// Check time-dependent validity against a unix timestamp.
    pub fn check_deadline(&self, now: u64) -> Result<(), CodecError> {
        match self {
            Self::Swap(payload) => payload.check_deadline(now),
            Self::XcmTransfer(_) => Ok(()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Swap(_) => "swap",
            Self::XcmTransfer(_) => "xcm_transfer",
        }
    }
}

impl From<SwapPayload> for Payload {
    fn from(payload: SwapPayload) -> Self {
        Self::Swap(payload)
    }
}

impl From<XcmTransferPayload> for Payload {
    fn from(payload: XcmTransferPayload) -> Self {
        Self::XcmTransfer(payload)
    }
}
