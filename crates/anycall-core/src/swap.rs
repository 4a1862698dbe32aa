use std::fmt;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolType};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

sol! {
    /// Swap instruction read by the trade proxy behind `AnycallProxy.exec`.
    struct AnycallInfo {
        uint256 amountOut;
        uint256 amountOutMin;
        uint256 amountInMax;
        address[] path;
        address receiver;
        uint256 deadline;
        bool toNative;
    }
}

/// Size of one ABI word.
pub const WORD: usize = 32;

/// Number of head slots in the `AnycallInfo` tuple.
pub const HEAD_SLOTS: usize = 7;

/// Index of the head slot holding the offset of `path`.
const PATH_SLOT: usize = 3;

/// Smallest valid tuple encoding: the head plus the `path` length word.
pub const MIN_ENCODED_LEN: usize = (HEAD_SLOTS + 1) * WORD;

/// How the tuple is laid out on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadLayout {
    /// Bare tuple encoding: seven head slots followed by the `path` tail.
    #[default]
    Params,
    /// Single-parameter encoding, i.e. `encode(["tuple(...)"], [info])`.
    /// Same bytes as `Params` prefixed by a `0x20` offset word.
    SingleTuple,
}

impl fmt::Display for PayloadLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Params => write!(f, "params"),
            Self::SingleTuple => write!(f, "single_tuple"),
        }
    }
}

/// Whether the payload fixes the input or the output amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapMode {
    /// `amount_out == 0`: spend exactly `amount_in_max`.
    ExactInput,
    /// Receive exactly `amount_out`, spending at most `amount_in_max`.
    ExactOutput,
}

/// Cross-chain swap instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPayload {
    /// Exact output amount requested (0 = unconstrained).
    pub amount_out: U256,
    /// Minimum acceptable output.
    pub amount_out_min: U256,
    /// Maximum input, or the exact input in [`SwapMode::ExactInput`].
    pub amount_in_max: U256,
    /// Token hops, first is sold and last is bought.
    pub path: Vec<Address>,
    /// Destination of the output funds.
    pub receiver: Address,
    /// Unix timestamp cutoff, or `U256::MAX` for no deadline.
    pub deadline: U256,
    /// Unwrap the final output to the native asset.
    pub to_native: bool,
}

impl SwapPayload {
    /// Exact-input swap with no deadline and no minimum output, the shape
    /// most deployment scripts build.
    pub fn exact_input(amount_in: U256, path: Vec<Address>, receiver: Address) -> Self {
        Self {
            amount_out: U256::ZERO,
            amount_out_min: U256::ZERO,
            amount_in_max: amount_in,
            path,
            receiver,
            deadline: U256::MAX,
            to_native: false,
        }
    }

    /// Exact-output swap with no deadline.
    pub fn exact_output(
        amount_out: U256,
        amount_in_max: U256,
        path: Vec<Address>,
        receiver: Address,
    ) -> Self {
        Self {
            amount_out,
            amount_out_min: amount_out,
            amount_in_max,
            path,
            receiver,
            deadline: U256::MAX,
            to_native: false,
        }
    }

    pub fn with_min_out(mut self, amount_out_min: U256) -> Self {
        self.amount_out_min = amount_out_min;
        self
    }

    pub fn with_deadline(mut self, deadline: U256) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_to_native(mut self, to_native: bool) -> Self {
        self.to_native = to_native;
        self
    }

    pub fn mode(&self) -> SwapMode {
        if self.amount_out.is_zero() {
            SwapMode::ExactInput
        } else {
            SwapMode::ExactOutput
        }
    }

    /// Token sold by the first hop.
    pub fn token_in(&self) -> Option<Address> {
        self.path.first().copied()
    }

    /// Token bought by the last hop.
    pub fn token_out(&self) -> Option<Address> {
        self.path.last().copied()
    }

    pub fn has_deadline(&self) -> bool {
        self.deadline != U256::MAX
    }

    /// Check the structural invariants. The deadline is time-dependent and
    /// checked separately by [`SwapPayload::check_deadline`].
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.path.len() < 2 {
            return Err(CodecError::invalid(format!(
                "path must contain at least 2 tokens, got {}",
                self.path.len()
            )));
        }
        if let Some(idx) = self.path.iter().position(|token| token.is_zero()) {
            return Err(CodecError::invalid(format!(
                "path entry {} is the zero address",
                idx
            )));
        }
        if let Some(idx) = self.path.windows(2).position(|hop| hop[0] == hop[1]) {
            return Err(CodecError::invalid(format!(
                "path hop {} swaps {} into itself",
                idx, self.path[idx]
            )));
        }
        if !self.amount_out.is_zero() && self.amount_out_min > self.amount_out {
            return Err(CodecError::invalid(format!(
                "amount_out_min {} exceeds amount_out {}",
                self.amount_out_min, self.amount_out
            )));
        }
        Ok(())
    }

    /// Reject a bounded deadline that is not strictly after `now`.
    pub fn check_deadline(&self, now: u64) -> Result<(), CodecError> {
        if !self.has_deadline() || self.deadline > U256::from(now) {
            return Ok(());
        }
        Err(CodecError::invalid(format!(
            "deadline {} has elapsed (now {})",
            self.deadline, now
        )))
    }
}

impl From<&SwapPayload> for AnycallInfo {
    fn from(payload: &SwapPayload) -> Self {
        Self {
            amountOut: payload.amount_out,
            amountOutMin: payload.amount_out_min,
            amountInMax: payload.amount_in_max,
            path: payload.path.clone(),
            receiver: payload.receiver,
            deadline: payload.deadline,
            toNative: payload.to_native,
        }
    }
}

impl From<AnycallInfo> for SwapPayload {
    fn from(info: AnycallInfo) -> Self {
        Self {
            amount_out: info.amountOut,
            amount_out_min: info.amountOutMin,
            amount_in_max: info.amountInMax,
            path: info.path,
            receiver: info.receiver,
            deadline: info.deadline,
            to_native: info.toNative,
        }
    }
}

/// Encode a payload in the bare tuple layout.
pub fn encode(payload: &SwapPayload) -> Result<Bytes, CodecError> {
    encode_with(payload, PayloadLayout::Params)
}

/// Decode a payload from the bare tuple layout.
pub fn decode(data: &[u8]) -> Result<SwapPayload, CodecError> {
    decode_with(data, PayloadLayout::Params)
}

/// Encode in the single-parameter layout.
pub fn encode_single(payload: &SwapPayload) -> Result<Bytes, CodecError> {
    encode_with(payload, PayloadLayout::SingleTuple)
}

/// Decode from the single-parameter layout.
pub fn decode_single(data: &[u8]) -> Result<SwapPayload, CodecError> {
    decode_with(data, PayloadLayout::SingleTuple)
}

pub fn encode_with(payload: &SwapPayload, layout: PayloadLayout) -> Result<Bytes, CodecError> {
    payload.validate()?;
    let info = AnycallInfo::from(payload);
    let encoded = match layout {
        PayloadLayout::Params => <AnycallInfo as SolType>::abi_encode_params(&info),
        PayloadLayout::SingleTuple => <AnycallInfo as SolType>::abi_encode(&info),
    };
    tracing::trace!(%layout, len = encoded.len(), hops = payload.path.len(), "encoded swap payload");
    Ok(Bytes::from(encoded))
}

pub fn decode_with(data: &[u8], layout: PayloadLayout) -> Result<SwapPayload, CodecError> {
    let info = match layout {
        PayloadLayout::Params => {
            check_tuple_bounds(data)?;
            <AnycallInfo as SolType>::abi_decode_params(data, true)
        }
        PayloadLayout::SingleTuple => {
            let tuple = strip_outer_offset(data)?;
            check_tuple_bounds(tuple)?;
            <AnycallInfo as SolType>::abi_decode(data, true)
        }
    }
    .map_err(|e| CodecError::malformed(e.to_string()))?;
    Ok(info.into())
}

/// Read a word as a `usize`, rejecting values that cannot index a buffer.
pub(crate) fn word_as_usize(word: &[u8]) -> Option<usize> {
    let value = U256::from_be_slice(word);
    if value.bit_len() > 32 {
        return None;
    }
    Some(value.as_limbs()[0] as usize)
}

/// Validate the leading `0x20` word of the single-parameter layout and
/// return the tuple region it points to.
fn strip_outer_offset(data: &[u8]) -> Result<&[u8], CodecError> {
    if data.len() < WORD + MIN_ENCODED_LEN {
        return Err(CodecError::malformed(format!(
            "expected at least {} bytes, got {}",
            WORD + MIN_ENCODED_LEN,
            data.len()
        )));
    }
    match word_as_usize(&data[..WORD]) {
        Some(WORD) => Ok(&data[WORD..]),
        _ => Err(CodecError::malformed("tuple offset must be 0x20")),
    }
}

/// Check the head length and that the `path` offset and length stay inside
/// the tuple region.
fn check_tuple_bounds(tuple: &[u8]) -> Result<(), CodecError> {
    if tuple.len() < MIN_ENCODED_LEN {
        return Err(CodecError::malformed(format!(
            "expected at least {} bytes, got {}",
            MIN_ENCODED_LEN,
            tuple.len()
        )));
    }
    if tuple.len() % WORD != 0 {
        return Err(CodecError::malformed(format!(
            "length {} is not a multiple of {}",
            tuple.len(),
            WORD
        )));
    }

    let slot = &tuple[PATH_SLOT * WORD..(PATH_SLOT + 1) * WORD];
    let offset = word_as_usize(slot)
        .filter(|offset| *offset >= HEAD_SLOTS * WORD && offset % WORD == 0)
        .filter(|offset| offset + WORD <= tuple.len())
        .ok_or_else(|| CodecError::malformed("path offset points outside the buffer"))?;

    let count = word_as_usize(&tuple[offset..offset + WORD])
        .ok_or_else(|| CodecError::malformed("path length overflows"))?;
    let end = count
        .checked_mul(WORD)
        .and_then(|n| n.checked_add(offset + WORD));
    match end {
        Some(end) if end <= tuple.len() => Ok(()),
        _ => Err(CodecError::malformed(format!(
            "path of {} entries at offset {} overruns {} bytes",
            count,
            offset,
            tuple.len()
        ))),
    }
}
