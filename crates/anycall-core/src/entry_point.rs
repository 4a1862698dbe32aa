use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

sol! {
    /// AnycallProxy execution entry point. The proxy pulls `amount` of
    /// `token`, runs the payload in `data` and forwards the output to
    /// `receiver`, refunding the input there if execution fails.
    function exec(address token, address receiver, uint256 amount, bytes data)
        external
        returns (bool success, bytes result);
}

/// How encoded payload bytes are delivered to the target contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryPoint {
    /// The payload bytes are the call data.
    #[default]
    Raw,
    /// Wrapped into `exec(token, receiver, amount, payload)`.
    AnycallExec {
        token: Address,
        receiver: Address,
        amount: U256,
    },
}

impl EntryPoint {
    /// Build the call data for `payload`.
    pub fn wrap(&self, payload: Bytes) -> Bytes {
        match self {
            Self::Raw => payload,
            Self::AnycallExec {
                token,
                receiver,
                amount,
            } => execCall {
                token: *token,
                receiver: *receiver,
                amount: *amount,
                data: payload,
            }
            .abi_encode()
            .into(),
        }
    }

    /// Split call data back into its entry point and payload bytes. Anything
    /// not starting with the `exec` selector is treated as raw.
    pub fn split_calldata(calldata: &[u8]) -> Result<(Self, Bytes), CodecError> {
        if !calldata.starts_with(&execCall::SELECTOR) {
            return Ok((Self::Raw, Bytes::copy_from_slice(calldata)));
        }
        let call = execCall::abi_decode(calldata, true)
            .map_err(|e| CodecError::malformed(format!("exec call data: {}", e)))?;
        let entry = Self::AnycallExec {
            token: call.token,
            receiver: call.receiver,
            amount: call.amount,
        };
        Ok((entry, call.data))
    }
}
