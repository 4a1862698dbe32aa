//! Fixtures shared by the integration tests.

use alloy_primitives::{Address, I256, U256};
use anycall_core::SwapPayload;
use anycall_settlement::adapters::LocalLedger;
use anycall_settlement::Asset;

pub fn wallet() -> Address {
    Address::repeat_byte(0xaa)
}

pub fn token_a() -> Address {
    Address::repeat_byte(0x11)
}

pub fn token_b() -> Address {
    Address::repeat_byte(0x22)
}

pub fn token_c() -> Address {
    Address::repeat_byte(0x33)
}

/// Address the local ledger treats as the router / anycall proxy.
pub fn proxy() -> Address {
    Address::repeat_byte(0x44)
}

pub fn delta(value: i64) -> I256 {
    I256::try_from(value).expect("fits in I256")
}

/// One 32-byte ABI word.
pub fn word(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

pub fn address_word(address: Address) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(address.as_slice());
    out
}

/// Exact-input swap of 1 token (18 decimals) from A to B with no deadline.
pub fn example_payload(receiver: Address) -> SwapPayload {
    SwapPayload::exact_input(
        U256::from(1_000_000_000_000_000_000u128),
        vec![token_a(), token_b()],
        receiver,
    )
}

/// Ledger sending from `caller`, holding `amount` of token A.
pub fn funded_ledger(caller: Address, amount: u64) -> LocalLedger {
    let ledger = LocalLedger::new(caller);
    ledger.mint(caller, Asset::Token(token_a()), U256::from(amount));
    ledger
}
