pub mod decode;
pub mod encode;
pub mod init;
pub mod run;
pub mod xcm;

use anycall_core::PayloadLayout;

/// `--layout` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LayoutArg {
    /// Bare tuple parameters, as passed to a router.
    Params,
    /// One tuple argument with a leading offset word, as `abi.decode(data, (AnycallInfo))` expects.
    SingleTuple,
}

impl From<LayoutArg> for PayloadLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Params => PayloadLayout::Params,
            LayoutArg::SingleTuple => PayloadLayout::SingleTuple,
        }
    }
}

/// Hex with or without a `0x` prefix.
pub fn parse_hex(input: &str) -> anyhow::Result<Vec<u8>> {
    let digits = input.trim();
    let digits = digits.strip_prefix("0x").unwrap_or(digits);
    Ok(hex::decode(digits)?)
}

pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
