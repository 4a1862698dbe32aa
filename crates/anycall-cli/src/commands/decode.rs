//! `anycall decode`: inspect call data.

use anycall_core::{swap, xcm, EntryPoint, Payload};
use clap::Args;
use serde::Serialize;

use super::{parse_hex, LayoutArg};

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex call data, with or without 0x. `exec(...)` wrapping is detected.
    pub data: String,

    /// Layout of the swap payload.
    #[arg(long, value_enum, default_value = "params")]
    pub layout: LayoutArg,

    /// Decode an XCM transfer payload instead of a swap.
    #[arg(long)]
    pub xcm: bool,
}

#[derive(Serialize)]
struct Decoded {
    entry: EntryPoint,
    payload: Payload,
}

pub fn decode_json(args: &DecodeArgs) -> anyhow::Result<String> {
    let bytes = parse_hex(&args.data)?;
    let (entry, inner) = EntryPoint::split_calldata(&bytes)?;
    let payload: Payload = if args.xcm {
        xcm::decode(&inner)?.into()
    } else {
        swap::decode_with(&inner, args.layout.into())?.into()
    };
    Ok(serde_json::to_string_pretty(&Decoded { entry, payload })?)
}

pub fn run(args: &DecodeArgs) -> anyhow::Result<()> {
    println!("{}", decode_json(args)?);
    Ok(())
}
