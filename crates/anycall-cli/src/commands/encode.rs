//! `anycall encode`: build swap call data.

use anycall_settlement::config::{EntrySpec, PayloadSpec};
use clap::Args;

use super::{to_hex, LayoutArg};

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Exact output amount; 0 selects an exact-input swap.
    #[arg(long, default_value = "0")]
    pub amount_out: String,

    /// Minimum acceptable output.
    #[arg(long, default_value = "0")]
    pub amount_out_min: String,

    /// Input amount for exact-input swaps, input ceiling otherwise.
    #[arg(long)]
    pub amount_in_max: String,

    /// Token path, comma separated, input first.
    #[arg(long, value_delimiter = ',', required = true)]
    pub path: Vec<String>,

    /// Recipient of the output.
    #[arg(short, long)]
    pub receiver: String,

    /// Unix seconds, or "max" for no deadline.
    #[arg(long, default_value = "max")]
    pub deadline: String,

    /// Unwrap the output into the native coin.
    #[arg(long)]
    pub to_native: bool,

    #[arg(long, value_enum, default_value = "params")]
    pub layout: LayoutArg,

    /// Wrap into `exec(token, receiver, amount, data)` for the anycall proxy.
    #[arg(long, requires_all = ["exec_receiver", "exec_amount"])]
    pub exec_token: Option<String>,

    /// Refund receiver passed to `exec`.
    #[arg(long)]
    pub exec_receiver: Option<String>,

    /// Amount passed to `exec`.
    #[arg(long)]
    pub exec_amount: Option<String>,
}

impl EncodeArgs {
    fn payload_spec(&self) -> PayloadSpec {
        PayloadSpec::Swap {
            amount_out: self.amount_out.clone(),
            amount_out_min: self.amount_out_min.clone(),
            amount_in_max: self.amount_in_max.clone(),
            path: self.path.clone(),
            receiver: self.receiver.clone(),
            deadline: Some(self.deadline.clone()),
            to_native: self.to_native,
        }
    }

    fn entry_spec(&self) -> EntrySpec {
        match (&self.exec_token, &self.exec_receiver, &self.exec_amount) {
            (Some(token), Some(receiver), Some(amount)) => EntrySpec::AnycallExec {
                token: token.clone(),
                receiver: receiver.clone(),
                amount: amount.clone(),
            },
            _ => EntrySpec::Raw,
        }
    }
}

pub fn encode_hex(args: &EncodeArgs) -> anyhow::Result<String> {
    let payload = args.payload_spec().to_payload()?;
    let entry = args.entry_spec().to_entry_point()?;
    let encoded = payload.encode(args.layout.into())?;
    tracing::debug!(layout = ?args.layout, len = encoded.len(), "Encoded swap payload");
    Ok(to_hex(&entry.wrap(encoded)))
}

pub fn run(args: &EncodeArgs) -> anyhow::Result<()> {
    println!("{}", encode_hex(args)?);
    Ok(())
}
