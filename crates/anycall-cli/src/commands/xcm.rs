//! `anycall xcm`: build an XCM transfer payload.

use anycall_core::PayloadLayout;
use anycall_settlement::config::PayloadSpec;
use clap::Args;

use super::to_hex;

#[derive(Args, Debug)]
pub struct XcmArgs {
    /// Destination parachain ID.
    #[arg(long)]
    pub parachain: u32,

    /// 32-byte destination account public key, hex.
    #[arg(long)]
    pub account32: String,

    /// Execution weight bought on the destination.
    #[arg(long)]
    pub weight: u64,

    /// Levels up from this chain (1 = relay).
    #[arg(long, default_value_t = 1)]
    pub parents: u8,
}

pub fn encode_hex(args: &XcmArgs) -> anyhow::Result<String> {
    let spec = PayloadSpec::XcmTransfer {
        parents: args.parents,
        parachain: args.parachain,
        account_id32: args.account32.clone(),
        weight: args.weight,
    };
    let payload = spec.to_payload()?;
    Ok(to_hex(&payload.encode(PayloadLayout::Params)?))
}

pub fn run(args: &XcmArgs) -> anyhow::Result<()> {
    println!("{}", encode_hex(args)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anycall_core::xcm::{self, Junction};

    const ACCOUNT: &str = "0x4829b1e41449bd2cc7f04df856052f4d439f2f3e7f346c9702b94928ddf04707";

    #[test]
    fn test_xcm_encode() {
        let args = XcmArgs {
            parachain: 2011,
            account32: ACCOUNT.into(),
            weight: 1_000_000_000,
            parents: 1,
        };
        let encoded = encode_hex(&args).unwrap();
        assert!(encoded.contains("00000007db"));

        let bytes = super::super::parse_hex(&encoded).unwrap();
        let decoded = xcm::decode(&bytes).unwrap();
        assert_eq!(decoded.weight, 1_000_000_000);
        assert_eq!(decoded.destination.interior[0], Junction::Parachain(2011));
    }

    #[test]
    fn test_short_account_is_rejected() {
        let args = XcmArgs {
            parachain: 2011,
            account32: "0x1234".into(),
            weight: 1,
            parents: 1,
        };
        assert!(encode_hex(&args).is_err());
    }
}
