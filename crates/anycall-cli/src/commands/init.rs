//! `anycall init`: write a template configuration.

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (defaults to current directory).
    #[arg(default_value = ".")]
    pub dir: PathBuf,
}

pub(crate) const TEMPLATE: &str = r#"# anycall settlement configuration

[rpc]
url = "http://127.0.0.1:8545"
# Unlocked sender; the node's first account when omitted.
# from = "0x..."
receipt_poll_interval_ms = 1000
max_receipt_polls = 60

[harness]
enforce_deadline = true

[harness.retry]
max_attempts = 3
initial_backoff_ms = 200
max_backoff_ms = 2000

[logging]
level = "info"
format = "text"

# Swap 1000 units of token A for token B through the anycall proxy.
[[scenario]]
name = "token-a-to-token-b"
target = "0x0000000000000000000000000000000000000a11"
layout = "single_tuple"

[scenario.entry]
kind = "anycall_exec"
token = "0x00000000000000000000000000000000000000aa"
receiver = "0x00000000000000000000000000000000000000c0"
amount = "1000"

[scenario.payload]
type = "swap"
amount_out = "0"
amount_out_min = "0"
amount_in_max = "1000"
path = [
    "0x00000000000000000000000000000000000000aa",
    "0x00000000000000000000000000000000000000bb",
]
receiver = "0x00000000000000000000000000000000000000c0"
deadline = "max"
to_native = false

[[scenario.expect]]
account = "0x00000000000000000000000000000000000000c0"
asset = "0x00000000000000000000000000000000000000bb"
delta = "+990"
"#;

pub fn run(args: &InitArgs) -> anyhow::Result<()> {
    let config_path = args.dir.join("anycall.toml");

    if config_path.exists() {
        anyhow::bail!("configuration file already exists at {}", config_path.display());
    }

    std::fs::create_dir_all(&args.dir)?;
    std::fs::write(&config_path, TEMPLATE)?;

    println!("Initialized anycall config at {}", config_path.display());
    println!("Edit the [rpc] and [[scenario]] sections for your chain.");
    println!("Run 'anycall run -c {}' to execute the scenarios.", config_path.display());

    Ok(())
}
