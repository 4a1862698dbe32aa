//! anycall: encode cross-chain swap and XCM payloads, and run settlement
//! scenarios against a JSON-RPC node.
//!
//! Subcommands: init, encode, decode, xcm, run.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::{AnycallConfig, LogFormat, LoggingConfig};

#[derive(Parser, Debug)]
#[command(name = "anycall", version, about, long_about = None)]
struct Cli {
    /// Override the log level (trace, debug, info, warn, error). `RUST_LOG`
    /// wins over both this and the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Override the log format.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a template anycall.toml.
    Init(commands::init::InitArgs),
    /// Encode a swap payload and print it as hex.
    Encode(commands::encode::EncodeArgs),
    /// Decode hex call data and print the payload as JSON.
    Decode(commands::decode::DecodeArgs),
    /// Encode an XCM transfer payload and print it as hex.
    Xcm(commands::xcm::XcmArgs),
    /// Run every scenario in the config file and verify balances.
    Run(commands::run::RunArgs),
}

impl Cli {
    fn logging(&self, mut base: LoggingConfig) -> LoggingConfig {
        if let Some(level) = &self.log_level {
            base.level = level.clone();
        }
        if let Some(format) = self.log_format {
            base.format = format;
        }
        base
    }
}

/// Logs go to stderr so command output can be piped.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match logging.format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Run(args) => AnycallConfig::load(&args.config)?,
        _ => AnycallConfig::default(),
    };
    init_tracing(&cli.logging(config.logging.clone()));

    match &cli.command {
        Commands::Init(args) => commands::init::run(args),
        Commands::Encode(args) => commands::encode::run(args),
        Commands::Decode(args) => commands::decode::run(args),
        Commands::Xcm(args) => commands::xcm::run(args),
        Commands::Run(args) => commands::run::run(args, config).await,
    }
}
