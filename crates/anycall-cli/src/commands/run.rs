//! `anycall run`: execute the configured scenarios against a node.

use std::fmt::{self, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anycall_settlement::adapters::JsonRpcAdapter;
use anycall_settlement::{ScenarioConfig, ScenarioResult, SettlementError, SettlementHarness};
use clap::Args;

use crate::config::AnycallConfig;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "anycall.toml")]
    pub config: PathBuf,

    /// Only run the named scenario. Repeatable.
    #[arg(long)]
    pub only: Vec<String>,

    /// Run scenarios concurrently. Only safe when they touch disjoint
    /// accounts, since they share the sender's nonce.
    #[arg(long)]
    pub concurrent: bool,
}

fn select_scenarios(config: &AnycallConfig, only: &[String]) -> anyhow::Result<Vec<ScenarioConfig>> {
    for name in only {
        if !config.scenarios.iter().any(|spec| &spec.name == name) {
            anyhow::bail!("no scenario named {:?}", name);
        }
    }
    config
        .scenarios
        .iter()
        .filter(|spec| only.is_empty() || only.contains(&spec.name))
        .map(|spec| {
            spec.to_config()
                .with_context(|| format!("invalid scenario {:?}", spec.name))
        })
        .collect()
}

pub async fn run(args: &RunArgs, config: AnycallConfig) -> anyhow::Result<()> {
    if !args.config.exists() {
        anyhow::bail!(
            "no configuration at {}; run 'anycall init' first",
            args.config.display()
        );
    }
    let scenarios = select_scenarios(&config, &args.only)?;
    if scenarios.is_empty() {
        anyhow::bail!("{} defines no [[scenario]] tables", args.config.display());
    }

    let adapter = Arc::new(
        JsonRpcAdapter::connect(config.rpc.clone())
            .await
            .with_context(|| format!("could not connect to {}", config.rpc.url))?,
    );
    println!("Running {} scenario(s) against {}", scenarios.len(), config.rpc.url);
    println!("  Sender:   {}", adapter.sender());
    println!();

    let harness = SettlementHarness::new(adapter.clone(), adapter, config.harness.clone());
    let results = if args.concurrent {
        harness.run_all(&scenarios).await
    } else {
        let mut results = Vec::with_capacity(scenarios.len());
        for scenario in &scenarios {
            results.push(harness.run_scenario(scenario).await);
        }
        results
    };

    for result in &results {
        print!("{}", render(result)?);
    }
    let failed = results.iter().filter(|result| !result.is_verified()).count();
    println!();
    println!("{} verified, {} failed", results.len() - failed, failed);

    if failed > 0 {
        anyhow::bail!("{} scenario(s) failed", failed);
    }
    Ok(())
}

/// Human-readable summary of one result.
fn render(result: &ScenarioResult) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_result(&mut out, result)?;
    Ok(out)
}

fn write_result(out: &mut String, result: &ScenarioResult) -> fmt::Result {
    match result {
        ScenarioResult::Verified {
            scenario,
            tx_id,
            deltas,
            ..
        } => {
            writeln!(out, "[verified] {}", scenario)?;
            writeln!(out, "  Tx:       {}", tx_id)?;
            for (key, delta) in deltas.iter() {
                writeln!(out, "  {}: {}", key, delta)?;
            }
        }
        ScenarioResult::Failed {
            scenario,
            phase,
            reason,
            tx_id,
            report,
            ..
        } => {
            writeln!(out, "[failed]   {} (after {})", scenario, phase)?;
            writeln!(out, "  Reason:   {}", reason)?;
            if let Some(tx_id) = tx_id {
                writeln!(out, "  Tx:       {} (sent, do not resubmit blindly)", tx_id)?;
            }
            match report {
                Some(report) => {
                    for mismatch in &report.mismatches {
                        let before = report.before.balance(&mismatch.key).unwrap_or_default();
                        let after = report.after.balance(&mismatch.key).unwrap_or_default();
                        writeln!(
                            out,
                            "  {}: expected {}, observed {} (before {}, after {})",
                            mismatch.key, mismatch.expected, mismatch.observed, before, after
                        )?;
                    }
                }
                None => {
                    if let SettlementError::VerificationMismatch { mismatches } = reason {
                        for mismatch in mismatches {
                            writeln!(out, "  {}", mismatch)?;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, I256, U256};
    use anycall_settlement::{
        BalanceDelta, BalanceKey, DeltaMismatch, HarnessPhase, ScenarioId, SettlementReport,
        SettlementSnapshot, TxId,
    };
    use std::collections::BTreeMap;

    fn key() -> BalanceKey {
        BalanceKey::token(Address::repeat_byte(0xaa), Address::repeat_byte(0x22))
    }

    #[test]
    fn test_render_verified() {
        let deltas = BalanceDelta::new().with(key(), I256::try_from(990i64).unwrap());
        let result = ScenarioResult::Verified {
            scenario: "swap".into(),
            run_id: ScenarioId::new(),
            tx_id: TxId(B256::ZERO),
            deltas,
        };
        let text = render(&result).unwrap();
        assert!(text.starts_with("[verified] swap"));
        assert!(text.contains(": 990"));
    }

    #[test]
    fn test_render_mismatch_with_report() {
        let mismatch = DeltaMismatch {
            key: key(),
            expected: I256::try_from(990i64).unwrap(),
            observed: I256::ZERO,
        };
        let balances = BTreeMap::from([(key(), U256::from(7))]);
        let report = SettlementReport {
            before: SettlementSnapshot::new(balances.clone()),
            after: SettlementSnapshot::new(balances),
            expected: BalanceDelta::new().with(key(), mismatch.expected),
            observed: BalanceDelta::new().with(key(), I256::ZERO),
            mismatches: vec![mismatch.clone()],
        };
        let result = ScenarioResult::Failed {
            scenario: "swap".into(),
            run_id: ScenarioId::new(),
            phase: HarnessPhase::SnapshotAfter,
            reason: SettlementError::VerificationMismatch {
                mismatches: vec![mismatch],
            },
            tx_id: Some(TxId(B256::ZERO)),
            observed: None,
            report: Some(Box::new(report)),
        };

        let text = render(&result).unwrap();
        assert!(text.starts_with("[failed]   swap (after SnapshotAfter)"));
        assert!(text.contains("expected 990, observed 0 (before 7, after 7)"));
        assert!(text.contains("do not resubmit"));
    }

    #[test]
    fn test_render_unconfirmed_shows_tx() {
        let tx_id = TxId(B256::repeat_byte(0x11));
        let result = ScenarioResult::Failed {
            scenario: "swap".into(),
            run_id: ScenarioId::new(),
            phase: HarnessPhase::SnapshotBefore,
            reason: SettlementError::Unconfirmed {
                tx_id,
                reason: "rate limited".into(),
            },
            tx_id: Some(tx_id),
            observed: None,
            report: None,
        };

        let text = render(&result).unwrap();
        assert!(text.contains("rate limited"));
        assert!(text.contains(&format!("Tx:       {} (sent", tx_id)));
    }

    #[test]
    fn test_unknown_only_filter() {
        let config = AnycallConfig::default();
        assert!(select_scenarios(&config, &["missing".to_string()]).is_err());
        assert!(select_scenarios(&config, &[]).unwrap().is_empty());
    }
}
