//! Integration test: full snapshot → submit → snapshot → verify runs against
//! the in-memory ledger, using anycall-core payloads and anycall-settlement
//! harness together.

use std::sync::Arc;

use alloy_primitives::{Address, I256, U256};
use anycall_core::{EntryPoint, MultiLocation, PayloadLayout, SwapPayload, XcmTransferPayload};
use anycall_integration_tests::{delta, funded_ledger, proxy, token_a, token_b, token_c, wallet};
use anycall_settlement::adapters::LocalLedger;
use anycall_settlement::{
    Asset, BalanceKey, HarnessConfig, HarnessPhase, RetryPolicy, ScenarioConfig, ScenarioResult,
    ScenarioSpec, SettlementError, SettlementHarness,
};

fn harness_for(ledger: &Arc<LocalLedger>, config: HarnessConfig) -> SettlementHarness {
    SettlementHarness::new(ledger.clone(), ledger.clone(), config)
}

fn swap_1000(receiver: Address) -> SwapPayload {
    SwapPayload::exact_input(U256::from(1000), vec![token_a(), token_b()], receiver)
}

fn example_two(payload: SwapPayload) -> ScenarioConfig {
    ScenarioConfig::new("example-two", proxy(), payload)
        .expect(BalanceKey::token(wallet(), token_a()), delta(-1000))
        .expect(BalanceKey::token(wallet(), token_b()), delta(990))
}

// =========================================================================
// Verified runs
// =========================================================================

#[tokio::test]
async fn test_direct_swap_verifies() {
    let ledger = Arc::new(funded_ledger(wallet(), 5000));
    let harness = harness_for(&ledger, HarnessConfig::default());

    let result = harness.run_scenario(&example_two(swap_1000(wallet()))).await;

    assert!(result.is_verified(), "{:?}", result);
    assert_eq!(ledger.transaction_count(), 1);
}

#[tokio::test]
async fn test_exec_swap_verifies_in_single_tuple_layout() {
    let ledger = Arc::new(funded_ledger(wallet(), 1000));
    let harness = harness_for(&ledger, HarnessConfig::default());

    let scenario = example_two(swap_1000(wallet()))
        .with_layout(PayloadLayout::SingleTuple)
        .with_entry(EntryPoint::AnycallExec {
            token: token_a(),
            receiver: wallet(),
            amount: U256::from(1000),
        })
        .watch(BalanceKey::token(proxy(), token_a()));

    let result = harness.run_scenario(&scenario).await;
    assert!(result.is_verified(), "{:?}", result);
}

#[tokio::test]
async fn test_xcm_transfer_burns_input() {
    let ledger = Arc::new(funded_ledger(wallet(), 1000));
    let harness = harness_for(&ledger, HarnessConfig::default());

    let transfer = XcmTransferPayload::new(MultiLocation::sibling_account(2011, [1u8; 32]), 1_000_000);
    let scenario = ScenarioConfig::new("xcm", proxy(), transfer)
        .with_entry(EntryPoint::AnycallExec {
            token: token_a(),
            receiver: wallet(),
            amount: U256::from(400),
        })
        .expect(BalanceKey::token(wallet(), token_a()), delta(-400));

    let result = harness.run_scenario(&scenario).await;
    assert!(result.is_verified(), "{:?}", result);
    assert_eq!(ledger.balance(wallet(), Asset::Token(token_a())), U256::from(600));
}

// =========================================================================
// Failed runs
// =========================================================================

#[tokio::test]
async fn test_failed_exec_reports_missing_output() {
    // The proxy refunds to a different receiver, so the wallet sees
    // -1000 / +0 instead of -1000 / +990.
    let refund_to = Address::repeat_byte(0xbb);
    let ledger = Arc::new(funded_ledger(wallet(), 1000));
    let harness = harness_for(&ledger, HarnessConfig::default());

    let payload = swap_1000(wallet()).with_min_out(U256::from(999));
    let scenario = example_two(payload).with_entry(EntryPoint::AnycallExec {
        token: token_a(),
        receiver: refund_to,
        amount: U256::from(1000),
    });

    match harness.run_scenario(&scenario).await {
        ScenarioResult::Failed {
            phase,
            reason: SettlementError::VerificationMismatch { mismatches },
            tx_id,
            observed,
            report,
            ..
        } => {
            assert_eq!(phase, HarnessPhase::SnapshotAfter);
            assert!(tx_id.is_some());
            assert_eq!(mismatches.len(), 1);
            assert_eq!(mismatches[0].key, BalanceKey::token(wallet(), token_b()));
            assert_eq!(mismatches[0].observed, I256::ZERO);

            let observed = observed.unwrap();
            assert_eq!(observed.get(&BalanceKey::token(wallet(), token_a())), delta(-1000));
            assert!(report.is_some());
        }
        other => panic!("expected a mismatch, got {:?}", other),
    }
    assert_eq!(ledger.balance(refund_to, Asset::Token(token_a())), U256::from(1000));
}

#[tokio::test]
async fn test_slippage_rejection_is_reported() {
    let ledger = Arc::new(funded_ledger(wallet(), 5000));
    let harness = harness_for(&ledger, HarnessConfig::default());

    let payload = swap_1000(wallet()).with_min_out(U256::from(995));
    let result = harness.run_scenario(&example_two(payload)).await;

    match result.failure_reason() {
        Some(SettlementError::SubmissionRejected { reason }) => {
            assert!(reason.contains("INSUFFICIENT_OUTPUT_AMOUNT"))
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert!(result.tx_id().is_none());
    assert_eq!(ledger.submission_attempts(), 1);
    assert_eq!(ledger.balance(wallet(), Asset::Token(token_a())), U256::from(5000));
}

#[tokio::test]
async fn test_elapsed_deadline_is_not_submitted() {
    let ledger = Arc::new(funded_ledger(wallet(), 5000));
    let harness = harness_for(&ledger, HarnessConfig::default());

    let payload = swap_1000(wallet()).with_deadline(U256::from(1_000u64));
    let result = harness.run_scenario(&example_two(payload)).await;

    assert!(matches!(result.failure_reason(), Some(SettlementError::Codec(_))));
    assert_eq!(ledger.submission_attempts(), 0);
}

#[tokio::test]
async fn test_ledger_enforces_deadline_when_harness_does_not() {
    let ledger = Arc::new(funded_ledger(wallet(), 5000));
    let config = HarnessConfig {
        enforce_deadline: false,
        ..Default::default()
    };
    let harness = harness_for(&ledger, config);

    let payload = swap_1000(wallet()).with_deadline(U256::from(1_000u64));
    let result = harness.run_scenario(&example_two(payload)).await;

    assert!(matches!(
        result.failure_reason(),
        Some(SettlementError::SubmissionRejected { reason }) if reason == "EXPIRED"
    ));
    assert_eq!(ledger.submission_attempts(), 1);
    assert_eq!(ledger.transaction_count(), 0);
}

// =========================================================================
// Reads, retries, concurrency
// =========================================================================

#[tokio::test]
async fn test_transient_read_failures_are_retried() {
    let ledger = Arc::new(funded_ledger(wallet(), 5000));
    ledger.fail_next_reads(2);
    let config = HarnessConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
        },
        enforce_deadline: true,
    };
    let harness = harness_for(&ledger, config);

    let result = harness.run_scenario(&example_two(swap_1000(wallet()))).await;
    assert!(result.is_verified(), "{:?}", result);
}

#[tokio::test]
async fn test_snapshots_without_submission_are_identical() {
    let ledger = Arc::new(funded_ledger(wallet(), 5000));
    let harness = harness_for(&ledger, HarnessConfig::default());
    let keys = example_two(swap_1000(wallet())).tracked_keys();

    let first = harness.snapshot(&keys).await.unwrap();
    let second = harness.snapshot(&keys).await.unwrap();
    assert_eq!(first.balances, second.balances);
}

#[tokio::test]
async fn test_disjoint_scenarios_run_concurrently() {
    let ledger = Arc::new(funded_ledger(wallet(), 1000));
    ledger.mint(wallet(), Asset::Token(token_c()), U256::from(1000));
    let harness = harness_for(&ledger, HarnessConfig::default());

    let first_receiver = Address::repeat_byte(0xb1);
    let second_receiver = Address::repeat_byte(0xb2);
    let scenarios = vec![
        ScenarioConfig::new("a-to-b", proxy(), swap_1000(first_receiver))
            .expect(BalanceKey::token(wallet(), token_a()), delta(-1000))
            .expect(BalanceKey::token(first_receiver, token_b()), delta(990)),
        ScenarioConfig::new(
            "c-to-b",
            proxy(),
            SwapPayload::exact_input(U256::from(1000), vec![token_c(), token_b()], second_receiver),
        )
        .expect(BalanceKey::token(wallet(), token_c()), delta(-1000))
        .expect(BalanceKey::token(second_receiver, token_b()), delta(990)),
    ];

    let concurrent = harness.run_all(&scenarios).await;
    assert_eq!(concurrent.len(), 2);
    assert_eq!(concurrent[0].scenario(), "a-to-b");
    assert_eq!(concurrent[1].scenario(), "c-to-b");
    assert!(concurrent.iter().all(ScenarioResult::is_verified));
    assert_eq!(ledger.transaction_count(), 2);
}

// =========================================================================
// File-driven scenarios
// =========================================================================

#[tokio::test]
async fn test_scenario_from_toml() {
    let spec: ScenarioSpec = toml::from_str(&format!(
        r#"
name = "from-file"
target = "{proxy}"

[payload]
type = "swap"
amount_in_max = "1000"
path = ["{a}", "{b}"]
receiver = "{wallet}"

[[watch]]
account = "{wallet}"
asset = "native"

[[expect]]
account = "{wallet}"
asset = "{a}"
delta = "-1000"

[[expect]]
account = "{wallet}"
asset = "{b}"
delta = "+990"
"#,
        proxy = proxy(),
        a = token_a(),
        b = token_b(),
        wallet = wallet(),
    ))
    .unwrap();

    let ledger = Arc::new(funded_ledger(wallet(), 1000));
    let harness = harness_for(&ledger, HarnessConfig::default());
    let result = harness.run_scenario(&spec.to_config().unwrap()).await;

    assert!(result.is_verified(), "{:?}", result);
    let deltas = result.observed_deltas().unwrap();
    assert_eq!(deltas.get(&BalanceKey::native(wallet())), I256::ZERO);
    assert_eq!(deltas.len(), 3);
}
