use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, I256};
use anycall_core::{CodecError, EntryPoint, Payload, PayloadLayout};
use chrono::Utc;
use futures::future::join_all;

use crate::config::HarnessConfig;
use crate::error::SettlementError;
use crate::state_machine::{HarnessEvent, HarnessPhase, PhaseMachine};
use crate::traits::{ChainQuery, TxSubmitter};
use crate::types::{
    BalanceDelta, BalanceKey, ScenarioId, ScenarioResult, SettlementReport, SettlementSnapshot,
    TxId,
};

/// One payload, where to send it, and what it should do to balances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioConfig {
    pub name: String,
    /// Contract the call is sent to.
    pub target: Address,
    pub entry: EntryPoint,
    pub layout: PayloadLayout,
    /// Keys tracked in addition to those in `expected`.
    pub watch: Vec<BalanceKey>,
    pub payload: Payload,
    pub expected: BalanceDelta,
}

impl ScenarioConfig {
    pub fn new(name: impl Into<String>, target: Address, payload: impl Into<Payload>) -> Self {
        Self {
            name: name.into(),
            target,
            entry: EntryPoint::Raw,
            layout: PayloadLayout::Params,
            watch: Vec::new(),
            payload: payload.into(),
            expected: BalanceDelta::new(),
        }
    }

    pub fn with_entry(mut self, entry: EntryPoint) -> Self {
        self.entry = entry;
        self
    }

    pub fn with_layout(mut self, layout: PayloadLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Track `key`, expecting it to stay unchanged unless `expect` says
    /// otherwise.
    pub fn watch(mut self, key: BalanceKey) -> Self {
        self.watch.push(key);
        self
    }

    pub fn expect(mut self, key: BalanceKey, delta: I256) -> Self {
        self.expected.insert(key, delta);
        self
    }

    /// Every key read in both snapshots, sorted and deduplicated.
    pub fn tracked_keys(&self) -> Vec<BalanceKey> {
        self.watch
            .iter()
            .chain(self.expected.keys())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Encoded payload wrapped for the entry point.
    pub fn calldata(&self) -> Result<Bytes, CodecError> {
        let payload = self.payload.encode(self.layout)?;
        Ok(self.entry.wrap(payload))
    }
}

/// Runs scenarios against a chain: snapshot, submit, snapshot, compare.
pub struct SettlementHarness {
    query: Arc<dyn ChainQuery>,
    submitter: Arc<dyn TxSubmitter>,
    config: HarnessConfig,
}

impl SettlementHarness {
    pub fn new(
        query: Arc<dyn ChainQuery>,
        submitter: Arc<dyn TxSubmitter>,
        config: HarnessConfig,
    ) -> Self {
        tracing::info!(
            query = query.query_id(),
            submitter = submitter.submitter_id(),
            "Creating settlement harness"
        );
        Self {
            query,
            submitter,
            config,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Read every key, retrying failed reads per the retry policy.
    pub async fn snapshot(&self, keys: &[BalanceKey]) -> Result<SettlementSnapshot, SettlementError> {
        let query = self.query.as_ref();
        let mut balances = BTreeMap::new();
        for key in keys {
            let (account, asset) = (key.account, key.asset);
            let balance = self
                .config
                .retry
                .run("get_balance", move || query.get_balance(account, asset))
                .await?;
            balances.insert(*key, balance);
        }
        Ok(SettlementSnapshot::new(balances))
    }

    /// Run one scenario to a terminal result. Never panics on chain or
    /// codec failures; they end up in [`ScenarioResult::Failed`].
    pub async fn run_scenario(&self, scenario: &ScenarioConfig) -> ScenarioResult {
        let mut run = ScenarioRun::new(&scenario.name);
        tracing::info!(
            scenario = %scenario.name,
            run_id = %run.id,
            payload = scenario.payload.kind(),
            to = %scenario.target,
            "Starting scenario"
        );

        match self.execute(scenario, &mut run).await {
            Ok((tx_id, deltas)) => {
                tracing::info!(
                    scenario = %scenario.name,
                    run_id = %run.id,
                    tx_id = %tx_id,
                    deltas = %deltas,
                    "Scenario verified"
                );
                ScenarioResult::Verified {
                    scenario: scenario.name.clone(),
                    run_id: run.id,
                    tx_id,
                    deltas,
                }
            }
            Err(reason) => run.into_failed(reason),
        }
    }

    /// Run independent scenarios concurrently. Results keep the input order.
    ///
    /// Scenarios sharing an account race on its balance; keep key sets
    /// disjoint.
    pub async fn run_all(&self, scenarios: &[ScenarioConfig]) -> Vec<ScenarioResult> {
        join_all(scenarios.iter().map(|scenario| self.run_scenario(scenario))).await
    }

    async fn execute(
        &self,
        scenario: &ScenarioConfig,
        run: &mut ScenarioRun<'_>,
    ) -> Result<(TxId, BalanceDelta), SettlementError> {
        let keys = scenario.tracked_keys();

        let before = self.snapshot(&keys).await?;
        run.advance(HarnessEvent::BeforeCaptured)?;

        if self.config.enforce_deadline {
            let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
            scenario.payload.check_deadline(now)?;
        }
        let calldata = scenario.calldata()?;
        tracing::debug!(
            scenario = %scenario.name,
            entry = ?scenario.entry,
            layout = %scenario.layout,
            len = calldata.len(),
            "Submitting call data"
        );

        // Submission is not retried: an accepted call cannot be taken back.
        let tx_id = match self.submitter.submit(scenario.target, calldata).await {
            Ok(tx_id) => tx_id,
            Err(err) => {
                run.tx_id = err.tx_id();
                return Err(err);
            }
        };
        run.tx_id = Some(tx_id);
        run.advance(HarnessEvent::TxAccepted)?;
        tracing::info!(scenario = %scenario.name, tx_id = %tx_id, "Transaction accepted");

        let after = self.snapshot(&keys).await?;
        run.advance(HarnessEvent::AfterCaptured)?;

        let observed = before.diff(&after)?;
        run.observed = Some(observed.clone());
        let mismatches = observed.mismatches(&scenario.expected);
        if !mismatches.is_empty() {
            for mismatch in &mismatches {
                tracing::warn!(scenario = %scenario.name, %mismatch, "Balance delta mismatch");
            }
            run.report = Some(Box::new(SettlementReport {
                before,
                after,
                expected: scenario.expected.clone(),
                observed: observed.clone(),
                mismatches: mismatches.clone(),
            }));
            return Err(SettlementError::VerificationMismatch { mismatches });
        }

        run.advance(HarnessEvent::DeltasMatched)?;
        Ok((tx_id, observed))
    }
}

/// Bookkeeping for one in-flight run.
struct ScenarioRun<'a> {
    name: &'a str,
    id: ScenarioId,
    phase: HarnessPhase,
    tx_id: Option<TxId>,
    observed: Option<BalanceDelta>,
    report: Option<Box<SettlementReport>>,
}

impl<'a> ScenarioRun<'a> {
    fn new(name: &'a str) -> Self {
        Self {
            name,
            id: ScenarioId::new(),
            phase: HarnessPhase::Idle,
            tx_id: None,
            observed: None,
            report: None,
        }
    }

    fn advance(&mut self, event: HarnessEvent) -> Result<(), SettlementError> {
        self.phase = PhaseMachine::transition(self.phase, event)?;
        Ok(())
    }

    fn into_failed(mut self, reason: SettlementError) -> ScenarioResult {
        let phase = self.phase;
        if let Err(e) = self.advance(HarnessEvent::Failure) {
            tracing::error!(scenario = %self.name, error = %e, "Could not mark run as failed");
        }
        tracing::warn!(
            scenario = %self.name,
            run_id = %self.id,
            phase = %phase,
            tx_id = ?self.tx_id,
            error = %reason,
            "Scenario failed"
        );
        ScenarioResult::Failed {
            scenario: self.name.to_string(),
            run_id: self.id,
            phase,
            reason,
            tx_id: self.tx_id,
            observed: self.observed,
            report: self.report,
        }
    }
}
