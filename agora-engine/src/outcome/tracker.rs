//! Execution records, KPI measurement and outcome proofs.
//!
//! ```text
//! record_execution ──► measure_kpis ──► generate_proof ──► verify_proof
//!        │                  ▲
//!        │       register_decision (KPI plan per proposal)
//!        ▼                  │
//!   ExecutionRecord     KpiSource chain (custom sources, then baseline)
//! ```

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use agora_core::{
    content_hash, verify_hash, DecisionPacket, ExecutionAction, ExecutionRecord, ExecutionStatus,
    KeyLocks, KeyedStore, Kpi, KpiResult, MemoryStore, OracleError, OutcomeProof, Result,
    SecondaryIndex,
};

use crate::config::OutcomeConfig;

pub const RESOLUTION_TIME: &str = "Resolution Time";
pub const ISSUE_RECURRENCE: &str = "Issue Recurrence";

/// A source of KPI measurements.
#[async_trait]
pub trait KpiSource: Send + Sync {
    fn name(&self) -> &str;

    /// Measure one KPI for an execution, or `None` if this source does not know it.
    async fn measure(&self, kpi: &Kpi, execution: &ExecutionRecord) -> Result<Option<f64>>;
}

/// Measures resolution time and issue recurrence without external data.
#[derive(Default)]
pub struct BaselineKpiSource {
    /// Recurrences observed per proposal id
    recurrences: DashMap<String, u64>,
}

impl BaselineKpiSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that the issue behind a proposal was seen again.
    pub fn record_recurrence(&self, proposal_id: &str) -> u64 {
        let mut count = self.recurrences.entry(proposal_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn recurrences(&self, proposal_id: &str) -> u64 {
        self.recurrences.get(proposal_id).map(|c| *c).unwrap_or(0)
    }

    /// Whole hours since the execution was recorded.
    fn resolution_hours(execution: &ExecutionRecord) -> f64 {
        let elapsed = Utc::now() - execution.executed_at;
        (elapsed.num_seconds().max(0) as f64 / 3600.0).round()
    }
}

#[async_trait]
impl KpiSource for BaselineKpiSource {
    fn name(&self) -> &str {
        "baseline"
    }

    async fn measure(&self, kpi: &Kpi, execution: &ExecutionRecord) -> Result<Option<f64>> {
        Ok(match kpi.name.as_str() {
            RESOLUTION_TIME => Some(Self::resolution_hours(execution)),
            ISSUE_RECURRENCE => Some(self.recurrences(&execution.proposal_id) as f64),
            _ => None,
        })
    }
}

/// KPI plan used when no decision was registered for a proposal.
pub fn baseline_plan() -> Vec<Kpi> {
    vec![
        Kpi::new(RESOLUTION_TIME, 24.0, "hours", "Hours since execution"),
        Kpi::new(ISSUE_RECURRENCE, 0.0, "occurrences", "Recorded recurrences"),
    ]
}

/// Percentage deviation of actual from target.
pub fn deviation(actual: f64, target: f64) -> f64 {
    if target != 0.0 {
        (actual - target) / target * 100.0
    } else if actual == 0.0 {
        0.0
    } else {
        100.0
    }
}

/// Hashed projection of a proof.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProofPayload<'a> {
    execution_id: &'a str,
    proposal_id: &'a str,
    kpi_results: Vec<ProofKpi<'a>>,
    timestamp: String,
}

#[derive(Serialize)]
struct ProofKpi<'a> {
    name: &'a str,
    target: f64,
    actual: f64,
    success: bool,
}

impl<'a> ProofPayload<'a> {
    fn of(
        execution_id: &'a str,
        proposal_id: &'a str,
        results: &'a [KpiResult],
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            execution_id,
            proposal_id,
            kpi_results: results
                .iter()
                .map(|r| ProofKpi {
                    name: &r.kpi_name,
                    target: r.target_value,
                    actual: r.actual_value,
                    success: r.success,
                })
                .collect(),
            timestamp: recorded_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Tracks executions and turns measured KPIs into outcome proofs.
pub struct OutcomeTracker {
    config: OutcomeConfig,
    executions: Arc<dyn KeyedStore<ExecutionRecord>>,
    /// KPI results per execution id
    kpi_results: Arc<dyn KeyedStore<Vec<KpiResult>>>,
    proofs: Arc<dyn KeyedStore<OutcomeProof>>,
    /// Decision packets per proposal id
    decisions: Arc<dyn KeyedStore<DecisionPacket>>,
    /// execution id -> proof id
    proof_index: SecondaryIndex,
    sources: Vec<Arc<dyn KpiSource>>,
    baseline: Arc<BaselineKpiSource>,
    locks: KeyLocks,
}

impl OutcomeTracker {
    pub fn new() -> Self {
        Self::with_config(OutcomeConfig::default())
    }

    pub fn with_config(config: OutcomeConfig) -> Self {
        Self {
            config,
            executions: Arc::new(MemoryStore::new()),
            kpi_results: Arc::new(MemoryStore::new()),
            proofs: Arc::new(MemoryStore::new()),
            decisions: Arc::new(MemoryStore::new()),
            proof_index: SecondaryIndex::new(),
            sources: Vec::new(),
            baseline: Arc::new(BaselineKpiSource::new()),
            locks: KeyLocks::new(),
        }
    }

    /// Consult this source before the baseline one.
    pub fn with_kpi_source(mut self, source: Arc<dyn KpiSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn config(&self) -> &OutcomeConfig {
        &self.config
    }

    /// The built-in source, for recording recurrences.
    pub fn baseline(&self) -> &Arc<BaselineKpiSource> {
        &self.baseline
    }

    /// Link a proposal to the decision packet whose KPI plan judges it.
    pub async fn register_decision(&self, proposal_id: &str, packet: DecisionPacket) -> Result<()> {
        debug!(proposal_id, kpis = packet.kpis.len(), "Decision registered");
        self.decisions.put(proposal_id, packet).await
    }

    /// Record an execution executed by the configured default executor.
    pub async fn record_execution(
        &self,
        proposal_id: &str,
        actions: Vec<ExecutionAction>,
    ) -> Result<ExecutionRecord> {
        let executor = self.config.default_executor.clone();
        self.record_execution_by(proposal_id, actions, executor).await
    }

    pub async fn record_execution_by(
        &self,
        proposal_id: &str,
        actions: Vec<ExecutionAction>,
        executed_by: impl Into<String>,
    ) -> Result<ExecutionRecord> {
        if proposal_id.is_empty() {
            return Err(OracleError::ValidationError("proposal id is required".to_string()));
        }
        let record = ExecutionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            proposal_id: proposal_id.to_string(),
            status: ExecutionStatus::aggregate(actions.iter().map(|a| &a.status)),
            executed_by: executed_by.into(),
            executed_at: Utc::now(),
            tx_hash: None,
            actions,
        };
        self.executions.put(&record.id, record.clone()).await?;

        info!(
            execution_id = %record.id,
            proposal_id,
            status = ?record.status,
            actions = record.actions.len(),
            "Execution recorded"
        );
        Ok(record)
    }

    /// Measure the KPI plan of an execution's proposal and store the results.
    pub async fn measure_kpis(&self, execution_id: &str) -> Result<Vec<KpiResult>> {
        let execution = self.require_execution(execution_id).await?;
        let plan = match self.decisions.get(&execution.proposal_id).await? {
            Some(packet) => packet.kpis,
            None => baseline_plan(),
        };

        let mut results = Vec::with_capacity(plan.len());
        for kpi in &plan {
            let Some(actual) = self.measure_one(kpi, &execution).await? else {
                debug!(execution_id, kpi = %kpi.name, "No source measures KPI, skipping");
                continue;
            };
            results.push(KpiResult {
                id: uuid::Uuid::new_v4().to_string(),
                execution_id: execution_id.to_string(),
                kpi_name: kpi.name.clone(),
                target_value: kpi.target,
                actual_value: actual,
                unit: kpi.unit.clone(),
                measured_at: Utc::now(),
                success: kpi.direction.is_met(actual, kpi.target),
                deviation: deviation(actual, kpi.target),
            });
        }

        self.kpi_results.put(execution_id, results.clone()).await?;
        debug!(execution_id, measured = results.len(), planned = plan.len(), "KPIs measured");
        Ok(results)
    }

    async fn measure_one(&self, kpi: &Kpi, execution: &ExecutionRecord) -> Result<Option<f64>> {
        let baseline: Arc<dyn KpiSource> = self.baseline.clone();
        for source in self.sources.iter().chain(std::iter::once(&baseline)) {
            match source.measure(kpi, execution).await {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => {}
                Err(e) => {
                    warn!(source = source.name(), kpi = %kpi.name, error = %e, "KPI measurement failed");
                }
            }
        }
        Ok(None)
    }

    /// Store KPI results measured elsewhere, replacing any previous ones.
    pub async fn record_kpi_results(&self, execution_id: &str, results: Vec<KpiResult>) -> Result<()> {
        self.require_execution(execution_id).await?;
        self.kpi_results.put(execution_id, results).await
    }

    pub async fn get_kpi_results(&self, execution_id: &str) -> Result<Option<Vec<KpiResult>>> {
        self.kpi_results.get(execution_id).await
    }

    /// Summarize an execution's KPIs into a hashed proof.
    ///
    /// KPIs are measured on demand if none are stored. Fails with a state
    /// error when nothing can be measured. An execution has at most one
    /// proof; later calls return it unchanged.
    pub async fn generate_proof(&self, execution_id: &str) -> Result<OutcomeProof> {
        let _guard = self.locks.lock(execution_id).await;
        if let Some(existing) = self.proof_for_execution(execution_id).await? {
            return Ok(existing);
        }

        let execution = self.require_execution(execution_id).await?;
        let results = match self.kpi_results.get(execution_id).await? {
            Some(results) if !results.is_empty() => results,
            _ => self.measure_kpis(execution_id).await?,
        };
        if results.is_empty() {
            return Err(OracleError::StateError(format!(
                "execution {} has no measurable KPIs",
                execution_id
            )));
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        let success_rate = succeeded as f64 * 100.0 / results.len() as f64;

        let recorded_at = Utc::now();
        let proof_hash = content_hash(&ProofPayload::of(
            execution_id,
            &execution.proposal_id,
            &results,
            recorded_at,
        ))?;
        let proof = OutcomeProof {
            id: uuid::Uuid::new_v4().to_string(),
            execution_id: execution_id.to_string(),
            proposal_id: execution.proposal_id.clone(),
            kpi_results: results,
            overall_success: success_rate >= self.config.success_threshold,
            success_rate,
            proof_hash,
            attestation: None,
            recorded_at,
            tx_hash: None,
        };
        self.proofs.put(&proof.id, proof.clone()).await?;
        self.proof_index.insert(execution_id, &proof.id);

        info!(
            proof_id = %proof.id,
            execution_id,
            success_rate = proof.success_rate,
            overall_success = proof.overall_success,
            "Outcome proof generated"
        );
        Ok(proof)
    }

    /// Recompute a proof's hash from its contents.
    pub fn verify_proof(&self, proof: &OutcomeProof) -> Result<bool> {
        let payload = ProofPayload::of(
            &proof.execution_id,
            &proof.proposal_id,
            &proof.kpi_results,
            proof.recorded_at,
        );
        verify_hash(&payload, &proof.proof_hash)
    }

    pub async fn get_execution(&self, execution_id: &str) -> Result<Option<ExecutionRecord>> {
        self.executions.get(execution_id).await
    }

    pub async fn get_proof(&self, proof_id: &str) -> Result<Option<OutcomeProof>> {
        self.proofs.get(proof_id).await
    }

    pub async fn proof_for_execution(&self, execution_id: &str) -> Result<Option<OutcomeProof>> {
        match self.proof_index.get(execution_id).first() {
            Some(proof_id) => self.proofs.get(proof_id).await,
            None => Ok(None),
        }
    }

    /// Every proof, oldest first.
    pub async fn list_proofs(&self) -> Result<Vec<OutcomeProof>> {
        let mut proofs = self.proofs.all().await?;
        proofs.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then_with(|| a.id.cmp(&b.id)));
        Ok(proofs)
    }

    async fn require_execution(&self, execution_id: &str) -> Result<ExecutionRecord> {
        self.executions
            .get(execution_id)
            .await?
            .ok_or_else(|| OracleError::not_found("execution", execution_id))
    }
}

impl Default for OutcomeTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::ExecutionStatus::*;

    /// Reports fixed values by KPI name.
    struct FixedSource(Vec<(&'static str, f64)>);

    #[async_trait]
    impl KpiSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn measure(&self, kpi: &Kpi, _: &ExecutionRecord) -> Result<Option<f64>> {
            Ok(self
                .0
                .iter()
                .find(|(name, _)| *name == kpi.name)
                .map(|(_, value)| *value))
        }
    }

    fn completed() -> Vec<ExecutionAction> {
        vec![ExecutionAction::new("parameter_change", "0xgovernor", Completed)]
    }

    fn kpi_results(execution_id: &str, outcomes: &[bool]) -> Vec<KpiResult> {
        outcomes
            .iter()
            .enumerate()
            .map(|(i, success)| KpiResult {
                id: format!("kpi-{}", i),
                execution_id: execution_id.to_string(),
                kpi_name: format!("KPI {}", i),
                target_value: 1.0,
                actual_value: if *success { 1.0 } else { 2.0 },
                unit: "units".into(),
                measured_at: Utc::now(),
                success: *success,
                deviation: 0.0,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_execution_status_derivation() {
        let tracker = OutcomeTracker::new();
        let record = tracker
            .record_execution(
                "p-1",
                vec![
                    ExecutionAction::new("transfer", "0xa", Completed),
                    ExecutionAction::new("transfer", "0xb", Failed).with_error("reverted"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(record.status, Failed);
        assert_eq!(record.executed_by, "system");
        let stored = tracker.get_execution(&record.id).await.unwrap();
        assert_eq!(stored, Some(record));

        assert!(tracker.record_execution("", completed()).await.is_err());
    }

    #[tokio::test]
    async fn test_success_rate_boundary() {
        let tracker = OutcomeTracker::new();

        let four = tracker.record_execution("p-1", completed()).await.unwrap();
        tracker
            .record_kpi_results(&four.id, kpi_results(&four.id, &[true, true, true, true, false]))
            .await
            .unwrap();
        let proof = tracker.generate_proof(&four.id).await.unwrap();
        assert_eq!(proof.success_rate, 80.0);
        assert!(proof.overall_success);

        let three = tracker.record_execution("p-2", completed()).await.unwrap();
        tracker
            .record_kpi_results(&three.id, kpi_results(&three.id, &[true, true, true, false, false]))
            .await
            .unwrap();
        let proof = tracker.generate_proof(&three.id).await.unwrap();
        assert_eq!(proof.success_rate, 60.0);
        assert!(!proof.overall_success);
    }

    #[tokio::test]
    async fn test_baseline_kpis_measured_on_demand() {
        let tracker = OutcomeTracker::new();
        let execution = tracker.record_execution("p-1", completed()).await.unwrap();

        let proof = tracker.generate_proof(&execution.id).await.unwrap();
        assert_eq!(proof.kpi_results.len(), 2);
        assert_eq!(proof.kpi_results[0].kpi_name, RESOLUTION_TIME);
        assert_eq!(proof.success_rate, 100.0);
        assert!(proof.overall_success);
        assert!(tracker.verify_proof(&proof).unwrap());

        // One proof per execution
        let again = tracker.generate_proof(&execution.id).await.unwrap();
        assert_eq!(again.id, proof.id);
        assert_eq!(tracker.list_proofs().await.unwrap().len(), 1);
        assert_eq!(
            tracker.proof_for_execution(&execution.id).await.unwrap().map(|p| p.id),
            Some(proof.id)
        );
    }

    #[tokio::test]
    async fn test_recurrence_fails_kpi() {
        let tracker = OutcomeTracker::new();
        tracker.baseline().record_recurrence("p-1");
        let execution = tracker.record_execution("p-1", completed()).await.unwrap();

        let results = tracker.measure_kpis(&execution.id).await.unwrap();
        let recurrence = results.iter().find(|r| r.kpi_name == ISSUE_RECURRENCE).unwrap();
        assert!(!recurrence.success);
        assert_eq!(recurrence.deviation, 100.0);
    }

    #[tokio::test]
    async fn test_registered_plan_and_custom_source() {
        let tracker = OutcomeTracker::new()
            .with_kpi_source(Arc::new(FixedSource(vec![("Stakeholder Satisfaction", 90.0)])));
        let issue = agora_core::DetectedIssue::new(
            "t",
            "d",
            "gas_usage",
            agora_core::IssuePriority::Medium,
            vec![],
            vec![],
        );
        let packet = crate::consensus::Synthesizer::default().synthesize(&issue, vec![]);
        tracker.register_decision("p-1", packet).await.unwrap();

        let execution = tracker.record_execution("p-1", completed()).await.unwrap();
        let results = tracker.measure_kpis(&execution.id).await.unwrap();
        assert_eq!(results.len(), 3);
        let satisfaction = results
            .iter()
            .find(|r| r.kpi_name == "Stakeholder Satisfaction")
            .unwrap();
        assert!(satisfaction.success);
        assert!((satisfaction.deviation - 12.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_tampered_proof_fails_verification() {
        let tracker = OutcomeTracker::new();
        let execution = tracker.record_execution("p-1", completed()).await.unwrap();
        let mut proof = tracker.generate_proof(&execution.id).await.unwrap();
        proof.kpi_results[0].actual_value += 1.0;
        assert!(!tracker.verify_proof(&proof).unwrap());
    }

    #[tokio::test]
    async fn test_unknown_execution() {
        let tracker = OutcomeTracker::new();
        assert!(matches!(
            tracker.generate_proof("missing").await.unwrap_err(),
            OracleError::NotFoundError { .. }
        ));
        assert!(tracker.measure_kpis("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_kpi_results_are_remeasured() {
        let tracker = OutcomeTracker::new();
        let execution = tracker.record_execution("p-1", completed()).await.unwrap();
        tracker.record_kpi_results(&execution.id, vec![]).await.unwrap();

        let proof = tracker.generate_proof(&execution.id).await.unwrap();
        assert_eq!(proof.kpi_results.len(), 2);
        assert!(proof.overall_success);
    }

    #[tokio::test]
    async fn test_proof_requires_measurable_kpis() {
        let tracker = OutcomeTracker::new();
        let issue = agora_core::DetectedIssue::new(
            "t",
            "d",
            "gas_usage",
            agora_core::IssuePriority::Medium,
            vec![],
            vec![],
        );
        let mut packet = crate::consensus::Synthesizer::default().synthesize(&issue, vec![]);
        packet.kpis = vec![Kpi::new("Validator Uptime", 99.0, "percent", "Unreported")];
        tracker.register_decision("p-1", packet).await.unwrap();

        let execution = tracker.record_execution("p-1", completed()).await.unwrap();
        assert!(matches!(
            tracker.generate_proof(&execution.id).await.unwrap_err(),
            OracleError::StateError(_)
        ));
        assert!(tracker.proof_for_execution(&execution.id).await.unwrap().is_none());
        assert!(tracker.locks.is_empty());
    }

    #[test]
    fn test_deviation() {
        assert_eq!(deviation(30.0, 24.0), 25.0);
        assert_eq!(deviation(0.0, 0.0), 0.0);
        assert_eq!(deviation(2.0, 0.0), 100.0);
    }
}
