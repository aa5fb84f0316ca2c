//! End-to-end governance cycle.
//!
//! ```text
//! SignalRegistry ─► DetectionEngine ─► Moderator ─► VotingSystem
//!                                                       │ (human votes)
//!                        TrustManager ◄─ OutcomeTracker ◄┘ record_outcome
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use agora_core::{
    AgentContext, DetectedIssue, EntityType, ExecutionAction, ExecutionRecord, IssueKind,
    IssueStatus, KeyedStore, MemoryStore, OracleError, OutcomeProof, Proposal, ProposalStatus,
    Result, TrustScore,
};
use agora_reasoning::ReasoningProvider;

use crate::config::OracleConfig;
use crate::consensus::{DeliberationOutcome, Moderator};
use crate::detection::{AnomalyDetector, DetectionEngine, TrendDetector};
use crate::governance::{DelegationManager, DelegationMatch, ProposalOptions, VotingSystem};
use crate::outcome::{OutcomeTracker, TrustManager};
use crate::signal::SignalRegistry;

/// What one cycle produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub signals_collected: usize,
    /// Every issue found, insights included, in its final status
    pub issues: Vec<DetectedIssue>,
    pub deliberations: Vec<DeliberationOutcome>,
    /// Pending proposals opened this cycle
    pub proposals: Vec<Proposal>,
}

/// Result of recording a proposal's execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeReport {
    pub execution: ExecutionRecord,
    pub proof: OutcomeProof,
    pub trust_scores: Vec<TrustScore>,
}

/// Wires every stage together over shared components.
pub struct GovernancePipeline {
    config: OracleConfig,
    proposer: String,
    registry: Arc<SignalRegistry>,
    detection: DetectionEngine,
    moderator: Arc<Moderator>,
    voting: Arc<VotingSystem>,
    delegation: Arc<DelegationManager>,
    outcomes: Arc<OutcomeTracker>,
    trust: Arc<TrustManager>,
    issues: Arc<dyn KeyedStore<DetectedIssue>>,
}

impl GovernancePipeline {
    pub fn new() -> Self {
        Self::with_config(OracleConfig::default())
    }

    /// Anomaly and trend detection plus the rule-based agent panel.
    pub fn with_config(config: OracleConfig) -> Self {
        Self::build(config, None)
    }

    /// Like [`with_config`](Self::with_config) with agents consulting a reasoning provider.
    pub fn with_provider(config: OracleConfig, provider: Arc<dyn ReasoningProvider>) -> Self {
        Self::build(config, Some(provider))
    }

    fn build(config: OracleConfig, provider: Option<Arc<dyn ReasoningProvider>>) -> Self {
        let detection = DetectionEngine::new()
            .with_detector(AnomalyDetector::with_config(config.anomaly.clone()))
            .with_detector(TrendDetector::with_config(config.trend.clone()));
        Self {
            proposer: "agora-oracle".to_string(),
            registry: Arc::new(SignalRegistry::with_config(config.registry.clone())),
            detection,
            moderator: Arc::new(Moderator::with_panel(config.consensus.clone(), provider)),
            voting: Arc::new(VotingSystem::with_config(config.voting.clone())),
            delegation: Arc::new(DelegationManager::new()),
            outcomes: Arc::new(OutcomeTracker::with_config(config.outcome.clone())),
            trust: Arc::new(TrustManager::with_config(config.trust.clone())),
            issues: Arc::new(MemoryStore::new()),
            config,
        }
    }

    /// Replace the detector set.
    pub fn with_detection(mut self, detection: DetectionEngine) -> Self {
        self.detection = detection;
        self
    }

    pub fn with_moderator(mut self, moderator: Arc<Moderator>) -> Self {
        self.moderator = moderator;
        self
    }

    pub fn with_outcome_tracker(mut self, outcomes: Arc<OutcomeTracker>) -> Self {
        self.outcomes = outcomes;
        self
    }

    /// Identity recorded as proposer of generated proposals.
    pub fn with_proposer(mut self, proposer: impl Into<String>) -> Self {
        self.proposer = proposer.into();
        self
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SignalRegistry> {
        &self.registry
    }

    pub fn detection(&self) -> &DetectionEngine {
        &self.detection
    }

    pub fn moderator(&self) -> &Arc<Moderator> {
        &self.moderator
    }

    pub fn voting(&self) -> &Arc<VotingSystem> {
        &self.voting
    }

    pub fn delegation(&self) -> &Arc<DelegationManager> {
        &self.delegation
    }

    pub fn outcomes(&self) -> &Arc<OutcomeTracker> {
        &self.outcomes
    }

    pub fn trust(&self) -> &Arc<TrustManager> {
        &self.trust
    }

    /// Collect, detect, deliberate and open proposals.
    ///
    /// Insights are stored but not deliberated. Each deliberated issue moves
    /// to `deliberating` before its panel runs and to `voting` once its
    /// proposal exists.
    pub async fn run_cycle(&self, context: &AgentContext) -> Result<CycleReport> {
        let signals = self.registry.collect_signals().await?;
        let detected = self.detection.detect(&signals);
        debug!(signals = signals.len(), issues = detected.len(), "Detection finished");

        let mut report = CycleReport {
            signals_collected: signals.len(),
            ..Default::default()
        };

        for mut issue in detected {
            if issue.kind == IssueKind::Insight {
                self.issues.put(&issue.id, issue.clone()).await?;
                report.issues.push(issue);
                continue;
            }

            issue.advance_status(IssueStatus::Deliberating)?;
            self.issues.put(&issue.id, issue.clone()).await?;

            let outcome = self.moderator.deliberate(&issue, context).await?;
            let proposal = self
                .voting
                .create_proposal(outcome.packet.clone(), self.proposer.as_str(), ProposalOptions::default())
                .await?;
            self.outcomes
                .register_decision(&proposal.id, outcome.packet.clone())
                .await?;

            issue.advance_status(IssueStatus::Voting)?;
            self.issues.put(&issue.id, issue.clone()).await?;

            report.issues.push(issue);
            report.deliberations.push(outcome);
            report.proposals.push(proposal);
        }

        info!(
            signals = report.signals_collected,
            issues = report.issues.len(),
            proposals = report.proposals.len(),
            "Governance cycle complete"
        );
        Ok(report)
    }

    /// Delegate chosen by a delegator's policies for a proposal.
    pub async fn resolve_delegation(
        &self,
        delegator: &str,
        proposal_id: &str,
    ) -> Result<Option<DelegationMatch>> {
        let proposal = self
            .voting
            .get_proposal(proposal_id)
            .await?
            .ok_or_else(|| OracleError::not_found("proposal", proposal_id))?;
        self.delegation.should_auto_delegate(delegator, &proposal).await
    }

    /// Record the execution of a passed proposal, prove its outcome and
    /// credit the listed entities.
    ///
    /// The proof is generated before the proposal is marked executed, and
    /// only the call that performs that transition credits trust. A proposal
    /// that is already executed is rejected.
    pub async fn record_outcome(
        &self,
        proposal_id: &str,
        actions: Vec<ExecutionAction>,
        credited: &[(String, EntityType)],
    ) -> Result<OutcomeReport> {
        let proposal = self
            .voting
            .get_proposal(proposal_id)
            .await?
            .ok_or_else(|| OracleError::not_found("proposal", proposal_id))?;
        if proposal.status != ProposalStatus::Passed {
            return Err(OracleError::StateError(format!(
                "proposal {} cannot record an outcome (status: {})",
                proposal_id,
                proposal.status.as_str()
            )));
        }

        let execution = self.outcomes.record_execution(proposal_id, actions).await?;
        let proof = self.outcomes.generate_proof(&execution.id).await?;
        let proposal = self.voting.execute_proposal(proposal_id).await?;

        let mut trust_scores = Vec::with_capacity(credited.len());
        for (entity_id, entity_type) in credited {
            trust_scores.push(self.trust.record_outcome(entity_id, *entity_type, &proof).await?);
        }

        let issue_id = &proposal.decision_packet.issue_id;
        if let Some(mut issue) = self.issues.get(issue_id).await? {
            if issue.status < IssueStatus::Executed {
                issue.advance_status(IssueStatus::Executed)?;
                self.issues.put(issue_id, issue).await?;
            }
        }

        info!(
            proposal_id,
            execution_id = %execution.id,
            success_rate = proof.success_rate,
            credited = trust_scores.len(),
            "Outcome recorded"
        );
        Ok(OutcomeReport {
            execution,
            proof,
            trust_scores,
        })
    }

    pub async fn get_issue(&self, issue_id: &str) -> Result<Option<DetectedIssue>> {
        self.issues.get(issue_id).await
    }

    /// Stored issues, oldest first, optionally filtered by status.
    pub async fn list_issues(&self, status: Option<IssueStatus>) -> Result<Vec<DetectedIssue>> {
        let mut issues = match status {
            Some(status) => self.issues.list(&|i: &DetectedIssue| i.status == status).await?,
            None => self.issues.all().await?,
        };
        issues.sort_by(|a, b| a.detected_at.cmp(&b.detected_at).then_with(|| a.id.cmp(&b.id)));
        Ok(issues)
    }
}

impl Default for GovernancePipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{ThresholdDetector, ThresholdOperator, ThresholdRule};
    use crate::signal::{MockAdapter, MockObservation};
    use agora_core::{ExecutionStatus, IssuePriority, VoteChoice};

    async fn pipeline_with_breach() -> GovernancePipeline {
        let mut config = OracleConfig::default();
        config.voting.default_quorum = 1;
        let rule = ThresholdRule::new(
            "gas_usage",
            ThresholdOperator::Gt,
            80.0,
            IssuePriority::High,
            "Gas usage above budget",
        );
        let pipeline = GovernancePipeline::with_config(config)
            .with_detection(DetectionEngine::new().with_detector(ThresholdDetector::new(vec![rule])));

        let adapter = MockAdapter::new();
        adapter.script(vec![
            MockObservation::new("gas_usage", 95.0),
            MockObservation::new("token_price", 10.0),
        ]);
        pipeline.registry().register_adapter(Arc::new(adapter)).await;
        pipeline
    }

    #[tokio::test]
    async fn test_cycle_opens_proposal_per_issue() {
        let pipeline = pipeline_with_breach().await;
        let report = pipeline.run_cycle(&AgentContext::default()).await.unwrap();

        assert_eq!(report.signals_collected, 2);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.proposals.len(), 1);
        assert_eq!(report.issues[0].status, IssueStatus::Voting);
        assert_eq!(report.proposals[0].status, ProposalStatus::Pending);
        assert_eq!(report.proposals[0].proposer, "agora-oracle");
        assert_eq!(report.deliberations[0].packet.agent_opinions.len(), 4);
        assert_eq!(
            report.deliberations[0].packet.issue.status,
            IssueStatus::Deliberating
        );

        let stored = pipeline.get_issue(&report.issues[0].id).await.unwrap().unwrap();
        assert_eq!(stored.status, IssueStatus::Voting);
    }

    #[tokio::test]
    async fn test_outcome_requires_passed_proposal() {
        let pipeline = pipeline_with_breach().await;
        let report = pipeline.run_cycle(&AgentContext::default()).await.unwrap();
        let proposal_id = report.proposals[0].id.clone();

        let err = pipeline.record_outcome(&proposal_id, vec![], &[]).await.unwrap_err();
        assert!(matches!(err, OracleError::StateError(_)));

        let voting = pipeline.voting();
        voting.activate_proposal(&proposal_id).await.unwrap();
        voting.cast_vote(&proposal_id, "0xvoter", VoteChoice::For, 10, None).await.unwrap();
        voting.finalize_proposal(&proposal_id).await.unwrap();

        let actions = vec![ExecutionAction::new("parameter_change", "gas_limit", ExecutionStatus::Completed)];
        let credited = vec![("agora-oracle".to_string(), EntityType::Proposer)];
        let outcome = pipeline
            .record_outcome(&proposal_id, actions, &credited)
            .await
            .unwrap();

        assert_eq!(outcome.execution.status, ExecutionStatus::Completed);
        assert_eq!(outcome.trust_scores.len(), 1);
        assert_eq!(outcome.proof.overall_success, outcome.trust_scores[0].successful_decisions == 1);

        let proposal = voting.get_proposal(&proposal_id).await.unwrap().unwrap();
        assert_eq!(proposal.status, ProposalStatus::Executed);
        let issue = pipeline.get_issue(&report.issues[0].id).await.unwrap().unwrap();
        assert_eq!(issue.status, IssueStatus::Executed);
    }

    #[tokio::test]
    async fn test_outcome_credited_once_per_proposal() {
        let pipeline = pipeline_with_breach().await;
        let report = pipeline.run_cycle(&AgentContext::default()).await.unwrap();
        let proposal_id = report.proposals[0].id.clone();

        let voting = pipeline.voting();
        voting.activate_proposal(&proposal_id).await.unwrap();
        voting.cast_vote(&proposal_id, "0xvoter", VoteChoice::For, 10, None).await.unwrap();
        voting.finalize_proposal(&proposal_id).await.unwrap();

        let credited = vec![("agora-oracle".to_string(), EntityType::Proposer)];
        let first = pipeline.record_outcome(&proposal_id, vec![], &credited).await.unwrap();

        for _ in 0..2 {
            let err = pipeline
                .record_outcome(&proposal_id, vec![], &credited)
                .await
                .unwrap_err();
            assert!(matches!(err, OracleError::StateError(_)));
        }

        let score = pipeline.trust().get_score("agora-oracle").await.unwrap().unwrap();
        assert_eq!(score.total_decisions, 1);
        assert_eq!(score, first.trust_scores[0]);
        assert_eq!(pipeline.outcomes().list_proofs().await.unwrap().len(), 1);
    }
}
