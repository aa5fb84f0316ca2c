//! Governance pipeline integration tests
//!
//! Exercises the stages through their public API:
//! - Signal registry ceiling
//! - Threshold evidence
//! - Consensus, voting and delegation laws
//! - Outcome proofs and trust
//! - A full cycle driven by a reasoning provider

use std::sync::Arc;

use agora_core::{
    AgentContext, EntityType, ExecutionAction, ExecutionStatus, IssuePriority, IssueStatus,
    KpiResult, OracleError, ProposalStatus, ProposalType, VoteChoice,
};
use agora_engine::config::{OracleConfig, RegistryConfig};
use agora_engine::detection::{ThresholdOperator, ThresholdRule};
use agora_engine::governance::templates;
use agora_engine::signal::{MockAdapter, MockObservation};
use agora_engine::{
    DelegationManager, DetectionEngine, GovernancePipeline, OutcomeTracker, ProposalOptions,
    SignalRegistry, ThresholdDetector, TrustManager, VotingSystem,
};
use agora_reasoning::MockBackend;
use chrono::Utc;

fn gas_rule() -> ThresholdRule {
    ThresholdRule::new(
        "gas_usage",
        ThresholdOperator::Gte,
        80.0,
        IssuePriority::High,
        "Gas usage above budget",
    )
}

/// A pipeline whose only detector is the gas rule, with one scripted batch queued.
async fn scripted_pipeline(pipeline: GovernancePipeline, values: &[f64]) -> GovernancePipeline {
    let pipeline =
        pipeline.with_detection(DetectionEngine::new().with_detector(ThresholdDetector::new(vec![gas_rule()])));
    let adapter = MockAdapter::new();
    adapter.script(values.iter().map(|v| MockObservation::new("gas_usage", *v)));
    pipeline.registry().register_adapter(Arc::new(adapter)).await;
    pipeline
}

fn quorum_one() -> OracleConfig {
    let mut config = OracleConfig::default();
    config.voting.default_quorum = 1;
    config
}

// =============================================================================
// Signals & Detection
// =============================================================================

#[tokio::test]
async fn test_registry_never_exceeds_ceiling() {
    let registry = SignalRegistry::with_config(RegistryConfig { max_signals: 7 });
    registry
        .register_adapter(Arc::new(MockAdapter::with_seed(5, 42)))
        .await;

    for _ in 0..4 {
        registry.collect_signals().await.unwrap();
        let stats = registry.stats().await.unwrap();
        assert!(stats.normalized_signal_count <= 7);
        assert!(stats.raw_signal_count <= 7);
    }
}

#[tokio::test]
async fn test_threshold_evidence_satisfies_rule() {
    let pipeline = scripted_pipeline(GovernancePipeline::with_config(quorum_one()), &[95.0, 80.0, 12.0, 79.9]).await;
    let signals = pipeline.registry().collect_signals().await.unwrap();
    let issues = pipeline.detection().detect(&signals);

    assert!(!issues.is_empty());
    let rule = gas_rule();
    for issue in &issues {
        assert!(!issue.signals.is_empty());
        for signal in &issue.signals {
            assert!(rule.triggers(signal), "{} should breach the rule", signal.value);
        }
    }
}

// =============================================================================
// Consensus
// =============================================================================

#[tokio::test]
async fn test_unanimous_provider_yields_action_proposal() {
    let backend = MockBackend::new("unanimous").with_response(
        r#"{"stance": "strongly_support", "confidence": 1.0, "reasoning": "Clear breach", "concerns": [], "recommendations": ["Raise the gas limit"]}"#,
    );
    let pipeline = GovernancePipeline::with_provider(quorum_one(), Arc::new(backend));
    let pipeline = scripted_pipeline(pipeline, &[92.0]).await;

    let report = pipeline.run_cycle(&AgentContext::default()).await.unwrap();
    assert_eq!(report.deliberations.len(), 1);

    let packet = &report.deliberations[0].packet;
    assert_eq!(packet.agent_opinions.len(), 4);
    assert_eq!(packet.consensus_score, 1.0);
    assert_eq!(packet.recommended_proposal_type, ProposalType::Action);
    assert!(packet.dissent.is_empty());
}

// =============================================================================
// Voting
// =============================================================================

async fn active_proposal(voting: &VotingSystem, quorum: u32, threshold: u32) -> String {
    let pipeline = scripted_pipeline(GovernancePipeline::with_config(quorum_one()), &[90.0]).await;
    let report = pipeline.run_cycle(&AgentContext::default()).await.unwrap();
    let packet = report.deliberations[0].packet.clone();

    let options = ProposalOptions {
        quorum: Some(quorum),
        threshold: Some(threshold),
        ..Default::default()
    };
    let proposal = voting.create_proposal(packet, "0xproposer", options).await.unwrap();
    voting.activate_proposal(&proposal.id).await.unwrap();
    proposal.id
}

#[tokio::test]
async fn test_quorum_threshold_law() {
    let voting = VotingSystem::new();
    let id = active_proposal(&voting, 3, 50).await;

    voting.cast_vote(&id, "0xa", VoteChoice::For, 35, None).await.unwrap();
    voting.cast_vote(&id, "0xb", VoteChoice::For, 25, None).await.unwrap();
    voting.cast_vote(&id, "0xc", VoteChoice::Against, 40, None).await.unwrap();

    let first = voting.tally_votes(&id).await.unwrap();
    let second = voting.tally_votes(&id).await.unwrap();
    assert_eq!(first, second);
    assert!(first.quorum_reached);
    assert_eq!(first.for_votes, 60);
    assert_eq!(first.against_votes, 40);
    assert!(first.passed);
}

#[tokio::test]
async fn test_second_vote_rejected() {
    let voting = VotingSystem::new();
    let id = active_proposal(&voting, 2, 50).await;

    voting.cast_vote(&id, "0xa", VoteChoice::Against, 10, None).await.unwrap();
    let before = voting.tally_votes(&id).await.unwrap();

    let err = voting
        .cast_vote(&id, "0xa", VoteChoice::For, 10, Some("changed my mind".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::StateError(_)));
    assert_eq!(voting.tally_votes(&id).await.unwrap(), before);
}

#[tokio::test]
async fn test_finalize_twice_fails() {
    let voting = VotingSystem::new();
    let id = active_proposal(&voting, 1, 50).await;
    voting.cast_vote(&id, "0xa", VoteChoice::For, 1, None).await.unwrap();

    assert_eq!(voting.finalize_proposal(&id).await.unwrap().status, ProposalStatus::Passed);
    assert!(matches!(
        voting.finalize_proposal(&id).await.unwrap_err(),
        OracleError::StateError(_)
    ));
}

// =============================================================================
// Delegation
// =============================================================================

#[tokio::test]
async fn test_delegation_priority_law() {
    let manager = DelegationManager::new();
    manager
        .create_policy("0xdelegator", "0xdelegate", templates::low_priority_only(), None)
        .await
        .unwrap();

    let voting = VotingSystem::new();
    let id = active_proposal(&voting, 1, 50).await;
    let mut proposal = voting.get_proposal(&id).await.unwrap().unwrap();

    // The gas rule raises high-priority issues
    assert_eq!(proposal.decision_packet.issue.priority, IssuePriority::High);
    assert!(manager
        .should_auto_delegate("0xdelegator", &proposal)
        .await
        .unwrap()
        .is_none());

    proposal.decision_packet.issue.priority = IssuePriority::Low;
    proposal.decision_packet.issue.category = "something_else".into();
    proposal.quorum = 99;
    let matched = manager
        .should_auto_delegate("0xdelegator", &proposal)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(matched.delegate, "0xdelegate");
}

// =============================================================================
// Outcome & Trust
// =============================================================================

fn results(execution_id: &str, succeeded: usize, total: usize) -> Vec<KpiResult> {
    (0..total)
        .map(|i| KpiResult {
            id: format!("{}-{}", execution_id, i),
            execution_id: execution_id.to_string(),
            kpi_name: format!("kpi-{}", i),
            target_value: 10.0,
            actual_value: if i < succeeded { 5.0 } else { 20.0 },
            unit: "units".into(),
            measured_at: Utc::now(),
            success: i < succeeded,
            deviation: if i < succeeded { -50.0 } else { 100.0 },
        })
        .collect()
}

#[tokio::test]
async fn test_outcome_proof_law() {
    let tracker = OutcomeTracker::new();
    let actions = || vec![ExecutionAction::new("transfer", "0xtreasury", ExecutionStatus::Completed)];

    let passing = tracker.record_execution("p-1", actions()).await.unwrap();
    tracker
        .record_kpi_results(&passing.id, results(&passing.id, 4, 5))
        .await
        .unwrap();
    let proof = tracker.generate_proof(&passing.id).await.unwrap();
    assert_eq!(proof.success_rate, 80.0);
    assert!(proof.overall_success);
    assert!(tracker.verify_proof(&proof).unwrap());

    let failing = tracker.record_execution("p-2", actions()).await.unwrap();
    tracker
        .record_kpi_results(&failing.id, results(&failing.id, 3, 5))
        .await
        .unwrap();
    let proof = tracker.generate_proof(&failing.id).await.unwrap();
    assert_eq!(proof.success_rate, 60.0);
    assert!(!proof.overall_success);
}

#[tokio::test]
async fn test_extra_recent_failure_lowers_trust() {
    let tracker = OutcomeTracker::new();
    let trust = TrustManager::new();

    let mut proofs = Vec::new();
    for (i, succeeded) in [5, 4, 2].into_iter().enumerate() {
        let execution = tracker
            .record_execution(&format!("p-{}", i), vec![])
            .await
            .unwrap();
        tracker
            .record_kpi_results(&execution.id, results(&execution.id, succeeded, 5))
            .await
            .unwrap();
        proofs.push(tracker.generate_proof(&execution.id).await.unwrap());
    }

    for proof in &proofs[..2] {
        trust.record_outcome("0xsteady", EntityType::Delegate, proof).await.unwrap();
        trust.record_outcome("0xslipped", EntityType::Delegate, proof).await.unwrap();
    }
    trust.record_outcome("0xslipped", EntityType::Delegate, &proofs[2]).await.unwrap();

    let steady = trust.get_score("0xsteady").await.unwrap().unwrap();
    let slipped = trust.get_score("0xslipped").await.unwrap().unwrap();
    assert!(slipped.score < steady.score);
    assert_eq!(slipped.total_decisions, 3);
    assert!(trust.weighted_reputation("0xslipped").await.unwrap() < trust.weighted_reputation("0xsteady").await.unwrap());
}

// =============================================================================
// Full Cycle
// =============================================================================

#[tokio::test]
async fn test_full_cycle_to_trust() {
    let pipeline = scripted_pipeline(GovernancePipeline::with_config(quorum_one()), &[97.0]).await;
    let report = pipeline.run_cycle(&AgentContext::default()).await.unwrap();
    let proposal_id = report.proposals[0].id.clone();

    let voting = pipeline.voting();
    voting.activate_proposal(&proposal_id).await.unwrap();
    voting
        .cast_vote(&proposal_id, "0xholder", VoteChoice::For, 1_000, None)
        .await
        .unwrap();
    voting.finalize_proposal(&proposal_id).await.unwrap();

    let credited = vec![
        ("agora-oracle".to_string(), EntityType::Proposer),
        ("risk-agent".to_string(), EntityType::Agent),
    ];
    let outcome = pipeline
        .record_outcome(
            &proposal_id,
            vec![ExecutionAction::new("parameter_change", "gas_limit", ExecutionStatus::Completed)],
            &credited,
        )
        .await
        .unwrap();

    // Resolution time and recurrence are measurable right away; satisfaction is not
    assert_eq!(outcome.proof.kpi_results.len(), 2);
    assert!(outcome.proof.overall_success);
    assert!(outcome.trust_scores.iter().all(|s| s.score > 50.0));

    let executed = pipeline.list_issues(Some(IssueStatus::Executed)).await.unwrap();
    assert_eq!(executed.len(), 1);
}
