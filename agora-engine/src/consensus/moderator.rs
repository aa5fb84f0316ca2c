//! Moderator - fans an issue out to every agent and synthesizes the result.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use agora_core::{
    AgentContext, AgentOpinion, AgentRole, DecisionPacket, DetectedIssue, OracleError, Result,
};
use agora_reasoning::ReasoningProvider;

use super::agent::GovernanceAgent;
use super::synthesis::Synthesizer;
use super::Deliberator;
use crate::config::ConsensusConfig;

/// Result of one deliberation round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliberationOutcome {
    pub packet: DecisionPacket,
    /// Agents that failed, panicked or missed the deadline
    pub absent_agents: Vec<String>,
}

/// Orchestrates agent deliberation.
pub struct Moderator {
    config: ConsensusConfig,
    synthesizer: Synthesizer,
    agents: Arc<RwLock<Vec<Arc<dyn Deliberator>>>>,
}

impl Moderator {
    /// Moderator with no agents and default configuration.
    pub fn new() -> Self {
        Self::with_config(ConsensusConfig::default())
    }

    pub fn with_config(config: ConsensusConfig) -> Self {
        Self {
            synthesizer: Synthesizer::new(config.action_cutoff),
            config,
            agents: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Moderator pre-loaded with one agent per deliberating role.
    pub fn with_panel(config: ConsensusConfig, provider: Option<Arc<dyn ReasoningProvider>>) -> Self {
        let panel: Vec<Arc<dyn Deliberator>> =
            GovernanceAgent::panel(provider, config.agent_timeout_ms)
                .into_iter()
                .map(|agent| Arc::new(agent) as Arc<dyn Deliberator>)
                .collect();
        let moderator = Self::with_config(config);
        Self {
            agents: Arc::new(RwLock::new(panel)),
            ..moderator
        }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Register an agent, replacing any agent with the same id.
    pub async fn register_agent(&self, agent: Arc<dyn Deliberator>) -> Result<()> {
        if agent.role() == AgentRole::Moderator {
            return Err(OracleError::ValidationError(format!(
                "agent {} has the moderator role, which holds no opinion",
                agent.id()
            )));
        }
        let mut agents = self.agents.write().await;
        if let Some(existing) = agents.iter_mut().find(|a| a.id() == agent.id()) {
            *existing = agent;
        } else {
            agents.push(agent);
        }
        Ok(())
    }

    /// Remove an agent. Returns whether it was registered.
    pub async fn unregister_agent(&self, agent_id: &str) -> bool {
        let mut agents = self.agents.write().await;
        let before = agents.len();
        agents.retain(|a| a.id() != agent_id);
        agents.len() != before
    }

    /// Registered agents in registration order.
    pub async fn agents(&self) -> Vec<Arc<dyn Deliberator>> {
        self.agents.read().await.clone()
    }

    /// Collect an opinion from every agent, then synthesize a decision packet.
    ///
    /// Agents run concurrently, at most `max_concurrent_agents` at a time.
    /// Synthesis waits for every agent to answer or fail; a failed agent
    /// contributes no opinion and is listed in `absent_agents`.
    pub async fn deliberate(
        &self,
        issue: &DetectedIssue,
        context: &AgentContext,
    ) -> Result<DeliberationOutcome> {
        let agents = self.agents().await;
        if agents.is_empty() {
            warn!(issue_id = %issue.id, "Deliberating with no registered agents");
        }

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_agents.max(1)));
        let deadline = self
            .config
            .deadline_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        let issue_snapshot = Arc::new(issue.clone());
        let context = Arc::new(context.clone());

        // Dropping the set aborts agents still running, so a cancelled
        // deliberation leaves no provider calls behind
        let mut tasks = JoinSet::new();
        for (index, agent) in agents.iter().enumerate() {
            let task = run_agent(
                agent.clone(),
                issue_snapshot.clone(),
                context.clone(),
                permits.clone(),
                deadline,
            );
            tasks.spawn(async move { (index, task.await) });
        }

        // Slots left empty belong to agents whose task panicked
        let mut results: Vec<Option<Result<AgentOpinion>>> = agents.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!(error = %e, "Agent task aborted"),
            }
        }

        let mut opinions: Vec<AgentOpinion> = Vec::with_capacity(results.len());
        let mut absent_agents = Vec::new();
        for (agent, result) in agents.iter().zip(results) {
            match result {
                Some(Ok(opinion)) => {
                    debug!(
                        agent_id = %agent.id(),
                        stance = opinion.stance.as_str(),
                        confidence = opinion.confidence,
                        "Opinion collected"
                    );
                    opinions.push(opinion);
                }
                Some(Err(e)) => {
                    warn!(agent_id = %agent.id(), error = %e, "Agent failed to deliberate");
                    absent_agents.push(agent.id().to_string());
                }
                None => absent_agents.push(agent.id().to_string()),
            }
        }

        let packet = self.synthesizer.synthesize(issue, opinions);
        info!(
            issue_id = %issue.id,
            opinions = packet.agent_opinions.len(),
            absent = absent_agents.len(),
            consensus_score = packet.consensus_score,
            proposal_type = ?packet.recommended_proposal_type,
            "Deliberation complete"
        );

        Ok(DeliberationOutcome {
            packet,
            absent_agents,
        })
    }
}

/// One agent's deliberation under the concurrency bound and optional deadline.
async fn run_agent(
    agent: Arc<dyn Deliberator>,
    issue: Arc<DetectedIssue>,
    context: Arc<AgentContext>,
    permits: Arc<Semaphore>,
    deadline: Option<Instant>,
) -> Result<AgentOpinion> {
    let _permit = permits
        .acquire_owned()
        .await
        .map_err(|e| OracleError::ExternalServiceError(e.to_string()))?;
    let work = agent.deliberate(&issue, &context);
    match deadline {
        Some(at) => tokio::time::timeout_at(at, work).await.map_err(|_| {
            OracleError::ExternalServiceError(format!(
                "agent {} missed the deliberation deadline",
                agent.id()
            ))
        })?,
        None => work.await,
    }
}

impl Default for Moderator {
    fn default() -> Self {
        Self::new()
    }
}
