//! Deliberation agents.
//!
//! One agent per governance role. An agent first asks its reasoning provider
//! (if any) for a JSON opinion under a role-specific system prompt; any
//! failure there, including a timeout or a malformed reply, falls back to the
//! role's deterministic rule evaluator. The fallback never surfaces an error.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use agora_core::{AgentContext, AgentOpinion, AgentRole, DetectedIssue, Result, Stance};
use agora_reasoning::{ReasoningError, ReasoningProvider};

use super::rules::{self, RuleOutcome};
use super::Deliberator;

/// Default timeout on a reasoning call.
pub const DEFAULT_AGENT_TIMEOUT_MS: u64 = 30_000;

const RISK_PROMPT: &str = "You are a Risk Analysis Agent in a decentralized governance system.
Your role is to:
1. Identify potential security vulnerabilities and threats
2. Assess the risk level of proposed actions
3. Evaluate potential negative consequences
4. Recommend safeguards and mitigation strategies
Be conservative and prioritize system stability and security.";

const TREASURY_PROMPT: &str = "You are a Treasury & Resource Allocation Agent in a decentralized governance system.
Your role is to:
1. Evaluate the financial implications of proposals
2. Assess resource allocation efficiency
3. Consider sustainability and long-term financial health
4. Balance investment needs with fiscal responsibility
Be pragmatic and focus on value creation and resource optimization.";

const COMMUNITY_PROMPT: &str = "You are a Community Impact Agent in a decentralized governance system.
Your role is to:
1. Assess how proposals affect the community
2. Consider user experience and accessibility
3. Evaluate fairness and inclusivity
4. Represent diverse stakeholder perspectives
Consider both majority and minority perspectives.";

const PRODUCT_PROMPT: &str = "You are a Product & Technical Feasibility Agent in a decentralized governance system.
Your role is to:
1. Evaluate technical feasibility of proposals
2. Assess implementation complexity and timeline
3. Consider technical debt and maintainability
4. Ensure alignment with product roadmap
Be practical and focus on deliverability and technical excellence.";

const MODERATOR_PROMPT: &str = "You are a Moderator Agent synthesizing multiple expert opinions into a unified decision recommendation.";

/// Reply shape expected from the reasoning provider.
#[derive(Debug, Deserialize)]
struct ReasoningReply {
    stance: String,
    confidence: f64,
    reasoning: String,
    #[serde(default)]
    concerns: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

/// A role-specific deliberation agent.
#[derive(Clone)]
pub struct GovernanceAgent {
    id: String,
    role: AgentRole,
    provider: Option<Arc<dyn ReasoningProvider>>,
    timeout: Duration,
}

impl GovernanceAgent {
    /// Rule-based agent for a role, with id `<role>-agent`.
    pub fn new(role: AgentRole) -> Self {
        Self {
            id: format!("{}-agent", role),
            role,
            provider: None,
            timeout: Duration::from_millis(DEFAULT_AGENT_TIMEOUT_MS),
        }
    }

    pub fn risk() -> Self {
        Self::new(AgentRole::Risk)
    }

    pub fn treasury() -> Self {
        Self::new(AgentRole::Treasury)
    }

    pub fn community() -> Self {
        Self::new(AgentRole::Community)
    }

    pub fn product() -> Self {
        Self::new(AgentRole::Product)
    }

    /// One agent per deliberating role, sharing an optional provider.
    pub fn panel(provider: Option<Arc<dyn ReasoningProvider>>, timeout_ms: u64) -> Vec<Self> {
        AgentRole::DELIBERATING
            .iter()
            .map(|role| {
                let agent = Self::new(*role).with_timeout_ms(timeout_ms);
                match &provider {
                    Some(p) => agent.with_provider(p.clone()),
                    None => agent,
                }
            })
            .collect()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Back the agent with a reasoning provider.
    pub fn with_provider(mut self, provider: Arc<dyn ReasoningProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout = Duration::from_millis(timeout_ms);
        self
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// System prompt for this agent's role.
    pub fn system_prompt(&self) -> &'static str {
        match self.role {
            AgentRole::Risk => RISK_PROMPT,
            AgentRole::Treasury => TREASURY_PROMPT,
            AgentRole::Community => COMMUNITY_PROMPT,
            AgentRole::Product => PRODUCT_PROMPT,
            AgentRole::Moderator => MODERATOR_PROMPT,
        }
    }

    /// User message describing the issue and context.
    pub fn build_prompt(&self, issue: &DetectedIssue, context: &AgentContext) -> String {
        let evidence: Vec<String> = issue
            .evidence
            .iter()
            .map(|e| format!("- {}", e.description))
            .collect();
        let signals: Vec<String> = issue
            .signals
            .iter()
            .take(5)
            .map(|s| {
                format!(
                    "- [{}] {} (value: {})",
                    s.severity.as_str(),
                    s.description,
                    s.value
                )
            })
            .collect();
        let context_json =
            serde_json::to_string_pretty(context).unwrap_or_else(|_| "{}".to_string());

        format!(
            "## Issue for Deliberation\n\
             **Title:** {title}\n\
             **Category:** {category}\n\
             **Priority:** {priority}\n\
             **Description:** {description}\n\n\
             ### Evidence\n{evidence}\n\n\
             ### Signals\n{signals}\n\n\
             ### Context\n{context}\n\n\
             ---\n\
             Provide your analysis as the {role} agent. Respond with a single JSON object:\n\
             {{\n  \"stance\": \"strongly_support | support | neutral | oppose | strongly_oppose\",\n  \
             \"confidence\": 0.0-1.0,\n  \"reasoning\": \"...\",\n  \"concerns\": [\"...\"],\n  \
             \"recommendations\": [\"...\"]\n}}",
            title = issue.title,
            category = issue.category,
            priority = issue.priority.as_str(),
            description = issue.description,
            evidence = evidence.join("\n"),
            signals = signals.join("\n"),
            context = context_json,
            role = self.role,
        )
    }

    /// Parse the first JSON object in a reply into an opinion.
    ///
    /// Unknown stances and missing fields are parse errors.
    pub fn parse_response(
        &self,
        issue_id: &str,
        response: &str,
    ) -> std::result::Result<AgentOpinion, ReasoningError> {
        let (start, end) = match (response.find('{'), response.rfind('}')) {
            (Some(start), Some(end)) if start < end => (start, end),
            _ => return Err(ReasoningError::ParseError("no JSON object in reply".to_string())),
        };
        let reply: ReasoningReply = serde_json::from_str(&response[start..=end])
            .map_err(|e| ReasoningError::ParseError(e.to_string()))?;
        let stance = Stance::parse(&reply.stance).ok_or_else(|| {
            ReasoningError::ParseError(format!("unknown stance '{}'", reply.stance))
        })?;

        Ok(self.opinion(
            issue_id,
            RuleOutcome {
                stance,
                confidence: reply.confidence,
                reasoning: reply.reasoning,
                concerns: reply.concerns,
                recommendations: reply.recommendations,
            },
        ))
    }

    /// Deterministic opinion from the role's rule evaluator.
    pub fn deliberate_rule_based(&self, issue: &DetectedIssue, context: &AgentContext) -> AgentOpinion {
        self.opinion(&issue.id, rules::evaluate(self.role, issue, context))
    }

    async fn deliberate_with_provider(
        &self,
        provider: &dyn ReasoningProvider,
        issue: &DetectedIssue,
        context: &AgentContext,
    ) -> std::result::Result<AgentOpinion, ReasoningError> {
        let prompt = self.build_prompt(issue, context);
        let response = tokio::time::timeout(self.timeout, provider.chat(self.system_prompt(), &prompt))
            .await
            .map_err(|_| ReasoningError::Timeout(self.timeout.as_millis() as u64))??;
        debug!(agent_id = %self.id, model = %response.model, "Reasoning reply received");
        self.parse_response(&issue.id, &response.content)
    }

    fn opinion(&self, issue_id: &str, outcome: RuleOutcome) -> AgentOpinion {
        AgentOpinion {
            agent_id: self.id.clone(),
            role: self.role,
            issue_id: issue_id.to_string(),
            stance: outcome.stance,
            confidence: outcome.confidence.clamp(0.0, 1.0),
            reasoning: outcome.reasoning,
            concerns: outcome.concerns,
            recommendations: outcome.recommendations,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
impl Deliberator for GovernanceAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> AgentRole {
        self.role
    }

    async fn deliberate(&self, issue: &DetectedIssue, context: &AgentContext) -> Result<AgentOpinion> {
        if let Some(provider) = &self.provider {
            match self.deliberate_with_provider(provider.as_ref(), issue, context).await {
                Ok(opinion) => return Ok(opinion),
                Err(e) => {
                    warn!(
                        agent_id = %self.id,
                        issue_id = %issue.id,
                        error = %e,
                        "Reasoning failed, using rule-based evaluation"
                    );
                }
            }
        }
        Ok(self.deliberate_rule_based(issue, context))
    }
}
