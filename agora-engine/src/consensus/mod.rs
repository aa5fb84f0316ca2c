//! Agentic consensus.
//!
//! ```text
//!                    ┌──► risk ──────┐
//!  DetectedIssue ──► │──► treasury ──│──► Synthesizer ──► DecisionPacket
//!  + AgentContext    │──► community ─│    (score, majority,
//!                    └──► product ───┘     dissent, templates)
//! ```

mod agent;
mod moderator;
pub mod rules;
mod synthesis;

pub use agent::{GovernanceAgent, DEFAULT_AGENT_TIMEOUT_MS};
pub use moderator::{DeliberationOutcome, Moderator};
pub use synthesis::{average_score, consensus_score, find_dissent, majority_stance, Synthesizer};

use async_trait::async_trait;

use agora_core::{AgentContext, AgentOpinion, AgentRole, DetectedIssue, Result};

/// A participant the moderator can consult.
#[async_trait]
pub trait Deliberator: Send + Sync {
    /// Stable agent id.
    fn id(&self) -> &str;

    /// Governance role the agent speaks for.
    fn role(&self) -> AgentRole;

    /// Form an opinion on one issue.
    ///
    /// An error means the agent contributes nothing this round.
    async fn deliberate(&self, issue: &DetectedIssue, context: &AgentContext) -> Result<AgentOpinion>;
}
