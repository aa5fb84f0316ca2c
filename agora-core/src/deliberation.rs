//! Agent opinions and decision packets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::issue::DetectedIssue;

/// Governance role of a deliberating agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Risk,
    Treasury,
    Community,
    Product,
    /// Synthesis only, never holds an opinion
    Moderator,
}

impl AgentRole {
    /// Roles that hold opinions.
    pub const DELIBERATING: [AgentRole; 4] = [
        AgentRole::Risk,
        AgentRole::Treasury,
        AgentRole::Community,
        AgentRole::Product,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Risk => "risk",
            Self::Treasury => "treasury",
            Self::Community => "community",
            Self::Product => "product",
            Self::Moderator => "moderator",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position on the five-point stance scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    StronglySupport,
    Support,
    Neutral,
    Oppose,
    StronglyOppose,
}

impl Stance {
    /// All stances, most supportive first.
    pub const ALL: [Stance; 5] = [
        Stance::StronglySupport,
        Stance::Support,
        Stance::Neutral,
        Stance::Oppose,
        Stance::StronglyOppose,
    ];

    /// Position on the scale, from +2 (strongly support) to -2 (strongly oppose).
    pub fn score(&self) -> i8 {
        match self {
            Self::StronglySupport => 2,
            Self::Support => 1,
            Self::Neutral => 0,
            Self::Oppose => -1,
            Self::StronglyOppose => -2,
        }
    }

    /// Number of scale steps between two stances.
    pub fn distance(&self, other: Stance) -> u8 {
        (self.score() - other.score()).unsigned_abs()
    }

    /// Parse the snake_case wire name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "strongly_support" => Some(Self::StronglySupport),
            "support" => Some(Self::Support),
            "neutral" => Some(Self::Neutral),
            "oppose" => Some(Self::Oppose),
            "strongly_oppose" => Some(Self::StronglyOppose),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StronglySupport => "strongly_support",
            Self::Support => "support",
            Self::Neutral => "neutral",
            Self::Oppose => "oppose",
            Self::StronglyOppose => "strongly_oppose",
        }
    }
}

/// Kind of proposal a decision packet recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalType {
    /// High agreement: direct action
    Action,
    /// Low agreement: more research needed
    Investigation,
}

/// One agent's opinion on one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOpinion {
    pub agent_id: String,
    pub role: AgentRole,
    pub issue_id: String,
    pub stance: Stance,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub reasoning: String,
    pub concerns: Vec<String>,
    pub recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Context handed to agents alongside an issue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentContext {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub historical_decisions: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treasury_balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_proposals: Option<u32>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub community_metrics: HashMap<String, f64>,
}

/// Recommended course of action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub action: String,
    pub rationale: String,
    pub expected_outcome: String,
}

/// An alternative course of action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub action: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
}

/// Qualitative low/medium/high rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

/// A declared risk of the recommended action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub description: String,
    pub likelihood: Level,
    pub impact: Level,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
}

/// Which side of the target counts as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KpiDirection {
    /// Success when actual <= target
    #[default]
    AtMost,
    /// Success when actual >= target
    AtLeast,
}

impl KpiDirection {
    pub fn is_met(&self, actual: f64, target: f64) -> bool {
        match self {
            Self::AtMost => actual <= target,
            Self::AtLeast => actual >= target,
        }
    }
}

/// A declared success criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpi {
    pub name: String,
    pub target: f64,
    pub unit: String,
    pub measurement_method: String,
    #[serde(default)]
    pub direction: KpiDirection,
}

impl Kpi {
    pub fn new(
        name: impl Into<String>,
        target: f64,
        unit: impl Into<String>,
        measurement_method: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target,
            unit: unit.into(),
            measurement_method: measurement_method.into(),
            direction: KpiDirection::AtMost,
        }
    }

    pub fn at_least(mut self) -> Self {
        self.direction = KpiDirection::AtLeast;
        self
    }
}

/// An agent whose stance diverged from the majority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dissent {
    pub agent_role: AgentRole,
    pub reason: String,
}

/// Structured output of deliberation on one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPacket {
    pub id: String,
    pub issue_id: String,
    /// Snapshot of the issue at deliberation time
    pub issue: DetectedIssue,
    /// Agreement level in [0, 1], a pure function of `agent_opinions`
    pub consensus_score: f64,
    pub recommended_proposal_type: ProposalType,
    pub recommendation: Recommendation,
    pub alternatives: Vec<Alternative>,
    pub risks: Vec<Risk>,
    pub kpis: Vec<Kpi>,
    pub agent_opinions: Vec<AgentOpinion>,
    pub dissent: Vec<Dissent>,
    pub created_at: DateTime<Utc>,
}
