//! Proposals, votes, tallies and delegation policies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deliberation::DecisionPacket;

/// Lifecycle of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Active,
    Passed,
    Rejected,
    Executed,
    Cancelled,
}

impl ProposalStatus {
    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Executed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Passed => "passed",
            Self::Rejected => "rejected",
            Self::Executed => "executed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Ballot choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    For,
    Against,
    Abstain,
}

/// A decision packet submitted for a weighted vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onchain_id: Option<u64>,
    pub decision_packet: DecisionPacket,
    pub proposer: String,
    pub status: ProposalStatus,
    pub voting_starts_at: DateTime<Utc>,
    pub voting_ends_at: DateTime<Utc>,
    /// Minimum number of distinct voters
    pub quorum: u32,
    /// Percentage of for-votes among for+against required to pass (0-100)
    pub threshold: u32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
}

/// A weighted ballot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: String,
    pub proposal_id: String,
    pub voter: String,
    pub choice: VoteChoice,
    #[serde(with = "weight_string")]
    pub weight: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

/// Tally derived from the vote log of one proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteTally {
    pub proposal_id: String,
    #[serde(with = "weight_string")]
    pub for_votes: u128,
    #[serde(with = "weight_string")]
    pub against_votes: u128,
    #[serde(with = "weight_string")]
    pub abstain_votes: u128,
    #[serde(with = "weight_string")]
    pub total_votes: u128,
    /// Number of distinct voters
    pub voter_count: u32,
    /// Distinct voters divided by quorum
    pub participation_rate: f64,
    pub quorum_reached: bool,
    pub passed: bool,
}

/// Comparison operator of a delegation condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    Contains,
}

/// One condition of a delegation policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationCondition {
    /// Dot path into the serialized proposal, e.g. `decisionPacket.issue.priority`
    pub field: String,
    pub operator: ConditionOperator,
    /// Comparison operand; `None` stands for an absent value
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

impl DelegationCondition {
    pub fn new(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: Some(value.into()),
        }
    }

    /// Condition satisfied only when the field is absent.
    pub fn absent(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: ConditionOperator::Eq,
            value: None,
        }
    }
}

/// Conditional vote delegation from one address to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationPolicy {
    pub id: String,
    pub delegator: String,
    pub delegate: String,
    pub conditions: Vec<DelegationCondition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Revocation clears this flag; policies are never deleted
    pub active: bool,
    pub created_at: DateTime<Utc>,
    /// Registration order across all policies
    pub sequence: u64,
}

/// Vote weights travel as decimal strings so JSON consumers never round them.
mod weight_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(u64),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.parse().map_err(de::Error::custom),
            Repr::Number(n) => Ok(n as u128),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_serializes_as_string() {
        let vote = Vote {
            id: "v".into(),
            proposal_id: "p".into(),
            voter: "0xabc".into(),
            choice: VoteChoice::For,
            weight: u128::MAX,
            reason: None,
            timestamp: Utc::now(),
            tx_hash: None,
        };
        let json = serde_json::to_value(&vote).unwrap();
        assert_eq!(json["weight"], u128::MAX.to_string());

        let back: Vote = serde_json::from_value(json).unwrap();
        assert_eq!(back.weight, u128::MAX);
    }

    #[test]
    fn test_weight_accepts_plain_numbers() {
        let json = serde_json::json!({
            "id": "v",
            "proposalId": "p",
            "voter": "0xabc",
            "choice": "abstain",
            "weight": 40,
            "timestamp": "2024-01-01T00:00:00Z"
        });
        let vote: Vote = serde_json::from_value(json).unwrap();
        assert_eq!(vote.weight, 40);
        assert_eq!(vote.choice, VoteChoice::Abstain);
    }

    #[test]
    fn test_condition_without_value_is_absent() {
        let condition: DelegationCondition = serde_json::from_value(serde_json::json!({
            "field": "onchainId",
            "operator": "eq"
        }))
        .unwrap();
        assert_eq!(condition, DelegationCondition::absent("onchainId"));
    }
}
