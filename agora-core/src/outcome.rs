//! Execution records, KPI results, outcome proofs and trust scores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of an execution or of a single action within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Partial,
}

impl ExecutionStatus {
    /// Aggregate status of a set of action statuses.
    ///
    /// Completed iff every action completed (and there is at least one),
    /// otherwise failed if any failed, partial if any partial, else in progress.
    pub fn aggregate<'a, I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = &'a ExecutionStatus>,
    {
        let statuses: Vec<_> = statuses.into_iter().copied().collect();
        if !statuses.is_empty() && statuses.iter().all(|s| *s == Self::Completed) {
            Self::Completed
        } else if statuses.contains(&Self::Failed) {
            Self::Failed
        } else if statuses.contains(&Self::Partial) {
            Self::Partial
        } else {
            Self::InProgress
        }
    }
}

/// One action performed while executing a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub target: String,
    pub data: serde_json::Value,
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionAction {
    pub fn new(
        action_type: impl Into<String>,
        target: impl Into<String>,
        status: ExecutionStatus,
    ) -> Self {
        Self {
            action_type: action_type.into(),
            target: target.into(),
            data: serde_json::Value::Object(Default::default()),
            status,
            error: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Record of a proposal's execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: String,
    pub proposal_id: String,
    /// Derived from the action statuses
    pub status: ExecutionStatus,
    pub executed_by: String,
    pub executed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub actions: Vec<ExecutionAction>,
}

/// Measurement of one KPI after execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiResult {
    pub id: String,
    pub execution_id: String,
    pub kpi_name: String,
    pub target_value: f64,
    pub actual_value: f64,
    pub unit: String,
    pub measured_at: DateTime<Utc>,
    pub success: bool,
    /// Percentage deviation from target
    pub deviation: f64,
}

/// Tamper-evident summary of an execution's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeProof {
    pub id: String,
    pub execution_id: String,
    pub proposal_id: String,
    pub kpi_results: Vec<KpiResult>,
    /// True when at least 80% of KPIs succeeded
    pub overall_success: bool,
    /// Percentage of successful KPIs
    pub success_rate: f64,
    /// Content hash of the proof payload
    pub proof_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation: Option<String>,
    pub recorded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

/// Kind of entity carrying a trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Agent,
    Proposer,
    Delegate,
}

/// Reputation of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustScore {
    pub entity_id: String,
    pub entity_type: EntityType,
    /// Score in [0, 100]
    pub score: f64,
    pub total_decisions: u64,
    pub successful_decisions: u64,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExecutionStatus::*;

    #[test]
    fn test_aggregate_status() {
        assert_eq!(ExecutionStatus::aggregate(&[Completed, Completed]), Completed);
        assert_eq!(ExecutionStatus::aggregate(&[Completed, Failed, Partial]), Failed);
        assert_eq!(ExecutionStatus::aggregate(&[Completed, Partial]), Partial);
        assert_eq!(ExecutionStatus::aggregate(&[Completed, Pending]), InProgress);
        assert_eq!(ExecutionStatus::aggregate(&[]), InProgress);
    }

    #[test]
    fn test_status_wire_name() {
        assert_eq!(serde_json::to_value(InProgress).unwrap(), "in_progress");
    }
}
