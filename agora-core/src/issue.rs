//! Detected issues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OracleError, Result};
use crate::signal::NormalizedSignal;

/// Priority of a detected issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssuePriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl IssuePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

/// Lifecycle position of an issue in the pipeline.
///
/// Variants are declared in pipeline order; status only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    Detected,
    Analyzing,
    Deliberating,
    Voting,
    Executed,
    Closed,
}

/// Whether an issue needs action or is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    #[default]
    Issue,
    Insight,
}

/// Direction of a fitted trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Stable => "stable",
        }
    }
}

/// A piece of evidence backing an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Evidence type (threshold_breach, statistical_anomaly, trend, ...)
    #[serde(rename = "type")]
    pub evidence_type: String,
    pub description: String,
    /// Structured supporting data
    pub data: serde_json::Value,
}

impl Evidence {
    pub fn new(
        evidence_type: impl Into<String>,
        description: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            evidence_type: evidence_type.into(),
            description: description.into(),
            data,
        }
    }
}

/// An evidence-backed condition requiring governance attention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedIssue {
    /// Unique issue ID
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: IssuePriority,
    pub status: IssueStatus,
    #[serde(default)]
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_direction: Option<TrendDirection>,
    pub detected_at: DateTime<Utc>,
    /// Triggering signals, copied at detection time
    pub signals: Vec<NormalizedSignal>,
    pub evidence: Vec<Evidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_actions: Option<Vec<String>>,
}

impl DetectedIssue {
    /// Create a freshly detected issue.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        priority: IssuePriority,
        signals: Vec<NormalizedSignal>,
        evidence: Vec<Evidence>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            category: category.into(),
            priority,
            status: IssueStatus::Detected,
            kind: IssueKind::Issue,
            trend_direction: None,
            detected_at: Utc::now(),
            signals,
            evidence,
            suggested_actions: None,
        }
    }

    /// Set the issue kind.
    pub fn with_kind(mut self, kind: IssueKind) -> Self {
        self.kind = kind;
        self
    }

    /// Record the fitted trend direction.
    pub fn with_trend(mut self, direction: TrendDirection) -> Self {
        self.trend_direction = Some(direction);
        self
    }

    /// Attach suggested actions.
    pub fn with_suggested_actions(mut self, actions: Vec<String>) -> Self {
        self.suggested_actions = Some(actions);
        self
    }

    /// Move the issue forward in the pipeline.
    ///
    /// Staying in place or moving backwards is a state error.
    pub fn advance_status(&mut self, next: IssueStatus) -> Result<()> {
        if next <= self.status {
            return Err(OracleError::StateError(format!(
                "issue {} cannot move from {:?} to {:?}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Title and description, lowercased, for keyword matching.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue() -> DetectedIssue {
        DetectedIssue::new("t", "d", "treasury_balance", IssuePriority::High, vec![], vec![])
    }

    #[test]
    fn test_status_only_moves_forward() {
        let mut issue = issue();
        issue.advance_status(IssueStatus::Deliberating).unwrap();
        assert_eq!(issue.status, IssueStatus::Deliberating);

        let err = issue.advance_status(IssueStatus::Analyzing).unwrap_err();
        assert!(matches!(err, OracleError::StateError(_)));
        assert!(issue.advance_status(IssueStatus::Deliberating).is_err());
        assert_eq!(issue.status, IssueStatus::Deliberating);
    }

    #[test]
    fn test_evidence_type_field() {
        let evidence = Evidence::new("threshold_breach", "x", serde_json::json!({"v": 1}));
        let json = serde_json::to_value(&evidence).unwrap();
        assert_eq!(json["type"], "threshold_breach");

        let json = serde_json::to_value(issue()).unwrap();
        assert_eq!(json["priority"], "high");
        assert_eq!(json["kind"], "issue");
        assert!(json.get("detectedAt").is_some());
    }
}
