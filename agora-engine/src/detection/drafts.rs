//! Human-readable proposal drafts rendered from detected issues.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use agora_core::{DetectedIssue, IssuePriority};

/// A template-rendered proposal draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalDraft {
    pub id: String,
    pub issue_id: String,
    pub title: String,
    pub summary: String,
    /// Markdown background section
    pub background: String,
    pub proposed_action: String,
    pub expected_outcome: String,
    pub risks: Vec<String>,
    pub alternatives: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Renders drafts from fixed templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalDraftGenerator;

impl ProposalDraftGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, issue: &DetectedIssue) -> ProposalDraft {
        ProposalDraft {
            id: uuid::Uuid::new_v4().to_string(),
            issue_id: issue.id.clone(),
            title: Self::title(issue),
            summary: format!(
                "This proposal addresses an issue detected in the {} category. {}",
                issue.category, issue.description
            ),
            background: Self::background(issue),
            proposed_action: Self::proposed_action(issue),
            expected_outcome: format!(
                "Resolution of the {} issue should result in:\n\
                 - Normalization of affected metrics\n\
                 - Prevention of similar issues in the future\n\
                 - Improved system stability",
                issue.category
            ),
            risks: Self::risks(issue),
            alternatives: Self::alternatives(issue),
            created_at: Utc::now(),
        }
    }

    pub fn generate_batch(&self, issues: &[DetectedIssue]) -> Vec<ProposalDraft> {
        issues.iter().map(|issue| self.generate(issue)).collect()
    }

    fn title(issue: &DetectedIssue) -> String {
        match issue.priority {
            IssuePriority::Urgent => format!("[URGENT] {}", issue.title),
            IssuePriority::High => format!("[HIGH] {}", issue.title),
            _ => issue.title.clone(),
        }
    }

    fn background(issue: &DetectedIssue) -> String {
        let evidence: Vec<String> = issue
            .evidence
            .iter()
            .take(3)
            .map(|e| format!("- {}", e.description))
            .collect();
        format!(
            "## Background\n\n\
             **Issue detected at:** {}\n\
             **Category:** {}\n\
             **Priority:** {}\n\
             **Signals analyzed:** {}\n\n\
             ### Evidence\n{}",
            issue.detected_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            issue.category,
            issue.priority.as_str(),
            issue.signals.len(),
            evidence.join("\n")
        )
    }

    fn proposed_action(issue: &DetectedIssue) -> String {
        if let Some(first) = issue.suggested_actions.as_ref().and_then(|a| a.first()) {
            return first.clone();
        }
        match issue.priority {
            IssuePriority::Urgent => "Immediately investigate and implement emergency measures",
            IssuePriority::High => "Prioritize investigation and prepare action plan",
            IssuePriority::Medium => "Schedule investigation and monitoring",
            IssuePriority::Low => "Add to backlog for future review",
        }
        .to_string()
    }

    fn risks(issue: &DetectedIssue) -> Vec<String> {
        let mut risks = Vec::new();
        if issue.priority >= IssuePriority::High {
            risks.push("Delayed action may lead to escalation".to_string());
        }
        risks.push("Proposed action may have unintended consequences".to_string());
        risks.push("Root cause may not be fully understood".to_string());
        risks
    }

    fn alternatives(issue: &DetectedIssue) -> Vec<String> {
        let mut alternatives: Vec<String> = issue
            .suggested_actions
            .as_ref()
            .map(|actions| actions.iter().skip(1).cloned().collect())
            .unwrap_or_default();
        alternatives.push("No action - continue monitoring".to_string());
        alternatives.push("Defer decision pending more information".to_string());
        alternatives
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::Evidence;
    use serde_json::json;

    fn issue(priority: IssuePriority) -> DetectedIssue {
        DetectedIssue::new(
            "Anomaly detected in gas_usage",
            "Gas spiked.",
            "gas_usage",
            priority,
            vec![],
            (0..5)
                .map(|i| Evidence::new("anomaly", format!("evidence {}", i), json!({})))
                .collect(),
        )
    }

    #[test]
    fn test_urgent_draft() {
        let draft = ProposalDraftGenerator::new().generate(&issue(IssuePriority::Urgent));
        assert_eq!(draft.title, "[URGENT] Anomaly detected in gas_usage");
        assert_eq!(
            draft.proposed_action,
            "Immediately investigate and implement emergency measures"
        );
        assert_eq!(draft.risks.len(), 3);
        assert!(draft.background.contains("- evidence 2"));
        assert!(!draft.background.contains("- evidence 3"));
        assert!(draft.summary.starts_with("This proposal addresses an issue detected in the gas_usage category."));
    }

    #[test]
    fn test_suggested_actions_drive_action_and_alternatives() {
        let issue = issue(IssuePriority::Low)
            .with_suggested_actions(vec!["Raise gas limit".into(), "Batch transactions".into()]);
        let draft = ProposalDraftGenerator::new().generate(&issue);
        assert_eq!(draft.title, "Anomaly detected in gas_usage");
        assert_eq!(draft.proposed_action, "Raise gas limit");
        assert_eq!(draft.alternatives[0], "Batch transactions");
        assert_eq!(draft.alternatives.len(), 3);
        assert_eq!(draft.risks.len(), 2);
    }
}
