//! Deterministic rule-based evaluators, one per deliberating role.
//!
//! Each evaluator is a pure function of the issue text, its category
//! relevance, its priority and the numeric context fields.

mod community;
mod product;
mod risk;
mod treasury;

use agora_core::{AgentContext, AgentRole, DetectedIssue, Stance};

/// Stance and supporting detail produced by an evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub stance: Stance,
    pub confidence: f64,
    pub reasoning: String,
    pub concerns: Vec<String>,
    pub recommendations: Vec<String>,
}

impl RuleOutcome {
    fn new(stance: Stance, confidence: f64) -> Self {
        Self {
            stance,
            confidence,
            reasoning: String::new(),
            concerns: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    fn concern(&mut self, concern: impl Into<String>) {
        self.concerns.push(concern.into());
    }

    fn recommend(&mut self, recommendation: impl Into<String>) {
        self.recommendations.push(recommendation.into());
    }
}

/// Facts about an issue shared by every evaluator.
pub(crate) struct IssueFacts<'a> {
    pub issue: &'a DetectedIssue,
    /// Lowercased title and description
    pub text: String,
    pub relevance: f64,
}

impl<'a> IssueFacts<'a> {
    pub fn new(issue: &'a DetectedIssue, relevance: f64) -> Self {
        Self {
            issue,
            text: issue.text(),
            relevance,
        }
    }

    /// Whether the issue text mentions any keyword.
    pub fn mentions(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.text.contains(k))
    }

    /// Category sits squarely in the role's domain.
    pub fn is_relevant(&self) -> bool {
        self.relevance >= 1.0
    }

    /// Confidence boost for in-domain issues.
    pub fn boost(&self) -> f64 {
        if self.is_relevant() {
            0.2
        } else {
            0.0
        }
    }

    /// Signals with high or critical severity.
    pub fn elevated_signals(&self) -> usize {
        self.issue
            .signals
            .iter()
            .filter(|s| s.severity.is_elevated())
            .count()
    }

    /// Signals whose category contains any of the fragments.
    pub fn signals_in(&self, fragments: &[&str]) -> usize {
        self.issue
            .signals
            .iter()
            .filter(|s| fragments.iter().any(|f| s.category.contains(f)))
            .count()
    }
}

/// Categories each role considers its own domain.
pub fn domain_categories(role: AgentRole) -> &'static [&'static str] {
    match role {
        AgentRole::Risk => &["network_health", "gas_usage", "protocol_tvl", "security"],
        AgentRole::Treasury => &["treasury_balance", "token_price", "protocol_tvl"],
        AgentRole::Community => &[
            "governance_participation",
            "community_sentiment",
            "vote_turnout",
            "delegation_changes",
        ],
        AgentRole::Product => &["proposal_activity", "network_health", "telemetry"],
        AgentRole::Moderator => &[],
    }
}

/// Relevance of a category to a role: 1.0 on a substring match with a domain
/// category, 0.5 when they share a token, 0.3 otherwise.
pub fn category_relevance(role: AgentRole, category: &str) -> f64 {
    let category = category.to_lowercase();
    let domain = domain_categories(role);
    if domain.iter().any(|d| category.contains(d)) {
        return 1.0;
    }
    let tokens: Vec<&str> = category.split('_').filter(|t| !t.is_empty()).collect();
    let overlaps = domain
        .iter()
        .flat_map(|d| d.split('_'))
        .any(|t| tokens.contains(&t));
    if overlaps {
        0.5
    } else {
        0.3
    }
}

/// Run the evaluator for a role.
pub fn evaluate(role: AgentRole, issue: &DetectedIssue, context: &AgentContext) -> RuleOutcome {
    let facts = IssueFacts::new(issue, category_relevance(role, &issue.category));
    match role {
        AgentRole::Risk => risk::evaluate(&facts),
        AgentRole::Treasury => treasury::evaluate(&facts, context),
        AgentRole::Community => community::evaluate(&facts, context),
        AgentRole::Product => product::evaluate(&facts, context),
        AgentRole::Moderator => {
            let mut outcome = RuleOutcome::new(Stance::Neutral, 0.0);
            outcome.reasoning = "The moderator synthesizes and holds no opinion.".to_string();
            outcome
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::IssuePriority;

    pub(super) fn issue(title: &str, category: &str, priority: IssuePriority) -> DetectedIssue {
        DetectedIssue::new(title, "", category, priority, vec![], vec![])
    }

    #[test]
    fn test_category_relevance() {
        assert_eq!(category_relevance(AgentRole::Treasury, "treasury_balance"), 1.0);
        assert_eq!(category_relevance(AgentRole::Product, "telemetry_latency"), 1.0);
        assert_eq!(category_relevance(AgentRole::Treasury, "token_supply"), 0.5);
        assert_eq!(category_relevance(AgentRole::Community, "gas_usage"), 0.3);
    }

    #[test]
    fn test_evaluators_are_deterministic() {
        let issue = issue("Budget overrun", "treasury_balance", IssuePriority::High);
        let context = AgentContext {
            treasury_balance: Some(40_000.0),
            ..Default::default()
        };
        for role in AgentRole::DELIBERATING {
            assert_eq!(evaluate(role, &issue, &context), evaluate(role, &issue, &context));
        }
    }

    #[test]
    fn test_confidence_stays_in_range() {
        let priorities = [
            IssuePriority::Low,
            IssuePriority::Medium,
            IssuePriority::High,
            IssuePriority::Urgent,
        ];
        for role in AgentRole::DELIBERATING {
            for priority in priorities {
                for category in ["treasury_balance", "vote_turnout", "gas_usage", "misc"] {
                    let outcome = evaluate(
                        role,
                        &issue("Security exploit causing downtime", category, priority),
                        &AgentContext::default(),
                    );
                    assert!((0.0..=1.0).contains(&outcome.confidence));
                    assert!(!outcome.reasoning.is_empty());
                }
            }
        }
    }
}
