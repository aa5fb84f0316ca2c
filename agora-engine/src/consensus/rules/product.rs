//! Product: technical feasibility and delivery load.

use agora_core::{AgentContext, IssuePriority, Stance};

use super::{IssueFacts, RuleOutcome};

const TECHNICAL_KEYWORDS: &[&str] = &[
    "bug",
    "error",
    "performance",
    "latency",
    "crash",
    "failure",
    "system",
    "infrastructure",
];

const FEATURE_KEYWORDS: &[&str] = &["feature", "implement", "develop", "build", "create", "add"];

const COMPLEXITY_KEYWORDS: &[&str] = &["complex", "architecture", "refactor", "migration", "overhaul"];

/// Active proposals beyond which delivery capacity is a concern.
const BUSY_PROPOSALS: u32 = 5;

pub(super) fn evaluate(facts: &IssueFacts<'_>, context: &AgentContext) -> RuleOutcome {
    let issue = facts.issue;
    let technical = facts.mentions(TECHNICAL_KEYWORDS);
    let feature = facts.mentions(FEATURE_KEYWORDS);
    let complex = facts.mentions(COMPLEXITY_KEYWORDS);
    let active = context.active_proposals.unwrap_or(0);

    let mut outcome = if technical && issue.priority == IssuePriority::Urgent {
        let mut o = RuleOutcome::new(Stance::StronglySupport, 0.85);
        o.concern("Technical issue requires immediate resolution");
        o.recommend("Prioritize bug fix or system stabilization");
        o.recommend("Consider temporary mitigation while fixing root cause");
        o
    } else if technical {
        let mut o = RuleOutcome::new(Stance::Support, 0.7);
        o.concern("Technical issue affects system reliability");
        o.recommend("Schedule appropriate technical resolution");
        o
    } else if complex {
        let mut o = RuleOutcome::new(Stance::Neutral, 0.55);
        o.concern("High complexity may require significant resources");
        o.concern("Technical debt implications should be evaluated");
        o.recommend("Break down into smaller, manageable phases");
        o.recommend("Conduct technical design review");
        o
    } else if feature {
        let mut o = RuleOutcome::new(Stance::Support, 0.6);
        o.concern("Feature development requires resource allocation");
        o.recommend("Evaluate against current roadmap priorities");
        o
    } else {
        let mut o = RuleOutcome::new(Stance::Neutral, 0.4);
        o.concern("Technical implications unclear");
        o.recommend("Conduct technical impact assessment");
        o
    };

    // Half the boost other roles apply
    if facts.is_relevant() {
        outcome.confidence = (outcome.confidence + 0.1).min(0.95);
        outcome.concern(format!("{} touches product infrastructure", issue.category));
    }

    if active > BUSY_PROPOSALS {
        outcome.concern(format!("{} active proposals may strain resources", active));
        outcome.recommend("Consider prioritization of concurrent initiatives");
    }
    outcome.recommend("Ensure adequate testing before deployment");

    let mut parts = vec![format!(
        "Technical feasibility assessment of \"{}\" ({}, {} priority) based on implementation complexity and system impact.",
        issue.title,
        issue.category,
        issue.priority.as_str()
    )];
    if technical {
        parts.push("Reliability or performance problems detected.".to_string());
    }
    if complex {
        parts.push("Implementation carries architectural complexity.".to_string());
    }
    if active > BUSY_PROPOSALS {
        parts.push(format!("{} proposals are already in flight.", active));
    }
    outcome.reasoning = parts.join(" ");
    outcome
}

#[cfg(test)]
mod tests {
    use super::super::tests::issue;
    use super::*;
    use agora_core::AgentRole;

    fn run(issue: &agora_core::DetectedIssue, active: Option<u32>) -> RuleOutcome {
        let context = AgentContext {
            active_proposals: active,
            ..Default::default()
        };
        super::super::evaluate(AgentRole::Product, issue, &context)
    }

    #[test]
    fn test_urgent_technical_issue() {
        let outcome = run(&issue("Validator crash loop", "misc", IssuePriority::Urgent), None);
        assert_eq!(outcome.stance, Stance::StronglySupport);
        assert_eq!(outcome.confidence, 0.85);
    }

    #[test]
    fn test_complexity_is_neutral() {
        let outcome = run(&issue("Storage refactor", "misc", IssuePriority::Medium), Some(8));
        assert_eq!(outcome.stance, Stance::Neutral);
        assert_eq!(outcome.confidence, 0.55);
        assert!(outcome.concerns.contains(&"8 active proposals may strain resources".to_string()));
    }

    #[test]
    fn test_in_domain_boost() {
        let outcome = run(&issue("Latency regression", "telemetry_latency", IssuePriority::Medium), None);
        assert_eq!(outcome.stance, Stance::Support);
        assert!((outcome.confidence - 0.8).abs() < 1e-9);
    }
}
