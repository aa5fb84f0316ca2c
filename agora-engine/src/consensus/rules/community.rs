//! Community: stakeholder impact, positive or negative.

use agora_core::{AgentContext, IssuePriority, Stance};

use super::{IssueFacts, RuleOutcome};

const COMMUNITY_KEYWORDS: &[&str] = &[
    "community",
    "user",
    "member",
    "stakeholder",
    "participation",
    "engagement",
    "vote_turnout",
    "governance_participation",
    "community_sentiment",
    "delegation",
];

const NEGATIVE_KEYWORDS: &[&str] = &[
    "disruption",
    "downtime",
    "breaking",
    "removal",
    "deprecat",
    "decreasing",
];

const POSITIVE_KEYWORDS: &[&str] = &[
    "improvement",
    "enhance",
    "better",
    "access",
    "benefit",
    "feature",
    "increasing",
];

/// Community metric holding the active user count.
const ACTIVE_USERS: &str = "activeUsers";

pub(super) fn evaluate(facts: &IssueFacts<'_>, context: &AgentContext) -> RuleOutcome {
    let issue = facts.issue;
    let community = facts.mentions(COMMUNITY_KEYWORDS);
    let negative = facts.mentions(NEGATIVE_KEYWORDS);
    let positive = facts.mentions(POSITIVE_KEYWORDS);
    let boost = facts.boost();
    let active_users = context
        .community_metrics
        .get(ACTIVE_USERS)
        .copied()
        .filter(|n| *n > 0.0);

    let mut outcome = if negative && !facts.is_relevant() {
        let mut o = RuleOutcome::new(Stance::Oppose, (0.55 + boost).min(0.85));
        o.concern("Potential negative impact on community members");
        o.recommend("Plan migration path for affected users");
        o.recommend("Provide clear communication to community");
        o
    } else if facts.is_relevant() {
        let mut o = RuleOutcome::new(Stance::StronglySupport, (0.75 + boost).min(0.95));
        o.concern(format!(
            "{} is directly relevant to community engagement",
            issue.category
        ));
        if negative {
            o.concern("Decreasing trend requires community attention");
            o.recommend("Investigate root causes of community decline");
        }
        if positive {
            o.concern("Positive trend indicates healthy community engagement");
            o.recommend("Document factors contributing to growth");
        }
        o.recommend("Engage community stakeholders for input");
        o
    } else if positive {
        let mut o = RuleOutcome::new(Stance::Support, (0.65 + boost).min(0.85));
        o.concern("Ensure benefits are accessible to all members");
        o.recommend("Gather community feedback before implementation");
        o
    } else if community {
        let mut o = RuleOutcome::new(Stance::Support, (0.55 + boost).min(0.8));
        o.concern("Direct community impact requires careful handling");
        o.recommend("Consider community engagement process");
        o
    } else if issue.priority == IssuePriority::Urgent {
        let mut o = RuleOutcome::new(Stance::Support, (0.5 + boost).min(0.75));
        o.concern("Urgent issues may affect community trust");
        o.recommend("Communicate transparently about the situation");
        o
    } else {
        let mut o = RuleOutcome::new(Stance::Neutral, (0.4 * facts.relevance).max(0.35));
        o.concern("Indirect community impact unclear");
        o
    };

    if let Some(users) = active_users {
        outcome.recommend(format!("Consider impact on {} active users", users));
    }
    outcome.recommend("Document community impact assessment");

    let mut parts = vec![format!(
        "Community impact analysis of \"{}\" ({}, {} priority).",
        issue.title,
        issue.category,
        issue.priority.as_str()
    )];
    if facts.is_relevant() {
        parts.push(format!(
            "This {} issue is directly relevant to community engagement and governance participation.",
            issue.category
        ));
    }
    if negative {
        parts.push(
            "Potential disruption or breaking changes detected that may affect users.".to_string(),
        );
    }
    if positive {
        parts.push(
            "Positive improvements or benefits for community members identified.".to_string(),
        );
    }
    if community {
        parts.push("Direct community engagement implications present.".to_string());
    }
    if let Some(users) = active_users {
        parts.push(format!(
            "Potential impact on {} active community members.",
            users
        ));
    }
    let social = facts.signals_in(&["community", "social", "engagement"]);
    if social > 0 {
        parts.push(format!("{} community/social signals tracked.", social));
    }
    outcome.reasoning = parts.join(" ");
    outcome
}

#[cfg(test)]
mod tests {
    use super::super::tests::issue;
    use super::*;
    use agora_core::AgentRole;
    use std::collections::HashMap;

    fn run(issue: &agora_core::DetectedIssue, context: &AgentContext) -> RuleOutcome {
        super::super::evaluate(AgentRole::Community, issue, context)
    }

    #[test]
    fn test_out_of_domain_disruption_is_opposed() {
        let outcome = run(
            &issue("Planned downtime for node upgrade", "network_health", IssuePriority::High),
            &AgentContext::default(),
        );
        assert_eq!(outcome.stance, Stance::Oppose);
        assert_eq!(outcome.confidence, 0.55);
    }

    #[test]
    fn test_in_domain_decline() {
        let outcome = run(
            &issue("Decreasing trend in vote_turnout", "vote_turnout", IssuePriority::Medium),
            &AgentContext::default(),
        );
        assert_eq!(outcome.stance, Stance::StronglySupport);
        assert_eq!(outcome.confidence, 0.95);
        assert!(outcome
            .recommendations
            .iter()
            .any(|r| r == "Investigate root causes of community decline"));
    }

    #[test]
    fn test_active_users_in_context() {
        let context = AgentContext {
            community_metrics: HashMap::from([(ACTIVE_USERS.to_string(), 1200.0)]),
            ..Default::default()
        };
        let outcome = run(&issue("Gas spike", "gas_usage", IssuePriority::Low), &context);
        assert_eq!(outcome.stance, Stance::Neutral);
        assert!(outcome
            .recommendations
            .contains(&"Consider impact on 1200 active users".to_string()));
        assert!(outcome.reasoning.contains("1200 active community members"));
    }
}
