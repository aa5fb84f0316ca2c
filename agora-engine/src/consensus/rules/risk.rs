//! Risk: severity, security keywords and urgency.

use agora_core::{IssuePriority, Stance};

use super::{IssueFacts, RuleOutcome};

const SECURITY_KEYWORDS: &[&str] = &[
    "security",
    "vulnerability",
    "attack",
    "exploit",
    "breach",
    "leak",
    "network_health",
    "gas_usage",
    "protocol_tvl",
];

pub(super) fn evaluate(facts: &IssueFacts<'_>) -> RuleOutcome {
    let issue = facts.issue;
    let security = facts.mentions(SECURITY_KEYWORDS);
    let elevated = facts.elevated_signals();
    let boost = facts.boost();

    let mut outcome = if issue.priority == IssuePriority::Urgent {
        let mut o = RuleOutcome::new(Stance::StronglySupport, (0.85 + boost).min(0.95));
        o.concern("Urgent priority requires immediate attention");
        o.recommend("Implement emergency response procedures");
        o
    } else if security || facts.is_relevant() {
        let mut o = RuleOutcome::new(Stance::StronglySupport, (0.75 + boost).min(0.95));
        if facts.is_relevant() {
            o.concern(format!("{} falls within risk management domain", issue.category));
        }
        if security {
            o.concern("Potential security implications detected");
        }
        o.recommend("Conduct thorough security review");
        o.recommend("Consider temporary protective measures");
        o
    } else if elevated > 0 {
        let mut o = RuleOutcome::new(Stance::Support, (0.65 + boost).min(0.9));
        o.concern("High severity signals require attention");
        o.recommend("Monitor closely for escalation");
        o
    } else if issue.priority == IssuePriority::High {
        let mut o = RuleOutcome::new(Stance::Support, (0.6 + boost).min(0.85));
        o.concern("Elevated risk level");
        o
    } else {
        let mut o = RuleOutcome::new(Stance::Neutral, (0.5 * facts.relevance).max(0.4));
        o.concern("Standard risk profile");
        o.recommend("Continue routine monitoring");
        o
    };

    outcome.concern("All actions carry inherent implementation risk");
    outcome.recommend("Ensure proper testing before deployment");

    let mut parts = vec![format!(
        "Analyzing \"{}\" ({} issue, {} priority).",
        issue.title,
        issue.category,
        issue.priority.as_str()
    )];
    if facts.is_relevant() {
        parts.push(format!(
            "This {} issue falls within my risk assessment expertise.",
            issue.category
        ));
    }
    if security {
        parts.push("Security-related keywords detected require heightened vigilance.".to_string());
    }
    if elevated > 0 {
        parts.push(format!("{} high/critical severity signals identified.", elevated));
    }
    if issue.priority == IssuePriority::Urgent {
        parts.push("Urgent priority warrants immediate risk mitigation measures.".to_string());
    }
    if let Some(top) = issue.signals.first() {
        parts.push(format!(
            "Primary signal: {} (severity: {}).",
            if top.description.is_empty() {
                &top.category
            } else {
                &top.description
            },
            top.severity.as_str()
        ));
    }
    outcome.reasoning = parts.join(" ");
    outcome
}

#[cfg(test)]
mod tests {
    use super::super::tests::issue;
    use super::*;
    use agora_core::{AgentContext, AgentRole, NormalizedSignal, RawSignal, Severity, SignalSource};
    use std::collections::HashMap;

    fn run(issue: &agora_core::DetectedIssue) -> RuleOutcome {
        super::super::evaluate(AgentRole::Risk, issue, &AgentContext::default())
    }

    #[test]
    fn test_urgent_is_strongly_supported() {
        let outcome = run(&issue("Outage", "misc", IssuePriority::Urgent));
        assert_eq!(outcome.stance, Stance::StronglySupport);
        assert_eq!(outcome.confidence, 0.85);
    }

    #[test]
    fn test_in_domain_category_gets_boost() {
        let outcome = run(&issue("Anomaly detected", "gas_usage", IssuePriority::Low));
        assert_eq!(outcome.stance, Stance::StronglySupport);
        assert_eq!(outcome.confidence, 0.95);
        assert!(outcome.reasoning.contains("risk assessment expertise"));
    }

    #[test]
    fn test_elevated_signals_support() {
        let raw = RawSignal::new(SignalSource::Telemetry, "x", HashMap::new());
        let signal = NormalizedSignal::from_raw(&raw, "misc", Severity::Critical, 1.0, "u", "spike");
        let mut quiet = issue("Spike", "misc", IssuePriority::Medium);
        quiet.signals.push(signal);

        let outcome = run(&quiet);
        assert_eq!(outcome.stance, Stance::Support);
        assert_eq!(outcome.confidence, 0.65);
        assert!(outcome.reasoning.contains("Primary signal: spike (severity: critical)."));
    }

    #[test]
    fn test_routine_issue_is_neutral() {
        let outcome = run(&issue("Minor drift", "misc", IssuePriority::Low));
        assert_eq!(outcome.stance, Stance::Neutral);
        assert_eq!(outcome.confidence, 0.4);
        assert_eq!(
            outcome.concerns.last().map(String::as_str),
            Some("All actions carry inherent implementation risk")
        );
    }
}
