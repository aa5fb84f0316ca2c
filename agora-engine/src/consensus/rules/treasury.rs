//! Treasury: financial exposure weighed against the current balance.

use agora_core::{AgentContext, IssuePriority, Stance};

use super::{IssueFacts, RuleOutcome};

const FINANCIAL_KEYWORDS: &[&str] = &[
    "budget",
    "cost",
    "expense",
    "fund",
    "allocation",
    "treasury",
    "payment",
    "spending",
    "token_price",
    "protocol_tvl",
];

const REVENUE_KEYWORDS: &[&str] = &["revenue", "income", "profit", "return", "yield", "growth"];

/// Balance below which cost-effective solutions are recommended.
const LOW_BALANCE: f64 = 100_000.0;
const CONSERVATIVE_BALANCE: f64 = 50_000.0;
const HEALTHY_BALANCE: f64 = 500_000.0;

pub(super) fn evaluate(facts: &IssueFacts<'_>, context: &AgentContext) -> RuleOutcome {
    let issue = facts.issue;
    let financial = facts.mentions(FINANCIAL_KEYWORDS);
    let revenue = facts.mentions(REVENUE_KEYWORDS);
    let balance = context.treasury_balance;
    let boost = facts.boost();
    let in_domain = financial || facts.is_relevant();

    let mut outcome = if issue.priority >= IssuePriority::High {
        if in_domain {
            let mut o = RuleOutcome::new(Stance::Support, (0.7 + boost).min(0.95));
            o.concern("Urgent financial matter requires attention");
            if facts.is_relevant() {
                o.concern(format!(
                    "{} is directly relevant to treasury management",
                    issue.category
                ));
            }
            if balance.is_some_and(|b| b < LOW_BALANCE) {
                o.concern("Treasury balance is relatively low");
                o.recommend("Consider cost-effective solutions");
            }
            o
        } else {
            let mut o = RuleOutcome::new(Stance::Support, (0.55 + boost).min(0.8));
            o.concern("Priority issue may have indirect financial implications");
            o
        }
    } else if in_domain {
        let mut o = RuleOutcome::new(Stance::Support, (0.6 + boost).min(0.9));
        if facts.is_relevant() {
            o.concern(format!("{} falls within treasury domain", issue.category));
        }
        o.concern("Direct financial implications require careful review");
        o.recommend("Conduct cost-benefit analysis");
        o
    } else if revenue {
        let mut o = RuleOutcome::new(Stance::Support, (0.65 + boost).min(0.85));
        o.concern("Potential revenue/growth opportunity");
        o.recommend("Evaluate expected ROI");
        o
    } else {
        let mut o = RuleOutcome::new(Stance::Neutral, (0.4 * facts.relevance).max(0.35));
        o.concern("Limited direct financial impact");
        o
    };

    outcome.recommend("Document any resource requirements");
    if let Some(balance) = balance {
        outcome.recommend(format!("Current treasury balance: {}", balance));
    }

    let mut parts = vec![format!(
        "Treasury analysis of \"{}\" ({}, {} priority).",
        issue.title,
        issue.category,
        issue.priority.as_str()
    )];
    if facts.is_relevant() {
        parts.push(format!(
            "This {} issue is directly relevant to treasury management.",
            issue.category
        ));
    }
    if financial {
        parts.push("Direct financial implications identified in this issue.".to_string());
    }
    if revenue {
        parts.push("Potential revenue or growth opportunity detected.".to_string());
    }
    match balance {
        Some(b) if b < CONSERVATIVE_BALANCE => parts.push(format!(
            "Treasury balance ({}) requires conservative approach.",
            b
        )),
        Some(b) if b > HEALTHY_BALANCE => parts.push(format!(
            "Healthy treasury balance ({}) allows flexibility.",
            b
        )),
        _ => {}
    }
    let related = facts.signals_in(&["treasury", "token", "price"]);
    if related > 0 {
        parts.push(format!("{} treasury-related signals in this issue.", related));
    }
    outcome.reasoning = parts.join(" ");
    outcome
}
