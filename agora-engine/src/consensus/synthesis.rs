//! Turning a set of opinions into a decision packet.
//!
//! Consensus score: with stance scores s in {2, 1, 0, -1, -2} weighted by
//! confidence c, let mu be the weighted mean and var the weighted variance
//! sum(c * (s - mu)^2) / sum(c). Then
//!
//! ```text
//! score = (1 - var / 4) * mean(c)      clamped to [0, 1]
//! ```
//!
//! 4 is the largest variance possible on the scale, so unanimous opinions at
//! full confidence score 1 and an even split between the extremes scores 0.

use chrono::Utc;
use std::collections::BTreeSet;

use agora_core::{
    AgentOpinion, AgentRole, Alternative, DecisionPacket, DetectedIssue, Dissent, IssuePriority,
    Kpi, Level, ProposalType, Recommendation, Risk, Stance,
};

/// Largest weighted variance on the five-point scale.
const MAX_VARIANCE: f64 = 4.0;

fn weight(opinion: &AgentOpinion) -> f64 {
    opinion.confidence.clamp(0.0, 1.0)
}

/// Confidence-weighted mean stance score; 0 without weight.
pub fn average_score(opinions: &[AgentOpinion]) -> f64 {
    let total: f64 = opinions.iter().map(weight).sum();
    if total <= 0.0 {
        return 0.0;
    }
    opinions
        .iter()
        .map(|o| weight(o) * f64::from(o.stance.score()))
        .sum::<f64>()
        / total
}

/// Agreement level in [0, 1].
pub fn consensus_score(opinions: &[AgentOpinion]) -> f64 {
    let total: f64 = opinions.iter().map(weight).sum();
    if opinions.is_empty() || total <= 0.0 {
        return 0.0;
    }
    let mean = average_score(opinions);
    let variance = opinions
        .iter()
        .map(|o| weight(o) * (f64::from(o.stance.score()) - mean).powi(2))
        .sum::<f64>()
        / total;
    let mean_confidence = total / opinions.len() as f64;
    ((1.0 - variance / MAX_VARIANCE) * mean_confidence).clamp(0.0, 1.0)
}

/// Stance with the largest summed confidence.
///
/// Ties go to the stance nearer neutral, then to the more supportive one.
pub fn majority_stance(opinions: &[AgentOpinion]) -> Option<Stance> {
    let mut best: Option<(Stance, f64)> = None;
    for stance in Stance::ALL {
        let holders: Vec<&AgentOpinion> = opinions.iter().filter(|o| o.stance == stance).collect();
        if holders.is_empty() {
            continue;
        }
        let weight_sum: f64 = holders.iter().map(|o| weight(o)).sum();
        best = match best {
            None => Some((stance, weight_sum)),
            Some((current, current_weight)) => {
                let better = weight_sum > current_weight
                    || (weight_sum == current_weight
                        && stance.score().abs() < current.score().abs());
                if better {
                    Some((stance, weight_sum))
                } else {
                    Some((current, current_weight))
                }
            }
        };
    }
    best.map(|(stance, _)| stance)
}

/// Opinions more than one step away from the majority.
pub fn find_dissent(opinions: &[AgentOpinion], majority: Stance) -> Vec<Dissent> {
    opinions
        .iter()
        .filter(|o| o.stance.distance(majority) > 1)
        .map(|o| Dissent {
            agent_role: o.role,
            reason: o.reasoning.clone(),
        })
        .collect()
}

/// Builds decision packets from opinions.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    action_cutoff: f64,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new(0.7)
    }
}

impl Synthesizer {
    pub fn new(action_cutoff: f64) -> Self {
        Self { action_cutoff }
    }

    /// Action at or above the cutoff, investigation below it.
    pub fn proposal_type(&self, consensus_score: f64) -> ProposalType {
        if consensus_score >= self.action_cutoff {
            ProposalType::Action
        } else {
            ProposalType::Investigation
        }
    }

    pub fn synthesize(&self, issue: &DetectedIssue, opinions: Vec<AgentOpinion>) -> DecisionPacket {
        let score = consensus_score(&opinions);
        let majority = majority_stance(&opinions).unwrap_or(Stance::Neutral);
        let dissent = find_dissent(&opinions, majority);

        DecisionPacket {
            id: uuid::Uuid::new_v4().to_string(),
            issue_id: issue.id.clone(),
            issue: issue.clone(),
            consensus_score: score,
            recommended_proposal_type: self.proposal_type(score),
            recommendation: recommendation(issue, &opinions, majority),
            alternatives: alternatives(&opinions, majority),
            risks: risks(issue, &dissent),
            kpis: kpis(issue),
            agent_opinions: opinions,
            dissent,
            created_at: Utc::now(),
        }
    }
}

fn recommendation(issue: &DetectedIssue, opinions: &[AgentOpinion], majority: Stance) -> Recommendation {
    let average = average_score(opinions);
    let (action, rationale) = if average >= 1.0 {
        (
            "Approve and proceed with implementation",
            "Strong consensus in favor of addressing this issue",
        )
    } else if average >= 0.3 {
        ("Approve with conditions", "Moderate support with some reservations")
    } else if average >= -0.3 {
        (
            "Defer for further analysis",
            "Mixed opinions require additional deliberation",
        )
    } else if average >= -1.0 {
        (
            "Reject with option to resubmit",
            "Significant concerns raised by agents",
        )
    } else {
        ("Reject", "Strong consensus against proceeding")
    };

    // Most confident majority holder's first recommendation
    let lead = opinions
        .iter()
        .filter(|o| o.stance == majority)
        .fold(None::<&AgentOpinion>, |best, o| match best {
            Some(b) if b.confidence >= o.confidence => Some(b),
            _ => Some(o),
        })
        .and_then(|o| o.recommendations.first());

    Recommendation {
        action: action.to_string(),
        rationale: match lead {
            Some(lead) => format!("{}. Lead recommendation: {}", rationale, lead),
            None => rationale.to_string(),
        },
        expected_outcome: format!(
            "Successful resolution of {} with measurable improvement in {} metrics.",
            issue.title, issue.category
        ),
    }
}

fn roles_text(roles: &[AgentRole]) -> String {
    roles.iter().map(AgentRole::as_str).collect::<Vec<_>>().join(", ")
}

fn alternatives(opinions: &[AgentOpinion], majority: Stance) -> Vec<Alternative> {
    let mut seen = BTreeSet::new();
    let mut alternatives = Vec::new();

    for stance in Stance::ALL {
        if stance == majority {
            continue;
        }
        let roles: Vec<AgentRole> = opinions
            .iter()
            .filter(|o| o.stance == stance)
            .map(|o| o.role)
            .collect();
        if roles.is_empty() {
            continue;
        }
        let (action, pros, cons): (&str, [&str; 2], [&str; 2]) = match stance.score() {
            s if s > 0 => (
                "Proceed immediately",
                ["Quick resolution", "Addresses urgent needs"],
                ["May miss edge cases", "Limited deliberation"],
            ),
            0 => (
                "Proceed with extended review period",
                ["More thorough analysis", "Better community input"],
                ["Delayed resolution", "Resource intensive"],
            ),
            _ => (
                "Reject and close",
                ["Conserves resources", "Avoids potential risks"],
                ["Issue remains unaddressed", "May recur"],
            ),
        };
        if !seen.insert(action) {
            // Same action from a stronger stance already listed; credit these roles too
            if let Some(existing) = alternatives.iter_mut().find(|a: &&mut Alternative| a.action == action) {
                existing.pros.push(format!("Favored by {}", roles_text(&roles)));
            }
            continue;
        }
        let mut pros: Vec<String> = pros.iter().map(|p| p.to_string()).collect();
        pros.push(format!("Favored by {}", roles_text(&roles)));
        alternatives.push(Alternative {
            action: action.to_string(),
            pros,
            cons: cons.iter().map(|c| c.to_string()).collect(),
        });
    }

    if alternatives.is_empty() {
        alternatives.push(Alternative {
            action: "Proceed with extended review period".to_string(),
            pros: vec![
                "More thorough analysis".to_string(),
                "Better community input".to_string(),
            ],
            cons: vec![
                "Delayed resolution".to_string(),
                "Resource intensive".to_string(),
            ],
        });
    }
    alternatives
}

fn risk(description: &str, likelihood: Level, impact: Level, mitigation: &str) -> Risk {
    Risk {
        description: description.to_string(),
        likelihood,
        impact,
        mitigation: Some(mitigation.to_string()),
    }
}

fn risks(issue: &DetectedIssue, dissent: &[Dissent]) -> Vec<Risk> {
    let mut risks = vec![
        risk(
            "Implementation may not fully address root cause",
            Level::Medium,
            Level::Medium,
            "Conduct thorough root cause analysis",
        ),
        risk(
            "Unintended side effects on other systems",
            Level::Low,
            Level::High,
            "Comprehensive testing before deployment",
        ),
    ];

    let category = issue.category.to_lowercase();
    let in_family = |fragments: &[&str]| fragments.iter().any(|f| category.contains(f));
    if in_family(&["treasury", "token", "price", "tvl"]) {
        risks.push(risk(
            "Financial exposure from market volatility",
            Level::Medium,
            Level::High,
            "Stage spending and set loss limits",
        ));
    }
    if in_family(&["governance", "vote", "delegation", "community", "proposal"]) {
        risks.push(risk(
            "Reduced stakeholder trust if the outcome is contested",
            Level::Low,
            Level::Medium,
            "Publish the rationale and invite community feedback",
        ));
    }
    if in_family(&["network", "gas", "telemetry"]) {
        risks.push(risk(
            "Service disruption during remediation",
            Level::Medium,
            Level::High,
            "Roll out changes through a staged deployment",
        ));
    }
    if !dissent.is_empty() {
        let roles: Vec<AgentRole> = dissent.iter().map(|d| d.agent_role).collect();
        risks.push(risk(
            &format!("Unresolved dissent from {}", roles_text(&roles)),
            Level::Medium,
            Level::Medium,
            "Address dissenting concerns before execution",
        ));
    }
    risks
}

fn kpis(issue: &DetectedIssue) -> Vec<Kpi> {
    let resolution_target = if issue.priority == IssuePriority::Urgent {
        24.0
    } else {
        168.0
    };
    vec![
        Kpi::new(
            "Resolution Time",
            resolution_target,
            "hours",
            "Time from approval to resolution",
        ),
        Kpi::new(
            "Issue Recurrence",
            0.0,
            "occurrences",
            "Similar issues within 30 days",
        ),
        Kpi::new("Stakeholder Satisfaction", 80.0, "percent", "Post-resolution survey").at_least(),
    ]
}
