//! Rule-triggered issue synthesis.

use serde::{Deserialize, Serialize};
use serde_json::json;

use agora_core::{DetectedIssue, Evidence, IssuePriority, NormalizedSignal};

use super::IssueDetector;

/// Comparison applied by a threshold rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdOperator {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
}

impl ThresholdOperator {
    /// Evaluate `value <op> bound`.
    pub fn compare(&self, value: f64, bound: f64) -> bool {
        match self {
            Self::Gt => value > bound,
            Self::Lt => value < bound,
            Self::Gte => value >= bound,
            Self::Lte => value <= bound,
            Self::Eq => value == bound,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Eq => "==",
        }
    }
}

/// A single threshold rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdRule {
    pub category: String,
    pub operator: ThresholdOperator,
    pub value: f64,
    pub priority: IssuePriority,
    /// Human-readable rule description
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_actions: Option<Vec<String>>,
}

impl ThresholdRule {
    pub fn new(
        category: impl Into<String>,
        operator: ThresholdOperator,
        value: f64,
        priority: IssuePriority,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            operator,
            value,
            priority,
            message: message.into(),
            suggested_actions: None,
        }
    }

    pub fn with_suggested_actions(mut self, actions: Vec<String>) -> Self {
        self.suggested_actions = Some(actions);
        self
    }

    /// Whether a signal falls under this rule and satisfies it.
    pub fn triggers(&self, signal: &NormalizedSignal) -> bool {
        signal.category == self.category && self.operator.compare(signal.value, self.value)
    }
}

/// Emits one issue per triggered rule, carrying every triggering signal.
#[derive(Debug, Clone, Default)]
pub struct ThresholdDetector {
    rules: Vec<ThresholdRule>,
}

impl ThresholdDetector {
    pub fn new(rules: Vec<ThresholdRule>) -> Self {
        Self { rules }
    }

    pub fn with_rule(mut self, rule: ThresholdRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    fn issue_for(rule: &ThresholdRule, triggered: Vec<NormalizedSignal>) -> DetectedIssue {
        let values: Vec<f64> = triggered.iter().map(|s| s.value).collect();
        let evidence = Evidence::new(
            "threshold_breach",
            "Threshold rule configuration",
            json!({
                "rule": {
                    "operator": rule.operator,
                    "value": rule.value,
                    "message": rule.message,
                },
                "triggeredCount": triggered.len(),
                "triggeredValues": values,
            }),
        );
        let actions = rule.suggested_actions.clone().unwrap_or_else(|| {
            vec![
                format!(
                    "Review signals where value {} {}",
                    rule.operator.symbol(),
                    rule.value
                ),
                "Take corrective action if necessary".to_string(),
            ]
        });

        DetectedIssue::new(
            format!("Threshold exceeded: {}", rule.category),
            format!(
                "{} signal(s) triggered threshold rule: {}. Condition: value {} {}",
                triggered.len(),
                rule.message,
                rule.operator.symbol(),
                rule.value
            ),
            rule.category.clone(),
            rule.priority,
            triggered,
            vec![evidence],
        )
        .with_suggested_actions(actions)
    }
}

impl IssueDetector for ThresholdDetector {
    fn name(&self) -> &str {
        "ThresholdDetector"
    }

    fn analyze(&self, signals: &[NormalizedSignal]) -> Vec<DetectedIssue> {
        self.rules
            .iter()
            .filter_map(|rule| {
                let triggered: Vec<NormalizedSignal> = signals
                    .iter()
                    .filter(|signal| rule.triggers(signal))
                    .cloned()
                    .collect();
                if triggered.is_empty() {
                    None
                } else {
                    Some(Self::issue_for(rule, triggered))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::test_support::{series, signal};
    use agora_core::Severity;

    fn detector() -> ThresholdDetector {
        ThresholdDetector::new(vec![
            ThresholdRule::new(
                "treasury_balance",
                ThresholdOperator::Lt,
                1_000.0,
                IssuePriority::Urgent,
                "Treasury running low",
            ),
            ThresholdRule::new(
                "gas_usage",
                ThresholdOperator::Gte,
                80.0,
                IssuePriority::Medium,
                "Gas usage elevated",
            ),
        ])
    }

    #[test]
    fn test_one_issue_per_rule() {
        let mut signals = series("treasury_balance", &[5_000.0, 900.0, 400.0, 2_000.0]);
        signals.extend(series("gas_usage", &[80.0, 79.9]));

        let issues = detector().analyze(&signals);
        assert_eq!(issues.len(), 2);

        let treasury = &issues[0];
        assert_eq!(treasury.category, "treasury_balance");
        assert_eq!(treasury.priority, IssuePriority::Urgent);
        assert_eq!(treasury.signals.len(), 2);
        assert_eq!(treasury.evidence[0].evidence_type, "threshold_breach");
        assert_eq!(treasury.evidence[0].data["triggeredCount"], 2);

        // Gte boundary is inclusive
        assert_eq!(issues[1].signals.len(), 1);
        assert_eq!(issues[1].signals[0].value, 80.0);
    }

    #[test]
    fn test_evidence_signals_satisfy_rule() {
        let detector = detector();
        let signals: Vec<_> = (0..50)
            .map(|i| signal("gas_usage", i as f64 * 2.0, Severity::Low, i))
            .collect();

        for issue in detector.analyze(&signals) {
            let rule = detector
                .rules()
                .iter()
                .find(|r| r.category == issue.category)
                .unwrap();
            assert!(issue.signals.iter().all(|s| rule.triggers(s)));
        }
    }

    #[test]
    fn test_other_categories_ignored() {
        let issues = detector().analyze(&series("vote_turnout", &[0.0, 10_000.0]));
        assert!(issues.is_empty());
    }
}
