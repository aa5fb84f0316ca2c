//! Statistical anomaly detection by z-score.

use serde_json::json;

use agora_core::{DetectedIssue, Evidence, IssuePriority, NormalizedSignal};

use super::{group_by_category, IssueDetector, Stats};
use crate::config::AnomalyConfig;

/// Flags signals whose value lies more than `std_dev_threshold` population
/// standard deviations from their category mean.
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    pub fn new() -> Self {
        Self::with_config(AnomalyConfig::default())
    }

    pub fn with_config(config: AnomalyConfig) -> Self {
        Self { config }
    }

    pub fn with_threshold(mut self, std_dev_threshold: f64) -> Self {
        self.config.std_dev_threshold = std_dev_threshold;
        self
    }

    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.config.min_samples = min_samples;
        self
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    /// Priority by anomaly density.
    fn priority(anomalies: &[&NormalizedSignal]) -> IssuePriority {
        let elevated = anomalies.iter().filter(|s| s.severity.is_elevated()).count();
        if elevated * 2 > anomalies.len() {
            IssuePriority::Urgent
        } else if elevated > 0 {
            IssuePriority::High
        } else if anomalies.len() > 1 {
            IssuePriority::Medium
        } else {
            IssuePriority::Low
        }
    }
}

impl IssueDetector for AnomalyDetector {
    fn name(&self) -> &str {
        "AnomalyDetector"
    }

    fn analyze(&self, signals: &[NormalizedSignal]) -> Vec<DetectedIssue> {
        let mut issues = Vec::new();

        for (category, group) in group_by_category(signals) {
            if group.len() < self.config.min_samples {
                continue;
            }
            let values: Vec<f64> = group.iter().map(|s| s.value).collect();
            let stats = Stats::of(&values);
            // Identical values: nothing deviates
            if stats.std_dev == 0.0 {
                continue;
            }

            let z = |s: &NormalizedSignal| (s.value - stats.mean) / stats.std_dev;
            let anomalies: Vec<&NormalizedSignal> = group
                .iter()
                .copied()
                .filter(|s| z(*s).abs() > self.config.std_dev_threshold)
                .collect();
            if anomalies.is_empty() {
                continue;
            }

            let mut evidence = vec![Evidence::new(
                "statistical_anomaly",
                "Statistical analysis results",
                json!({
                    "mean": stats.mean,
                    "stdDev": stats.std_dev,
                    "threshold": self.config.std_dev_threshold,
                    "anomalyCount": anomalies.len(),
                    "totalSamples": group.len(),
                }),
            )];
            evidence.extend(anomalies.iter().map(|s| {
                Evidence::new(
                    "anomaly",
                    format!("Anomalous value: {} (z-score: {:.2})", s.value, z(*s)),
                    json!({ "signalId": s.id, "value": s.value, "zScore": z(*s) }),
                )
            }));

            issues.push(
                DetectedIssue::new(
                    format!("Anomaly detected in {}", category),
                    format!(
                        "{} anomalous signal(s) detected in {}. Values deviate more than {} standard deviations from mean ({:.2}).",
                        anomalies.len(),
                        category,
                        self.config.std_dev_threshold,
                        stats.mean
                    ),
                    category,
                    Self::priority(&anomalies),
                    anomalies.iter().map(|s| (*s).clone()).collect(),
                    evidence,
                )
                .with_suggested_actions(vec![
                    "Investigate the root cause of the anomalies".to_string(),
                    "Check if this is expected behavior or a system issue".to_string(),
                    "Consider adjusting thresholds if false positives occur".to_string(),
                ]),
            );
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::test_support::{series, signal};
    use agora_core::Severity;

    #[test]
    fn test_detects_outlier() {
        let signals = series("vote_turnout", &[10.0, 10.0, 10.0, 10.0, 10.0, 100.0]);
        let issues = AnomalyDetector::new().analyze(&signals);

        assert_eq!(issues.len(), 1);
        let issue = &issues[0];
        assert_eq!(issue.signals.len(), 1);
        assert_eq!(issue.signals[0].value, 100.0);
        assert_eq!(issue.priority, IssuePriority::Low);
        assert_eq!(issue.evidence[0].data["totalSamples"], 6);
        assert_eq!(issue.evidence.len(), 2);
    }

    #[test]
    fn test_below_min_samples_is_skipped() {
        let signals = series("vote_turnout", &[1.0, 1.0, 1.0, 500.0]);
        assert!(AnomalyDetector::new().analyze(&signals).is_empty());
    }

    #[test]
    fn test_constant_series_is_not_anomalous() {
        let signals = series("gas_usage", &[7.0; 12]);
        assert!(AnomalyDetector::new().analyze(&signals).is_empty());
    }

    #[test]
    fn test_priority_escalates_with_elevated_severity() {
        let mut signals: Vec<_> = (0..10)
            .map(|i| signal("token_price", 1.0, Severity::Low, i))
            .collect();
        signals.push(signal("token_price", 50.0, Severity::Critical, 20));
        signals.push(signal("token_price", 50.0, Severity::Critical, 21));

        let issues = AnomalyDetector::new().with_threshold(1.5).analyze(&signals);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].signals.len(), 2);
        assert_eq!(issues[0].priority, IssuePriority::Urgent);
    }

    #[test]
    fn test_priority_ladder() {
        let low = signal("x", 1.0, Severity::Low, 0);
        let high = signal("x", 1.0, Severity::High, 0);
        assert_eq!(AnomalyDetector::priority(&[&low]), IssuePriority::Low);
        assert_eq!(AnomalyDetector::priority(&[&low, &low]), IssuePriority::Medium);
        assert_eq!(AnomalyDetector::priority(&[&low, &high]), IssuePriority::High);
        assert_eq!(AnomalyDetector::priority(&[&high, &high, &low]), IssuePriority::Urgent);
    }
}
