//! Issue detection.
//!
//! Detectors are pure functions of a signal slice: no state beyond their
//! constructor configuration, so several can run over one batch and their
//! results merge without ordering concerns.
//!
//! ```text
//! NormalizedSignal[] ──┬──► ThresholdDetector ──┐
//!                      ├──► AnomalyDetector ────┼──► DetectedIssue[]
//!                      └──► TrendDetector ──────┘   (registration order)
//! ```

mod anomaly;
mod drafts;
mod threshold;
mod trend;

pub use anomaly::AnomalyDetector;
pub use drafts::{ProposalDraft, ProposalDraftGenerator};
pub use threshold::{ThresholdDetector, ThresholdOperator, ThresholdRule};
pub use trend::{TrendDetector, TrendFit};

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use agora_core::{DetectedIssue, NormalizedSignal};

/// A strategy that turns a batch of signals into candidate issues.
pub trait IssueDetector: Send + Sync {
    /// Detector name, used in logs.
    fn name(&self) -> &str;

    /// Analyze a batch. Must not depend on anything but the input and configuration.
    fn analyze(&self, signals: &[NormalizedSignal]) -> Vec<DetectedIssue>;
}

/// Summary statistics over a group of values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl Stats {
    /// Compute statistics; an empty slice yields all zeros.
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std_dev: variance.sqrt(),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Group signals by category. Categories iterate in sorted order so output is stable.
pub fn group_by_category(signals: &[NormalizedSignal]) -> BTreeMap<&str, Vec<&NormalizedSignal>> {
    let mut groups: BTreeMap<&str, Vec<&NormalizedSignal>> = BTreeMap::new();
    for signal in signals {
        groups.entry(signal.category.as_str()).or_default().push(signal);
    }
    groups
}

/// Runs every configured detector over one batch.
#[derive(Clone, Default)]
pub struct DetectionEngine {
    detectors: Vec<Arc<dyn IssueDetector>>,
}

impl DetectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a detector; results are merged in registration order.
    pub fn with_detector(mut self, detector: impl IssueDetector + 'static) -> Self {
        self.detectors.push(Arc::new(detector));
        self
    }

    pub fn add_detector(&mut self, detector: Arc<dyn IssueDetector>) {
        self.detectors.push(detector);
    }

    pub fn detector_names(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Analyze a batch with every detector.
    pub fn detect(&self, signals: &[NormalizedSignal]) -> Vec<DetectedIssue> {
        let mut issues = Vec::new();
        for detector in &self.detectors {
            let found = detector.analyze(signals);
            debug!(detector = detector.name(), issues = found.len(), "Detector finished");
            issues.extend(found);
        }
        issues
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use agora_core::{NormalizedSignal, RawSignal, Severity, SignalSource};
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashMap;

    /// A normalized signal `offset_secs` after a fixed epoch.
    pub fn signal(category: &str, value: f64, severity: Severity, offset_secs: i64) -> NormalizedSignal {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let raw = RawSignal::new(SignalSource::Telemetry, "test", HashMap::new())
            .at(base + Duration::seconds(offset_secs));
        NormalizedSignal::from_raw(&raw, category, severity, value, "unit", "test signal")
    }

    /// A series of low-severity signals one minute apart.
    pub fn series(category: &str, values: &[f64]) -> Vec<NormalizedSignal> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| signal(category, *v, Severity::Low, i as i64 * 60))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::series;
    use super::*;
    use agora_core::IssuePriority;

    #[test]
    fn test_population_stats() {
        let stats = Stats::of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.std_dev, 2.0);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        assert_eq!(Stats::of(&[]).std_dev, 0.0);
    }

    #[test]
    fn test_engine_merges_in_registration_order() {
        let engine = DetectionEngine::new()
            .with_detector(ThresholdDetector::new(vec![ThresholdRule::new(
                "gas_usage",
                ThresholdOperator::Gt,
                50.0,
                IssuePriority::High,
                "Gas too high",
            )]))
            .with_detector(TrendDetector::new());
        assert_eq!(engine.detector_names(), vec!["ThresholdDetector", "TrendDetector"]);

        let signals = series("gas_usage", &[10.0, 20.0, 40.0, 60.0, 80.0]);
        let issues = engine.detect(&signals);
        assert_eq!(issues.len(), 2);
        assert!(issues[0].title.starts_with("Threshold exceeded"));
        assert!(issues[1].title.contains("trend"));

        // Pure: the same batch gives the same issues (modulo fresh ids)
        let again = engine.detect(&signals);
        assert_eq!(
            issues.iter().map(|i| &i.title).collect::<Vec<_>>(),
            again.iter().map(|i| &i.title).collect::<Vec<_>>()
        );
    }
}
