//! Least-squares trend detection over time-ordered category windows.

use serde_json::json;

use agora_core::{DetectedIssue, Evidence, IssueKind, IssuePriority, NormalizedSignal, TrendDirection};

use super::{group_by_category, IssueDetector, Stats};
use crate::config::TrendConfig;

/// Result of a linear fit over equally spaced points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendFit {
    /// Change per step
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination, 0 for a flat series
    pub r_squared: f64,
}

impl TrendFit {
    /// Fit `y = slope * i + intercept` where `i` is the point index.
    pub fn of(values: &[f64]) -> Self {
        let n = values.len() as f64;
        if values.len() < 2 {
            return Self {
                slope: 0.0,
                intercept: values.first().copied().unwrap_or(0.0),
                r_squared: 0.0,
            };
        }
        let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
        let sum_y: f64 = values.iter().sum();
        let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
        let sum_x2: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();

        let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_x2 - sum_x * sum_x);
        let intercept = (sum_y - slope * sum_x) / n;

        let mean = sum_y / n;
        let ss_total: f64 = values.iter().map(|y| (y - mean).powi(2)).sum();
        let ss_residual: f64 = values
            .iter()
            .enumerate()
            .map(|(i, y)| (y - (slope * i as f64 + intercept)).powi(2))
            .sum();
        let r_squared = if ss_total == 0.0 {
            0.0
        } else {
            1.0 - ss_residual / ss_total
        };

        Self {
            slope,
            intercept,
            r_squared,
        }
    }
}

/// Reports sustained increases or decreases per category.
///
/// The slope is compared relative to the window mean, so one threshold works
/// for categories measured on very different scales.
#[derive(Debug, Clone, Default)]
pub struct TrendDetector {
    config: TrendConfig,
}

impl TrendDetector {
    pub fn new() -> Self {
        Self::with_config(TrendConfig::default())
    }

    pub fn with_config(config: TrendConfig) -> Self {
        Self { config }
    }

    pub fn with_threshold(mut self, trend_threshold: f64) -> Self {
        self.config.trend_threshold = trend_threshold;
        self
    }

    pub fn with_min_data_points(mut self, min_data_points: usize) -> Self {
        self.config.min_data_points = min_data_points;
        self
    }

    /// Only watch these categories.
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.config.categories = categories;
        self
    }

    fn watches(&self, category: &str) -> bool {
        self.config.categories.is_empty() || self.config.categories.iter().any(|c| c == category)
    }

    /// Slope magnitude relative to the mean; the raw slope when the mean is zero.
    fn relative_slope(fit: &TrendFit, mean: f64) -> f64 {
        if mean == 0.0 {
            fit.slope
        } else {
            fit.slope / mean.abs()
        }
    }

    /// Direction of a relative slope against the threshold.
    pub fn direction(&self, relative_slope: f64) -> TrendDirection {
        if relative_slope.abs() < self.config.trend_threshold {
            TrendDirection::Stable
        } else if relative_slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        }
    }

    fn priority(&self, magnitude: f64) -> IssuePriority {
        let t = self.config.trend_threshold;
        if magnitude > t * 5.0 {
            IssuePriority::Urgent
        } else if magnitude > t * 3.0 {
            IssuePriority::High
        } else if magnitude > t * 2.0 {
            IssuePriority::Medium
        } else {
            IssuePriority::Low
        }
    }
}

impl IssueDetector for TrendDetector {
    fn name(&self) -> &str {
        "TrendDetector"
    }

    fn analyze(&self, signals: &[NormalizedSignal]) -> Vec<DetectedIssue> {
        let mut issues = Vec::new();

        for (category, group) in group_by_category(signals) {
            if !self.watches(category) || group.len() < self.config.min_data_points {
                continue;
            }

            let mut window: Vec<NormalizedSignal> = group.into_iter().cloned().collect();
            window.sort_by_key(|s| s.timestamp);
            let values: Vec<f64> = window.iter().map(|s| s.value).collect();

            let fit = TrendFit::of(&values);
            let relative = Self::relative_slope(&fit, Stats::of(&values).mean);
            let direction = self.direction(relative);
            if direction == TrendDirection::Stable {
                continue;
            }

            let priority = self.priority(relative.abs());
            let first = values[0];
            let last = values[values.len() - 1];
            let percent_change = if first == 0.0 {
                0.0
            } else {
                (last - first) * 100.0 / first.abs()
            };
            let name = direction.as_str();
            let title_name = match direction {
                TrendDirection::Increasing => "Increasing",
                _ => "Decreasing",
            };

            let evidence = Evidence::new(
                "trend",
                "Trend analysis results",
                json!({
                    "direction": direction,
                    "slope": fit.slope,
                    "relativeSlope": relative,
                    "intercept": fit.intercept,
                    "rSquared": fit.r_squared,
                    "dataPoints": values.len(),
                    "firstValue": first,
                    "lastValue": last,
                    "percentChange": percent_change,
                }),
            );
            let closing_action = if direction == TrendDirection::Increasing && percent_change > 50.0 {
                "Consider implementing rate limiting or controls"
            } else {
                "Review if this trend aligns with expectations"
            };
            // A mild trend is informational rather than something to act on
            let kind = if priority == IssuePriority::Low {
                IssueKind::Insight
            } else {
                IssueKind::Issue
            };

            issues.push(
                DetectedIssue::new(
                    format!("{} trend in {}", title_name, category),
                    format!(
                        "A significant {} trend detected in {}. Values changed from {:.2} to {:.2} ({}{:.1}%) over {} data points.",
                        name,
                        category,
                        first,
                        last,
                        if percent_change > 0.0 { "+" } else { "" },
                        percent_change,
                        values.len()
                    ),
                    category,
                    priority,
                    window,
                    vec![evidence],
                )
                .with_kind(kind)
                .with_trend(direction)
                .with_suggested_actions(vec![
                    format!("Monitor the {} trend in {}", name, category),
                    format!(
                        "Investigate factors contributing to the {:.1}% change",
                        percent_change
                    ),
                    closing_action.to_string(),
                ]),
            );
        }

        issues
    }
}
