//! Push-based telemetry adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

use agora_core::{NormalizedSignal, RawSignal, Result, Severity, SignalSource};

use super::{number_field, text_field, SignalAdapter};

/// A metric sample pushed by an instrumented service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryMetric {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl TelemetryMetric {
    /// A sample taken now.
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
            timestamp: Utc::now(),
            tags: HashMap::new(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Buffers pushed metrics and drains them on fetch.
pub struct TelemetryAdapter {
    name: String,
    service_name: String,
    buffer: Mutex<Vec<TelemetryMetric>>,
}

impl TelemetryAdapter {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            name: "TelemetryAdapter".to_string(),
            service_name: service_name.into(),
            buffer: Mutex::new(Vec::new()),
        }
    }

    pub fn push_metric(&self, metric: TelemetryMetric) {
        self.push_metrics(std::iter::once(metric));
    }

    pub fn push_metrics(&self, metrics: impl IntoIterator<Item = TelemetryMetric>) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.extend(metrics);
        }
    }

    /// Metrics waiting for the next fetch.
    pub fn pending(&self) -> usize {
        self.buffer.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Severity by metric family: error counts, latency in ms, cpu/memory percent.
    fn severity(metric_name: &str, value: f64) -> Severity {
        let name = metric_name.to_lowercase();
        let ladder: Option<(f64, f64, f64)> = if name.contains("error") {
            Some((10.0, 5.0, 1.0))
        } else if name.contains("latency") {
            Some((5000.0, 2000.0, 1000.0))
        } else if name.contains("cpu") || name.contains("memory") {
            Some((95.0, 85.0, 70.0))
        } else {
            None
        };

        match ladder {
            Some((critical, _, _)) if value > critical => Severity::Critical,
            Some((_, high, _)) if value > high => Severity::High,
            Some((_, _, medium)) if value > medium => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

#[async_trait]
impl SignalAdapter for TelemetryAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> SignalSource {
        SignalSource::Telemetry
    }

    async fn fetch(&self) -> Result<Vec<RawSignal>> {
        let metrics: Vec<TelemetryMetric> = self
            .buffer
            .lock()
            .map(|mut buffer| buffer.drain(..).collect())
            .unwrap_or_default();

        Ok(metrics
            .into_iter()
            .map(|metric| {
                let source_id = format!(
                    "{}-{}-{}",
                    self.service_name,
                    metric.name,
                    metric.timestamp.timestamp_millis()
                );
                let data = HashMap::from([
                    ("metricName".to_string(), json!(metric.name)),
                    ("value".to_string(), json!(metric.value)),
                    ("unit".to_string(), json!(metric.unit)),
                    ("tags".to_string(), json!(metric.tags)),
                    ("serviceName".to_string(), json!(self.service_name)),
                ]);
                RawSignal::new(self.source(), source_id, data).at(metric.timestamp)
            })
            .collect())
    }

    fn required_fields(&self) -> &[&'static str] {
        &["metricName", "value", "unit"]
    }

    fn normalize(&self, signal: &RawSignal) -> Result<NormalizedSignal> {
        let metric_name = text_field(signal, "metricName")?;
        let value = number_field(signal, "value")?;
        let unit = text_field(signal, "unit")?;
        let service = signal.text("serviceName").unwrap_or(&self.service_name);

        Ok(NormalizedSignal::from_raw(
            signal,
            format!("telemetry_{}", metric_name),
            Self::severity(metric_name, value),
            value,
            unit,
            format!("{} {}: {} {}", service, metric_name, value, unit),
        ))
    }
}
