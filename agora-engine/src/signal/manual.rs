//! Operator-submitted observations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

use agora_core::{NormalizedSignal, RawSignal, Result, Severity, SignalSource};

use super::{number_field, text_field, SignalAdapter};

/// An observation entered by an operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualObservation {
    pub category: String,
    pub value: f64,
    #[serde(default)]
    pub unit: String,
    /// Defaults to medium when omitted
    #[serde(default)]
    pub severity: Option<Severity>,
    pub description: String,
    /// Who submitted it
    pub reporter: String,
}

/// Queues manual observations until the next collection.
pub struct ManualAdapter {
    queue: Mutex<Vec<ManualObservation>>,
}

impl ManualAdapter {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
        }
    }

    pub fn submit(&self, observation: ManualObservation) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push(observation);
        }
    }
}

impl Default for ManualAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalAdapter for ManualAdapter {
    fn name(&self) -> &str {
        "ManualAdapter"
    }

    fn source(&self) -> SignalSource {
        SignalSource::Manual
    }

    async fn fetch(&self) -> Result<Vec<RawSignal>> {
        let queued: Vec<ManualObservation> = self
            .queue
            .lock()
            .map(|mut queue| queue.drain(..).collect())
            .unwrap_or_default();

        Ok(queued
            .into_iter()
            .map(|obs| {
                let data = HashMap::from([
                    ("category".to_string(), json!(obs.category)),
                    ("value".to_string(), json!(obs.value)),
                    ("unit".to_string(), json!(obs.unit)),
                    ("severity".to_string(), json!(obs.severity.unwrap_or(Severity::Medium))),
                    ("description".to_string(), json!(obs.description)),
                ]);
                RawSignal::new(SignalSource::Manual, obs.reporter, data)
            })
            .collect())
    }

    fn required_fields(&self) -> &[&'static str] {
        &["category", "value", "severity"]
    }

    fn normalize(&self, signal: &RawSignal) -> Result<NormalizedSignal> {
        let severity: Severity = signal
            .data
            .get("severity")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or(Severity::Medium);

        Ok(NormalizedSignal::from_raw(
            signal,
            text_field(signal, "category")?,
            severity,
            number_field(signal, "value")?,
            signal.text("unit").unwrap_or_default(),
            signal.text("description").unwrap_or_default(),
        ))
    }
}
