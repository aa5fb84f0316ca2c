//! Signal collection.
//!
//! Adapters pull raw observations from a source and normalize them into the
//! common signal shape; the registry owns the adapters and the stored signals.

mod api;
mod manual;
mod mock;
mod registry;
mod telemetry;

pub use api::{ApiAdapter, ApiEndpoint, HttpMethod, SeverityThreshold};
pub use manual::{ManualAdapter, ManualObservation};
pub use mock::{MockAdapter, MockObservation, MOCK_CATEGORIES};
pub use registry::{RegistryStats, SignalRegistry};
pub use telemetry::{TelemetryAdapter, TelemetryMetric};

use async_trait::async_trait;

use agora_core::{NormalizedSignal, OracleError, RawSignal, Result, Severity, SignalSource};

/// Common trait for signal adapters.
#[async_trait]
pub trait SignalAdapter: Send + Sync {
    /// Unique adapter name.
    fn name(&self) -> &str;

    /// Source tag stamped on every signal this adapter produces.
    fn source(&self) -> SignalSource;

    /// Pull the next batch of raw signals.
    async fn fetch(&self) -> Result<Vec<RawSignal>>;

    /// Payload fields every raw signal must carry.
    fn required_fields(&self) -> &[&'static str] {
        &[]
    }

    /// Check a raw signal before normalization.
    fn validate(&self, signal: &RawSignal) -> bool {
        !signal.id.is_empty()
            && !signal.source_id.is_empty()
            && signal.source == self.source()
            && self
                .required_fields()
                .iter()
                .all(|field| signal.data.contains_key(*field))
    }

    /// Convert a validated raw signal into the common shape.
    fn normalize(&self, signal: &RawSignal) -> Result<NormalizedSignal>;
}

/// Severity ladder for percentage-like values: >=90 critical, >=70 high, >=40 medium.
pub fn severity_from_percent(value: f64) -> Severity {
    if value >= 90.0 {
        Severity::Critical
    } else if value >= 70.0 {
        Severity::High
    } else if value >= 40.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Required numeric payload field.
pub(crate) fn number_field(signal: &RawSignal, field: &str) -> Result<f64> {
    signal.number(field).ok_or_else(|| {
        OracleError::ValidationError(format!(
            "signal {} missing numeric field '{}'",
            signal.id, field
        ))
    })
}

/// Required string payload field.
pub(crate) fn text_field<'a>(signal: &'a RawSignal, field: &str) -> Result<&'a str> {
    signal.text(field).ok_or_else(|| {
        OracleError::ValidationError(format!(
            "signal {} missing text field '{}'",
            signal.id, field
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ladder() {
        assert_eq!(severity_from_percent(95.0), Severity::Critical);
        assert_eq!(severity_from_percent(90.0), Severity::Critical);
        assert_eq!(severity_from_percent(70.0), Severity::High);
        assert_eq!(severity_from_percent(40.0), Severity::Medium);
        assert_eq!(severity_from_percent(39.9), Severity::Low);
    }
}
