//! Raw and normalized signals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Origin of a raw observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    /// On-chain event or state read
    Onchain,
    /// External HTTP API
    Api,
    /// System telemetry
    Telemetry,
    /// Operator-submitted observation
    Manual,
}

impl SignalSource {
    /// Wire name of the source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Onchain => "onchain",
            Self::Api => "api",
            Self::Telemetry => "telemetry",
            Self::Manual => "manual",
        }
    }
}

/// Severity of a normalized signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// High or critical.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Chain or API provenance attached to a raw signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
}

/// An observation as produced by an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSignal {
    /// Unique signal ID
    pub id: String,
    /// Source tag of the producing adapter
    pub source: SignalSource,
    /// Identifier within the source (metric name, endpoint, event)
    pub source_id: String,
    /// When the observation was made
    pub timestamp: DateTime<Utc>,
    /// Arbitrary keyed payload
    pub data: HashMap<String, serde_json::Value>,
    /// Optional provenance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SignalMetadata>,
}

impl RawSignal {
    /// Create a raw signal with a fresh id and the current time.
    pub fn new(
        source: SignalSource,
        source_id: impl Into<String>,
        data: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source,
            source_id: source_id.into(),
            timestamp: Utc::now(),
            data,
            metadata: None,
        }
    }

    /// Override the timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach provenance metadata.
    pub fn with_metadata(mut self, metadata: SignalMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Numeric payload field, if present and numeric.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.data.get(field).and_then(|v| v.as_f64())
    }

    /// String payload field, if present and a string.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(|v| v.as_str())
    }
}

/// A signal in the common shape consumed by detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSignal {
    /// Unique signal ID
    pub id: String,
    /// Back-reference to the raw signal
    pub original_id: String,
    pub source: SignalSource,
    pub timestamp: DateTime<Utc>,
    /// Grouping key for detectors
    pub category: String,
    pub severity: Severity,
    pub value: f64,
    pub unit: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation: Option<String>,
}

impl NormalizedSignal {
    /// Derive a normalized signal from its raw form.
    pub fn from_raw(
        raw: &RawSignal,
        category: impl Into<String>,
        severity: Severity,
        value: f64,
        unit: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            original_id: raw.id.clone(),
            source: raw.source,
            timestamp: raw.timestamp,
            category: category.into(),
            severity,
            value,
            unit: unit.into(),
            description: description.into(),
            attestation: None,
        }
    }
}
