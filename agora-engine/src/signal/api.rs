//! Polling adapter for JSON HTTP endpoints.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use agora_core::{
    NormalizedSignal, OracleError, RawSignal, Result, Severity, SignalMetadata, SignalSource,
};

use super::{text_field, SignalAdapter};

/// HTTP method used to poll an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// Value ladder mapping a payload field to a severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityThreshold {
    /// Payload field holding the measured value
    pub field: String,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl SeverityThreshold {
    fn classify(&self, value: f64) -> Severity {
        if value >= self.critical {
            Severity::Critical
        } else if value >= self.high {
            Severity::High
        } else if value >= self.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// One polled endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
    /// Category assigned to signals from this endpoint
    pub category: String,
    #[serde(default)]
    pub severity_threshold: Option<SeverityThreshold>,
}

impl ApiEndpoint {
    pub fn get(name: impl Into<String>, url: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            body: None,
            category: category.into(),
            severity_threshold: None,
        }
    }

    pub fn with_threshold(mut self, threshold: SeverityThreshold) -> Self {
        self.severity_threshold = Some(threshold);
        self
    }
}

const ENDPOINT_KEY: &str = "_endpoint";
const CATEGORY_KEY: &str = "_category";
const THRESHOLD_KEY: &str = "_severityConfig";

/// Polls configured endpoints; each successful response becomes one raw signal.
pub struct ApiAdapter {
    name: String,
    client: Client,
    endpoints: Vec<ApiEndpoint>,
}

impl ApiAdapter {
    /// Create an adapter whose requests time out after `timeout_ms`.
    pub fn new(endpoints: Vec<ApiEndpoint>, timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| OracleError::ExternalServiceError(format!("HTTP client: {}", e)))?;
        Ok(Self {
            name: "ApiAdapter".to_string(),
            client,
            endpoints,
        })
    }

    pub fn endpoints(&self) -> &[ApiEndpoint] {
        &self.endpoints
    }

    async fn poll(&self, endpoint: &ApiEndpoint) -> Result<RawSignal> {
        let mut request = match endpoint.method {
            HttpMethod::Get => self.client.get(&endpoint.url),
            HttpMethod::Post => self.client.post(&endpoint.url),
        };
        for (key, value) in &endpoint.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &endpoint.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OracleError::ExternalServiceError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(OracleError::ExternalServiceError(format!(
                "HTTP {} from {}",
                response.status(),
                endpoint.name
            )));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|e| OracleError::ExternalServiceError(e.to_string()))?;

        let mut data: HashMap<String, Value> = match payload {
            Value::Object(map) => map.into_iter().collect(),
            other => HashMap::from([("value".to_string(), other)]),
        };
        data.insert(ENDPOINT_KEY.to_string(), json!(endpoint.name));
        data.insert(CATEGORY_KEY.to_string(), json!(endpoint.category));
        if let Some(threshold) = &endpoint.severity_threshold {
            data.insert(THRESHOLD_KEY.to_string(), serde_json::to_value(threshold)?);
        }

        let metadata = SignalMetadata {
            api_endpoint: Some(endpoint.url.clone()),
            ..Default::default()
        };
        let source_id = format!("{}-{}", endpoint.name, chrono::Utc::now().timestamp_millis());
        Ok(RawSignal::new(self.source(), source_id, data).with_metadata(metadata))
    }
}

#[async_trait]
impl SignalAdapter for ApiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> SignalSource {
        SignalSource::Api
    }

    async fn fetch(&self) -> Result<Vec<RawSignal>> {
        let mut signals = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            match self.poll(endpoint).await {
                Ok(signal) => {
                    debug!(endpoint = %endpoint.name, "Polled endpoint");
                    signals.push(signal);
                }
                Err(e) => {
                    warn!(endpoint = %endpoint.name, error = %e, "Endpoint poll failed");
                }
            }
        }
        Ok(signals)
    }

    fn required_fields(&self) -> &[&'static str] {
        &[ENDPOINT_KEY, CATEGORY_KEY]
    }

    fn normalize(&self, signal: &RawSignal) -> Result<NormalizedSignal> {
        let endpoint = text_field(signal, ENDPOINT_KEY)?;
        let category = signal.text(CATEGORY_KEY).unwrap_or("api_data");

        let threshold: Option<SeverityThreshold> = signal
            .data
            .get(THRESHOLD_KEY)
            .cloned()
            .map(serde_json::from_value)
            .transpose()?;

        let (value, severity) = match threshold {
            Some(threshold) => match signal.number(&threshold.field) {
                Some(value) => (value, threshold.classify(value)),
                None => (signal.number("value").unwrap_or(0.0), Severity::Low),
            },
            None => (signal.number("value").unwrap_or(0.0), Severity::Low),
        };

        Ok(NormalizedSignal::from_raw(
            signal,
            category,
            severity,
            value,
            "unit",
            format!("API signal from {}", endpoint),
        ))
    }
}
