//! Deterministic mock adapter for demos and tests.

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use agora_core::{NormalizedSignal, RawSignal, Result, SignalSource};

use super::{number_field, severity_from_percent, text_field, SignalAdapter};

/// Governance categories the generator cycles through.
pub const MOCK_CATEGORIES: [&str; 10] = [
    "governance_participation",
    "treasury_balance",
    "proposal_activity",
    "token_price",
    "network_health",
    "community_sentiment",
    "protocol_tvl",
    "gas_usage",
    "vote_turnout",
    "delegation_changes",
];

fn describe(category: &str, variant: u64) -> &'static str {
    let options: [&'static str; 3] = match category {
        "governance_participation" => [
            "Governance voting participation changed",
            "Delegate count increase detected",
            "Active voter count changed",
        ],
        "treasury_balance" => [
            "Treasury balance changed",
            "Large fund movement detected",
            "Budget execution rate changed",
        ],
        "proposal_activity" => [
            "New proposal registered",
            "Proposal voting deadline approaching",
            "Proposal status changed",
        ],
        "token_price" => [
            "Token price changed",
            "Volume surge detected",
            "Liquidity pool changed",
        ],
        "network_health" => [
            "Node response delay detected",
            "Block production rate changed",
            "Network congestion increased",
        ],
        "community_sentiment" => [
            "Community activity increased",
            "Social media mentions changed",
            "Forum posts surged",
        ],
        "protocol_tvl" => [
            "Protocol TVL changed",
            "Staking ratio changed",
            "Liquidity supply changed",
        ],
        "gas_usage" => [
            "Gas fee spike detected",
            "Transaction throughput changed",
            "Contract calls increased",
        ],
        "vote_turnout" => [
            "Low turnout warning",
            "Quorum at risk",
            "Voting deadline approaching",
        ],
        "delegation_changes" => [
            "Large delegation change",
            "Delegation withdrawal detected",
            "New delegate registered",
        ],
        _ => ["Signal detected", "Signal detected", "Signal detected"],
    };
    options[(variant % 3) as usize]
}

/// A scripted observation replayed by the mock adapter.
#[derive(Debug, Clone)]
pub struct MockObservation {
    pub category: String,
    pub value: f64,
    pub description: String,
}

impl MockObservation {
    pub fn new(category: impl Into<String>, value: f64) -> Self {
        let category = category.into();
        let description = format!("{} observed at {:.2}", category, value);
        Self {
            category,
            value,
            description,
        }
    }
}

/// Mock signal adapter.
///
/// Replays scripted observations when any are queued, otherwise generates
/// `signal_count` signals from a seeded sequence. Output depends only on
/// the seed and the number of previous fetches.
pub struct MockAdapter {
    name: String,
    signal_count: usize,
    seed: u64,
    fetches: AtomicU64,
    scripted: Mutex<VecDeque<MockObservation>>,
}

impl MockAdapter {
    /// Create a generator producing five signals per fetch.
    pub fn new() -> Self {
        Self::with_seed(5, 0)
    }

    /// Create a generator with a custom batch size and seed.
    pub fn with_seed(signal_count: usize, seed: u64) -> Self {
        Self {
            name: "MockAdapter".to_string(),
            signal_count,
            seed,
            fetches: AtomicU64::new(0),
            scripted: Mutex::new(VecDeque::new()),
        }
    }

    /// Rename the adapter, e.g. to register several mocks at once.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Queue observations for the next fetch.
    pub fn script(&self, observations: impl IntoIterator<Item = MockObservation>) {
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.extend(observations);
        }
    }

    fn generate(&self, batch: u64) -> Vec<MockObservation> {
        (0..self.signal_count as u64)
            .map(|i| {
                // Knuth multiplicative hash over (seed, batch, index)
                let mix = (self.seed ^ (batch << 16) ^ i).wrapping_mul(2_654_435_761);
                let category = MOCK_CATEGORIES[(mix % MOCK_CATEGORIES.len() as u64) as usize];
                let value = ((mix >> 8) % 10_000) as f64 / 100.0;
                MockObservation {
                    category: category.to_string(),
                    value,
                    description: describe(category, mix >> 24).to_string(),
                }
            })
            .collect()
    }

    fn raw_signal(&self, batch: u64, index: usize, observation: MockObservation) -> RawSignal {
        let severity = severity_from_percent(observation.value);
        let data = HashMap::from([
            ("category".to_string(), json!(observation.category)),
            ("value".to_string(), json!(observation.value)),
            ("severity".to_string(), json!(severity)),
            ("description".to_string(), json!(observation.description)),
            ("isMock".to_string(), json!(true)),
        ]);
        RawSignal::new(self.source(), format!("mock-{}-{}", batch, index), data)
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> SignalSource {
        SignalSource::Telemetry
    }

    async fn fetch(&self) -> Result<Vec<RawSignal>> {
        let batch = self.fetches.fetch_add(1, Ordering::SeqCst);
        let scripted: Vec<MockObservation> = self
            .scripted
            .lock()
            .map(|mut queue| queue.drain(..).collect())
            .unwrap_or_default();

        let observations = if scripted.is_empty() {
            self.generate(batch)
        } else {
            scripted
        };

        Ok(observations
            .into_iter()
            .enumerate()
            .map(|(i, observation)| self.raw_signal(batch, i, observation))
            .collect())
    }

    fn required_fields(&self) -> &[&'static str] {
        &["category", "value"]
    }

    fn normalize(&self, signal: &RawSignal) -> Result<NormalizedSignal> {
        let category = text_field(signal, "category")?;
        let value = number_field(signal, "value")?;
        let description = signal.text("description").unwrap_or("Signal detected");

        Ok(NormalizedSignal::from_raw(
            signal,
            category,
            severity_from_percent(value),
            value,
            "%",
            description,
        ))
    }
}
