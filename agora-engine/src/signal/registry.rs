//! Signal registry - owns adapters and stored signals.

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use agora_core::{
    content_hash, verify_hash, KeyedStore, MemoryStore, NormalizedSignal, OracleError, RawSignal,
    Result, Severity,
};

use super::SignalAdapter;
use crate::config::RegistryConfig;

/// Canonical projection of a signal for attestation hashing.
#[derive(Serialize)]
struct AttestedSignal<'a> {
    id: &'a str,
    category: &'a str,
    value: f64,
    timestamp: String,
}

/// Registry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub adapter_count: usize,
    pub raw_signal_count: usize,
    pub normalized_signal_count: usize,
}

/// Collects, stores and prunes signals from registered adapters.
pub struct SignalRegistry {
    /// Configuration
    config: RegistryConfig,
    /// Adapters in registration order
    adapters: RwLock<Vec<Arc<dyn SignalAdapter>>>,
    /// Raw signals by id
    raw: Arc<dyn KeyedStore<RawSignal>>,
    /// Normalized signals by id
    normalized: Arc<dyn KeyedStore<NormalizedSignal>>,
    /// Serializes collection runs so each adapter's batch is stored and
    /// pruned before its next fetch
    collecting: Mutex<()>,
}

impl SignalRegistry {
    /// Create a new registry with default configuration.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create with custom configuration and in-memory stores.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self::with_stores(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    /// Create over external stores.
    pub fn with_stores(
        config: RegistryConfig,
        raw: Arc<dyn KeyedStore<RawSignal>>,
        normalized: Arc<dyn KeyedStore<NormalizedSignal>>,
    ) -> Self {
        Self {
            config,
            adapters: RwLock::new(Vec::new()),
            raw,
            normalized,
            collecting: Mutex::new(()),
        }
    }

    /// Register an adapter, replacing any adapter with the same name.
    pub async fn register_adapter(&self, adapter: Arc<dyn SignalAdapter>) {
        let mut adapters = self.adapters.write().await;
        info!(adapter = %adapter.name(), source = %adapter.source().as_str(), "Registering adapter");
        match adapters.iter().position(|a| a.name() == adapter.name()) {
            Some(index) => adapters[index] = adapter,
            None => adapters.push(adapter),
        }
    }

    /// Remove an adapter by name. Returns whether one was removed.
    pub async fn unregister_adapter(&self, name: &str) -> bool {
        let mut adapters = self.adapters.write().await;
        let before = adapters.len();
        adapters.retain(|a| a.name() != name);
        before != adapters.len()
    }

    /// Look up an adapter by name.
    pub async fn get_adapter(&self, name: &str) -> Option<Arc<dyn SignalAdapter>> {
        let adapters = self.adapters.read().await;
        adapters.iter().find(|a| a.name() == name).cloned()
    }

    /// Names of registered adapters in registration order.
    pub async fn list_adapters(&self) -> Vec<String> {
        let adapters = self.adapters.read().await;
        adapters.iter().map(|a| a.name().to_string()).collect()
    }

    /// Fetch from every adapter concurrently, then validate, normalize and store.
    ///
    /// Invalid signals and failing adapters are logged and skipped. Returns
    /// the signals collected in this run that survived pruning, grouped by
    /// adapter in registration order.
    pub async fn collect_signals(&self) -> Result<Vec<NormalizedSignal>> {
        let _guard = self.collecting.lock().await;
        let adapters: Vec<_> = self.adapters.read().await.clone();

        let batches = join_all(adapters.iter().map(|adapter| self.collect_from(adapter.as_ref()))).await;

        let mut collected = Vec::new();
        for batch in batches {
            collected.extend(batch?);
        }

        let pruned = self.prune().await?;
        if !pruned.is_empty() {
            collected.retain(|signal| !pruned.contains(&signal.id));
        }
        info!(
            collected = collected.len(),
            pruned = pruned.len(),
            adapters = adapters.len(),
            "Signal collection complete"
        );

        Ok(collected)
    }

    /// Run one adapter's fetch, validate, normalize and store sequence.
    ///
    /// Only store failures propagate; adapter failures yield an empty batch.
    async fn collect_from(&self, adapter: &dyn SignalAdapter) -> Result<Vec<NormalizedSignal>> {
        let raw_signals = match adapter.fetch().await {
            Ok(signals) => signals,
            Err(e) => {
                warn!(adapter = %adapter.name(), error = %e, "Adapter fetch failed");
                return Ok(Vec::new());
            }
        };

        let mut collected = Vec::with_capacity(raw_signals.len());
        for raw in raw_signals {
            if !adapter.validate(&raw) {
                warn!(adapter = %adapter.name(), signal_id = %raw.id, "Dropping invalid signal");
                continue;
            }
            let normalized = match adapter.normalize(&raw) {
                Ok(normalized) => normalized,
                Err(e) => {
                    warn!(adapter = %adapter.name(), signal_id = %raw.id, error = %e, "Normalization failed");
                    continue;
                }
            };

            self.raw.put(&raw.id.clone(), raw).await?;
            self.normalized.put(&normalized.id, normalized.clone()).await?;
            collected.push(normalized);
        }

        debug!(adapter = %adapter.name(), count = collected.len(), "Adapter batch stored");
        Ok(collected)
    }

    /// Drop the oldest signals (and their raw forms) beyond the ceiling.
    /// Returns the ids of the removed normalized signals.
    async fn prune(&self) -> Result<HashSet<String>> {
        let count = self.normalized.len().await?;
        if count <= self.config.max_signals {
            return Ok(HashSet::new());
        }

        let mut signals = self.normalized.all().await?;
        signals.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));

        let excess = signals.split_off(self.config.max_signals);
        for signal in &excess {
            self.normalized.remove(&signal.id).await?;
            self.raw.remove(&signal.original_id).await?;
        }
        debug!(removed = excess.len(), "Pruned oldest signals");
        Ok(excess.into_iter().map(|signal| signal.id).collect())
    }

    /// Get a normalized signal by id.
    pub async fn get_signal(&self, id: &str) -> Result<Option<NormalizedSignal>> {
        self.normalized.get(id).await
    }

    /// Get a raw signal by id.
    pub async fn get_raw_signal(&self, id: &str) -> Result<Option<RawSignal>> {
        self.raw.get(id).await
    }

    /// All normalized signals of a category, oldest first.
    pub async fn get_signals_by_category(&self, category: &str) -> Result<Vec<NormalizedSignal>> {
        let mut signals = self.normalized.list(&|s: &NormalizedSignal| s.category == category).await?;
        signals.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(signals)
    }

    /// All normalized signals of a severity, oldest first.
    pub async fn get_signals_by_severity(&self, severity: Severity) -> Result<Vec<NormalizedSignal>> {
        let mut signals = self.normalized.list(&|s: &NormalizedSignal| s.severity == severity).await?;
        signals.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(signals)
    }

    /// The `count` most recent signals, newest first.
    pub async fn get_recent_signals(&self, count: usize) -> Result<Vec<NormalizedSignal>> {
        let mut signals = self.normalized.all().await?;
        signals.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        signals.truncate(count);
        Ok(signals)
    }

    /// Content hash over (id, category, value, timestamp) of the resolvable ids.
    ///
    /// Unknown ids are skipped; fails when none resolve.
    pub async fn generate_attestation(&self, ids: &[String]) -> Result<String> {
        let mut signals = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(signal) = self.normalized.get(id).await? {
                signals.push(signal);
            }
        }
        if signals.is_empty() {
            return Err(OracleError::ValidationError(
                "No valid signals found for attestation".to_string(),
            ));
        }
        content_hash(&Self::projection(&signals))
    }

    /// Check an attestation against the current stored signals.
    pub async fn verify_attestation(&self, ids: &[String], attestation: &str) -> Result<bool> {
        let mut signals = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(signal) = self.normalized.get(id).await? {
                signals.push(signal);
            }
        }
        if signals.is_empty() {
            return Ok(false);
        }
        verify_hash(&Self::projection(&signals), attestation)
    }

    fn projection(signals: &[NormalizedSignal]) -> Vec<AttestedSignal<'_>> {
        signals
            .iter()
            .map(|s| AttestedSignal {
                id: &s.id,
                category: &s.category,
                value: s.value,
                timestamp: s.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            })
            .collect()
    }

    /// Registry counters.
    pub async fn stats(&self) -> Result<RegistryStats> {
        Ok(RegistryStats {
            adapter_count: self.adapters.read().await.len(),
            raw_signal_count: self.raw.len().await?,
            normalized_signal_count: self.normalized.len().await?,
        })
    }

    /// Drop every stored signal. Adapters stay registered.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.collecting.lock().await;
        for signal in self.normalized.all().await? {
            self.normalized.remove(&signal.id).await?;
        }
        for signal in self.raw.all().await? {
            self.raw.remove(&signal.id).await?;
        }
        Ok(())
    }
}

impl Default for SignalRegistry {
    fn default() -> Self {
        Self::new()
    }
}
