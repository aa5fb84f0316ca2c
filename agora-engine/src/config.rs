//! Configuration for the governance pipeline.

use serde::{Deserialize, Serialize};

/// Configuration for every pipeline stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Signal registry configuration
    pub registry: RegistryConfig,
    /// Anomaly detector configuration
    pub anomaly: AnomalyConfig,
    /// Trend detector configuration
    pub trend: TrendConfig,
    /// Moderator and agent configuration
    pub consensus: ConsensusConfig,
    /// Voting configuration
    pub voting: VotingConfig,
    /// Outcome tracker configuration
    pub outcome: OutcomeConfig,
    /// Trust manager configuration
    pub trust: TrustConfig,
}

impl OracleConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Signal registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Ceiling on stored normalized signals
    pub max_signals: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_signals: 10_000,
        }
    }
}

/// Statistical anomaly detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// |z| above this marks an anomaly
    pub std_dev_threshold: f64,
    /// Minimum group size before statistics are computed
    pub min_samples: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            std_dev_threshold: 2.0,
            min_samples: 5,
        }
    }
}

/// Trend detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Minimum points in a category window
    pub min_data_points: usize,
    /// Relative slope (per step, as a fraction of the mean) that counts as a trend
    pub trend_threshold: f64,
    /// Restrict to these categories (empty = all)
    pub categories: Vec<String>,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            min_data_points: 5,
            trend_threshold: 0.1,
            categories: Vec::new(),
        }
    }
}

/// Moderator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Consensus score at or above which an action proposal is recommended
    pub action_cutoff: f64,
    /// Timeout on each agent's reasoning call (ms)
    pub agent_timeout_ms: u64,
    /// Maximum agents deliberating at once
    pub max_concurrent_agents: usize,
    /// Overall deliberation deadline (ms); none by default
    pub deadline_ms: Option<u64>,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            action_cutoff: 0.7,
            agent_timeout_ms: 30_000,
            max_concurrent_agents: 4,
            deadline_ms: None,
        }
    }
}

/// Voting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    /// Default minimum distinct voters
    pub default_quorum: u32,
    /// Default pass threshold (percentage, 0-100)
    pub default_threshold: u32,
    /// Voting period once activated (seconds)
    pub voting_period_secs: u64,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            default_quorum: 100,
            default_threshold: 50,
            voting_period_secs: 7 * 24 * 60 * 60, // 7 days
        }
    }
}

/// Outcome tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeConfig {
    /// Success rate (percentage) at or above which an outcome counts as successful
    pub success_threshold: f64,
    /// Identity recorded as executor when none is given
    pub default_executor: String,
}

impl Default for OutcomeConfig {
    fn default() -> Self {
        Self {
            success_threshold: 80.0,
            default_executor: "system".to_string(),
        }
    }
}

/// Trust manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Score assigned to a new entity
    pub initial_score: f64,
    /// Maximum gain per successful outcome
    pub success_weight: f64,
    /// Maximum loss per failed outcome
    pub failure_weight: f64,
    /// Per-step decay applied to older proofs in the weighted view
    pub decay_rate: f64,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            initial_score: 50.0,
            success_weight: 5.0,
            failure_weight: 10.0,
            decay_rate: 0.95,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OracleConfig::default();
        assert_eq!(config.registry.max_signals, 10_000);
        assert_eq!(config.anomaly.min_samples, 5);
        assert_eq!(config.voting.default_threshold, 50);
        assert_eq!(config.trust.decay_rate, 0.95);
        assert!(config.consensus.deadline_ms.is_none());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = OracleConfig::default();
        config.voting.default_quorum = 3;
        let yaml = config.to_yaml().unwrap();
        let parsed = OracleConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.voting.default_quorum, 3);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "registry:\n  max_signals: 50\nconsensus:\n  action_cutoff: 0.5\n";
        let config = OracleConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.registry.max_signals, 50);
        assert_eq!(config.consensus.action_cutoff, 0.5);
        assert_eq!(config.consensus.agent_timeout_ms, 30_000);
        assert_eq!(config.trust.initial_score, 50.0);
    }
}
