//! Trust scores derived from outcome proofs.
//!
//! Two views coexist. The stored score moves incrementally with every
//! recorded outcome; the weighted reputation is recomputed from the full
//! proof history with older proofs decayed.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use agora_core::{
    EntityType, KeyLocks, KeyedStore, MemoryStore, OutcomeProof, Result, TrustScore,
};

use crate::config::TrustConfig;

/// Proof history of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityHistory {
    pub entity_id: String,
    pub proofs: Vec<OutcomeProof>,
}

/// Snapshot of every score and history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustExport {
    pub scores: Vec<TrustScore>,
    pub history: Vec<EntityHistory>,
}

/// Maintains trust scores per entity.
pub struct TrustManager {
    config: TrustConfig,
    scores: Arc<dyn KeyedStore<TrustScore>>,
    /// Proofs per entity in recording order
    history: Arc<dyn KeyedStore<Vec<OutcomeProof>>>,
    locks: KeyLocks,
}

impl TrustManager {
    pub fn new() -> Self {
        Self::with_config(TrustConfig::default())
    }

    pub fn with_config(config: TrustConfig) -> Self {
        Self::with_stores(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    pub fn with_stores(
        config: TrustConfig,
        scores: Arc<dyn KeyedStore<TrustScore>>,
        history: Arc<dyn KeyedStore<Vec<OutcomeProof>>>,
    ) -> Self {
        Self {
            config,
            scores,
            history,
            locks: KeyLocks::new(),
        }
    }

    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    /// Credit or debit an entity with an outcome.
    ///
    /// Success adds up to `success_weight` scaled by the success rate; failure
    /// removes up to `failure_weight` scaled by the failure rate. The score
    /// stays within [0, 100].
    pub async fn record_outcome(
        &self,
        entity_id: &str,
        entity_type: EntityType,
        proof: &OutcomeProof,
    ) -> Result<TrustScore> {
        let _guard = self.locks.lock(entity_id).await;
        let mut score = match self.scores.get(entity_id).await? {
            Some(score) => score,
            None => TrustScore {
                entity_id: entity_id.to_string(),
                entity_type,
                score: self.config.initial_score,
                total_decisions: 0,
                successful_decisions: 0,
                last_updated: Utc::now(),
            },
        };

        let rate = proof.success_rate / 100.0;
        score.total_decisions += 1;
        if proof.overall_success {
            score.successful_decisions += 1;
            score.score = (score.score + self.config.success_weight * rate).min(100.0);
        } else {
            score.score = (score.score - self.config.failure_weight * (1.0 - rate)).max(0.0);
        }
        score.last_updated = Utc::now();

        let previous = self.history.get(entity_id).await?;
        let mut history = previous.clone().unwrap_or_default();
        history.push(proof.clone());
        self.history.put(entity_id, history).await?;

        // History and score must agree; undo the append if the score is not saved
        if let Err(e) = self.scores.put(entity_id, score.clone()).await {
            let restored = match previous {
                Some(proofs) => self.history.put(entity_id, proofs).await,
                None => self.history.remove(entity_id).await.map(|_| ()),
            };
            if let Err(restore) = restored {
                warn!(entity_id, error = %restore, "Failed to roll back trust history");
            }
            return Err(e);
        }

        info!(
            entity_id,
            entity_type = ?score.entity_type,
            success = proof.overall_success,
            score = score.score,
            "Trust score updated"
        );
        Ok(score)
    }

    pub async fn get_score(&self, entity_id: &str) -> Result<Option<TrustScore>> {
        self.scores.get(entity_id).await
    }

    pub async fn scores_by_type(&self, entity_type: EntityType) -> Result<Vec<TrustScore>> {
        let mut scores = self
            .scores
            .list(&|s: &TrustScore| s.entity_type == entity_type)
            .await?;
        scores.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        Ok(scores)
    }

    /// Highest scores of a type, best first.
    pub async fn top_performers(&self, entity_type: EntityType, limit: usize) -> Result<Vec<TrustScore>> {
        let mut scores = self.scores_by_type(entity_type).await?;
        scores.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.entity_id.cmp(&b.entity_id)));
        scores.truncate(limit);
        Ok(scores)
    }

    /// Success rate averaged over the history with weight `decay_rate^i`
    /// for the i-th most recent proof. Entities without history get the
    /// initial score.
    pub async fn weighted_reputation(&self, entity_id: &str) -> Result<f64> {
        let mut history = self.history.get(entity_id).await?.unwrap_or_default();
        if history.is_empty() {
            return Ok(self.config.initial_score);
        }
        // Most recent first; ties go to the later recording
        history.reverse();
        history.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));

        let mut weight = 1.0;
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        for proof in &history {
            weighted_sum += proof.success_rate * weight;
            total_weight += weight;
            weight *= self.config.decay_rate;
        }

        Ok(if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            self.config.initial_score
        })
    }

    /// Proofs recorded for an entity, oldest first.
    pub async fn history(&self, entity_id: &str) -> Result<Vec<OutcomeProof>> {
        Ok(self.history.get(entity_id).await?.unwrap_or_default())
    }

    /// Forget an entity. Returns whether it was known.
    pub async fn reset(&self, entity_id: &str) -> Result<bool> {
        let _guard = self.locks.lock(entity_id).await;
        let score = self.scores.remove(entity_id).await?;
        let history = self.history.remove(entity_id).await?;
        debug!(entity_id, "Trust score reset");
        Ok(score.is_some() || history.is_some())
    }

    /// Every score and history, ordered by entity id.
    pub async fn export(&self) -> Result<TrustExport> {
        let mut scores = self.scores.all().await?;
        scores.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

        let mut ids = self.history.keys().await?;
        ids.sort();
        let mut history = Vec::with_capacity(ids.len());
        for entity_id in ids {
            if let Some(proofs) = self.history.get(&entity_id).await? {
                history.push(EntityHistory { entity_id, proofs });
            }
        }
        Ok(TrustExport { scores, history })
    }
}

impl Default for TrustManager {
    fn default() -> Self {
        Self::new()
    }
}
