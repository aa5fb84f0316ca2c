//! Proposal lifecycle and weighted voting.
//!
//! ```text
//! pending ──activate──► active ──finalize──► passed ──execute──► executed
//!    │                    │            └───► rejected
//!    └──────cancel────────┴──► cancelled
//! ```
//!
//! Every mutation of a proposal holds that proposal's key lock, so votes on
//! one proposal are serialized while votes on different proposals proceed
//! independently.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use agora_core::{
    DecisionPacket, KeyLocks, KeyedStore, MemoryStore, OracleError, Proposal, ProposalStatus,
    Result, Vote, VoteChoice, VoteTally,
};

use crate::config::VotingConfig;

/// Largest total weight a proposal may accumulate, so percentage math cannot overflow.
pub const MAX_TOTAL_WEIGHT: u128 = u128::MAX / 100;

/// Per-proposal overrides of the configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProposalOptions {
    pub quorum: Option<u32>,
    pub threshold: Option<u32>,
    pub voting_period_secs: Option<u64>,
    pub onchain_id: Option<u64>,
}

/// Tally a vote log against a proposal's quorum and threshold.
///
/// Quorum counts distinct voters, not weight. Abstentions count toward the
/// total but not toward the pass percentage.
pub fn tally(proposal: &Proposal, votes: &[Vote]) -> VoteTally {
    let mut for_votes: u128 = 0;
    let mut against_votes: u128 = 0;
    let mut abstain_votes: u128 = 0;
    for vote in votes {
        let bucket = match vote.choice {
            VoteChoice::For => &mut for_votes,
            VoteChoice::Against => &mut against_votes,
            VoteChoice::Abstain => &mut abstain_votes,
        };
        *bucket = bucket.saturating_add(vote.weight);
    }

    let voters: HashSet<&str> = votes.iter().map(|v| v.voter.as_str()).collect();
    let voter_count = u32::try_from(voters.len()).unwrap_or(u32::MAX);
    let quorum_reached = voter_count >= proposal.quorum;

    let decisive = for_votes.saturating_add(against_votes);
    let threshold = u128::from(proposal.threshold);
    let meets_threshold = if decisive > 0 {
        for_votes.saturating_mul(100) >= threshold.saturating_mul(decisive)
    } else {
        threshold == 0
    };

    VoteTally {
        proposal_id: proposal.id.clone(),
        for_votes,
        against_votes,
        abstain_votes,
        total_votes: decisive.saturating_add(abstain_votes),
        voter_count,
        participation_rate: if proposal.quorum == 0 {
            0.0
        } else {
            f64::from(voter_count) / f64::from(proposal.quorum)
        },
        quorum_reached,
        passed: quorum_reached && meets_threshold,
    }
}

/// Manages proposals and their vote logs.
pub struct VotingSystem {
    config: VotingConfig,
    proposals: Arc<dyn KeyedStore<Proposal>>,
    /// Vote log per proposal id
    votes: Arc<dyn KeyedStore<Vec<Vote>>>,
    locks: KeyLocks,
}

impl VotingSystem {
    pub fn new() -> Self {
        Self::with_config(VotingConfig::default())
    }

    pub fn with_config(config: VotingConfig) -> Self {
        Self::with_stores(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    /// Use external stores for proposals and vote logs.
    pub fn with_stores(
        config: VotingConfig,
        proposals: Arc<dyn KeyedStore<Proposal>>,
        votes: Arc<dyn KeyedStore<Vec<Vote>>>,
    ) -> Self {
        Self {
            config,
            proposals,
            votes,
            locks: KeyLocks::new(),
        }
    }

    pub fn config(&self) -> &VotingConfig {
        &self.config
    }

    /// Create a pending proposal from a decision packet.
    pub async fn create_proposal(
        &self,
        decision_packet: DecisionPacket,
        proposer: impl Into<String>,
        options: ProposalOptions,
    ) -> Result<Proposal> {
        let proposer = proposer.into();
        if proposer.is_empty() {
            return Err(OracleError::ValidationError("proposer is required".to_string()));
        }
        let quorum = options.quorum.unwrap_or(self.config.default_quorum);
        let threshold = options.threshold.unwrap_or(self.config.default_threshold);
        if quorum == 0 {
            return Err(OracleError::ValidationError("quorum must be at least 1".to_string()));
        }
        if threshold > 100 {
            return Err(OracleError::ValidationError(format!(
                "threshold must be a percentage, got {}",
                threshold
            )));
        }

        let secs = options.voting_period_secs.unwrap_or(self.config.voting_period_secs);
        let now = Utc::now();
        let voting_ends_at = i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|period| now.checked_add_signed(period))
            .ok_or_else(|| OracleError::ValidationError(format!("voting period {}s is too long", secs)))?;
        let proposal = Proposal {
            id: uuid::Uuid::new_v4().to_string(),
            onchain_id: options.onchain_id,
            decision_packet,
            proposer,
            status: ProposalStatus::Pending,
            voting_starts_at: now,
            voting_ends_at,
            quorum,
            threshold,
            created_at: now,
            executed_at: None,
        };

        self.proposals.put(&proposal.id, proposal.clone()).await?;
        self.votes.put(&proposal.id, Vec::new()).await?;
        info!(
            proposal_id = %proposal.id,
            proposer = %proposal.proposer,
            quorum,
            threshold,
            "Proposal created"
        );
        Ok(proposal)
    }

    /// Open voting. The proposal keeps its configured period, starting now.
    pub async fn activate_proposal(&self, proposal_id: &str) -> Result<Proposal> {
        let _guard = self.locks.lock(proposal_id).await;
        let mut proposal = self.require(proposal_id).await?;
        if proposal.status != ProposalStatus::Pending {
            return Err(Self::invalid(&proposal, "activate"));
        }

        let period = proposal.voting_ends_at - proposal.voting_starts_at;
        let now = Utc::now();
        proposal.status = ProposalStatus::Active;
        proposal.voting_starts_at = now;
        proposal.voting_ends_at = now.checked_add_signed(period).unwrap_or(proposal.voting_ends_at);
        self.proposals.put(proposal_id, proposal.clone()).await?;

        info!(proposal_id, ends_at = %proposal.voting_ends_at, "Proposal activated");
        Ok(proposal)
    }

    /// Record a weighted vote.
    pub async fn cast_vote(
        &self,
        proposal_id: &str,
        voter: impl Into<String>,
        choice: VoteChoice,
        weight: u128,
        reason: Option<String>,
    ) -> Result<Vote> {
        let voter = voter.into();
        if voter.is_empty() {
            return Err(OracleError::ValidationError("voter is required".to_string()));
        }

        let _guard = self.locks.lock(proposal_id).await;
        let proposal = self.require(proposal_id).await?;
        if proposal.status != ProposalStatus::Active {
            return Err(OracleError::StateError(format!(
                "proposal {} is not active for voting (status: {})",
                proposal_id,
                proposal.status.as_str()
            )));
        }
        let now = Utc::now();
        if now > proposal.voting_ends_at {
            return Err(OracleError::StateError(format!(
                "voting period for proposal {} has ended",
                proposal_id
            )));
        }

        let mut log = self.votes.get(proposal_id).await?.unwrap_or_default();
        if log.iter().any(|v| v.voter == voter) {
            return Err(OracleError::StateError(format!(
                "voter {} has already voted on proposal {}",
                voter, proposal_id
            )));
        }
        let total = log
            .iter()
            .try_fold(weight, |acc, v| acc.checked_add(v.weight))
            .filter(|total| *total <= MAX_TOTAL_WEIGHT);
        if total.is_none() {
            return Err(OracleError::ValidationError(format!(
                "vote weight {} would exceed the total weight limit of proposal {}",
                weight, proposal_id
            )));
        }

        let vote = Vote {
            id: uuid::Uuid::new_v4().to_string(),
            proposal_id: proposal_id.to_string(),
            voter,
            choice,
            weight,
            reason,
            timestamp: now,
            tx_hash: None,
        };
        log.push(vote.clone());
        self.votes.put(proposal_id, log).await?;

        debug!(proposal_id, voter = %vote.voter, choice = ?choice, weight = %weight, "Vote cast");
        Ok(vote)
    }

    /// Recompute the tally from the vote log.
    pub async fn tally_votes(&self, proposal_id: &str) -> Result<VoteTally> {
        let proposal = self.require(proposal_id).await?;
        let votes = self.votes.get(proposal_id).await?.unwrap_or_default();
        Ok(tally(&proposal, &votes))
    }

    /// Close voting and record the result. Only active proposals can be finalized.
    pub async fn finalize_proposal(&self, proposal_id: &str) -> Result<Proposal> {
        let _guard = self.locks.lock(proposal_id).await;
        let mut proposal = self.require(proposal_id).await?;
        if proposal.status != ProposalStatus::Active {
            return Err(Self::invalid(&proposal, "finalize"));
        }

        let votes = self.votes.get(proposal_id).await?.unwrap_or_default();
        let result = tally(&proposal, &votes);
        proposal.status = if result.passed {
            ProposalStatus::Passed
        } else {
            ProposalStatus::Rejected
        };
        self.proposals.put(proposal_id, proposal.clone()).await?;

        info!(
            proposal_id,
            status = proposal.status.as_str(),
            voters = result.voter_count,
            quorum_reached = result.quorum_reached,
            "Proposal finalized"
        );
        Ok(proposal)
    }

    /// Mark a passed proposal executed.
    pub async fn execute_proposal(&self, proposal_id: &str) -> Result<Proposal> {
        let _guard = self.locks.lock(proposal_id).await;
        let mut proposal = self.require(proposal_id).await?;
        if proposal.status != ProposalStatus::Passed {
            return Err(Self::invalid(&proposal, "execute"));
        }
        proposal.status = ProposalStatus::Executed;
        proposal.executed_at = Some(Utc::now());
        self.proposals.put(proposal_id, proposal.clone()).await?;

        info!(proposal_id, "Proposal executed");
        Ok(proposal)
    }

    /// Cancel a pending or active proposal.
    pub async fn cancel_proposal(&self, proposal_id: &str) -> Result<Proposal> {
        let _guard = self.locks.lock(proposal_id).await;
        let mut proposal = self.require(proposal_id).await?;
        if !matches!(proposal.status, ProposalStatus::Pending | ProposalStatus::Active) {
            return Err(Self::invalid(&proposal, "cancel"));
        }
        proposal.status = ProposalStatus::Cancelled;
        self.proposals.put(proposal_id, proposal.clone()).await?;

        info!(proposal_id, "Proposal cancelled");
        Ok(proposal)
    }

    pub async fn get_proposal(&self, proposal_id: &str) -> Result<Option<Proposal>> {
        self.proposals.get(proposal_id).await
    }

    /// Votes on a proposal in casting order.
    pub async fn get_votes(&self, proposal_id: &str) -> Result<Vec<Vote>> {
        self.require(proposal_id).await?;
        Ok(self.votes.get(proposal_id).await?.unwrap_or_default())
    }

    /// Proposals, oldest first, optionally filtered by status.
    pub async fn list_proposals(&self, status: Option<ProposalStatus>) -> Result<Vec<Proposal>> {
        let mut proposals = match status {
            Some(status) => self.proposals.list(&|p: &Proposal| p.status == status).await?,
            None => self.proposals.all().await?,
        };
        proposals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(proposals)
    }

    async fn require(&self, proposal_id: &str) -> Result<Proposal> {
        self.proposals
            .get(proposal_id)
            .await?
            .ok_or_else(|| OracleError::not_found("proposal", proposal_id))
    }

    fn invalid(proposal: &Proposal, action: &str) -> OracleError {
        OracleError::StateError(format!(
            "cannot {} proposal {} in status {}",
            action,
            proposal.id,
            proposal.status.as_str()
        ))
    }
}

impl Default for VotingSystem {
    fn default() -> Self {
        Self::new()
    }
}
