//! Agora Engine - from raw signals to trust scores
//!
//! Runs the governance pipeline over the shared data model in `agora-core`:
//!
//! ```text
//! ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ SignalRegistry│──►│DetectionEngine│──►│   Moderator   │
//! │  (adapters)   │   │ (detectors)   │   │ (agent panel) │
//! └───────────────┘   └───────────────┘   └───────┬───────┘
//!                                                 │ DecisionPacket
//! ┌───────────────┐   ┌───────────────┐   ┌───────▼───────┐
//! │ TrustManager  │◄──│OutcomeTracker │◄──│ VotingSystem  │
//! │               │   │ (KPIs, proofs)│   │ + Delegation  │
//! └───────────────┘   └───────────────┘   └───────────────┘
//! ```
//!
//! Every stage can be used on its own; [`GovernancePipeline`] wires them
//! together for a full cycle.

pub mod config;
pub mod consensus;
pub mod detection;
pub mod governance;
pub mod outcome;
pub mod pipeline;
pub mod signal;

pub use config::OracleConfig;
pub use consensus::{DeliberationOutcome, Deliberator, GovernanceAgent, Moderator, Synthesizer};
pub use detection::{
    AnomalyDetector, DetectionEngine, IssueDetector, ProposalDraftGenerator, ThresholdDetector,
    TrendDetector,
};
pub use governance::{DelegationManager, DelegationMatch, ProposalOptions, VotingSystem};
pub use outcome::{BaselineKpiSource, KpiSource, OutcomeTracker, TrustManager};
pub use pipeline::{CycleReport, GovernancePipeline, OutcomeReport};
pub use signal::{SignalAdapter, SignalRegistry};
