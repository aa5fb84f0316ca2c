//! Human governance: weighted voting on proposals and conditional delegation.

mod delegation;
mod voting;

pub use delegation::{evaluate as evaluate_condition, templates, DelegationManager, DelegationMatch};
pub use voting::{tally, ProposalOptions, VotingSystem, MAX_TOTAL_WEIGHT};
