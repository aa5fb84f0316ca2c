//! Outcome tracking and trust.
//!
//! Executions are measured against the KPI plan of the decision that
//! produced them; the resulting proofs feed entity trust scores.

mod tracker;
mod trust;

pub use tracker::{
    baseline_plan, deviation, BaselineKpiSource, KpiSource, OutcomeTracker, ISSUE_RECURRENCE,
    RESOLUTION_TIME,
};
pub use trust::{EntityHistory, TrustExport, TrustManager};
