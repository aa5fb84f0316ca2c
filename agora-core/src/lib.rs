//! Agora Core - shared data model for the governance pipeline
//!
//! Every stage of the pipeline speaks the types defined here:
//!
//! ```text
//! RawSignal ─▶ NormalizedSignal ─▶ DetectedIssue ─▶ AgentOpinion
//!                                                       │
//!          TrustScore ◀─ OutcomeProof ◀─ ExecutionRecord │
//!                                              ▲         ▼
//!                                   Vote/Tally ─┴─ Proposal ◀─ DecisionPacket
//! ```
//!
//! Besides the data model this crate provides the error taxonomy, the
//! content hash used for attestations, and the keyed store abstraction that
//! stateful components persist through.

pub mod deliberation;
pub mod error;
pub mod governance;
pub mod hash;
pub mod issue;
pub mod outcome;
pub mod signal;
pub mod store;

pub use deliberation::*;
pub use error::{ErrorKind, OracleError, Result};
pub use governance::*;
pub use hash::{content_hash, verify_hash};
pub use issue::*;
pub use outcome::*;
pub use signal::*;
pub use store::{KeyGuard, KeyLocks, KeyedStore, MemoryStore, SecondaryIndex};
