//! Error taxonomy shared by every pipeline stage.

use serde::{Deserialize, Serialize};

/// Error types for governance pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// Malformed or missing input on construction
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Unknown id dereferenced
    #[error("{kind} not found: {id}")]
    NotFoundError { kind: &'static str, id: String },

    /// Operation invalid for the current lifecycle state
    #[error("State error: {0}")]
    StateError(String),

    /// Reasoning provider or adapter I/O failure
    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// Backing store failure
    #[error("Store error: {0}")]
    StoreError(String),
}

impl OracleError {
    /// Shorthand for a not-found error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFoundError { kind, id: id.into() }
    }

    /// Stable category of this error.
    ///
    /// Transport layers map this to their own status codes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) => ErrorKind::Validation,
            Self::NotFoundError { .. } => ErrorKind::NotFound,
            Self::StateError(_) => ErrorKind::State,
            Self::ExternalServiceError(_) => ErrorKind::ExternalService,
            Self::StoreError(_) => ErrorKind::Store,
        }
    }

    /// Caller mistakes are surfaced unmodified; the rest are transient.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::NotFound | ErrorKind::State
        )
    }
}

impl From<serde_json::Error> for OracleError {
    fn from(err: serde_json::Error) -> Self {
        Self::ValidationError(format!("serialization failed: {}", err))
    }
}

/// Category of an [`OracleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    State,
    ExternalService,
    Store,
}

pub type Result<T> = std::result::Result<T, OracleError>;
