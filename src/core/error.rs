use thiserror::Error;

use crate::services::engine::EngineError;

/// Errors surfaced by the matching core. Every failure aborts the whole call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("Attestation invalid: {0}")]
    AttestationInvalid(String),

    #[error("Not registered: {0}")]
    NotRegistered(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Encryption engine error: {0}")]
    Engine(EngineError),
}

impl From<EngineError> for MatchError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::AttestationInvalid(reason) => MatchError::AttestationInvalid(reason),
            other => MatchError::Engine(other),
        }
    }
}

pub type MatchResult<T> = Result<T, MatchError>;
