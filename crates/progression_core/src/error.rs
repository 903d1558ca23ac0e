//! crates/progression_core/src/error.rs
//!
//! The engine's error type. Every variant belongs to exactly one [`ErrorKind`],
//! which is what outer layers use to pick a status code and a log level.

use crate::domain::{Difficulty, QuestionId};
use crate::ports::PortError;

/// Coarse classification of engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    /// Expected during normal operation; never a fault.
    Precondition,
    Upstream,
    Invariant,
}

/// Diagnostics attached to a challenge that cannot be finalized yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeProgress {
    pub all_completed: bool,
    pub timer_expired: bool,
    pub participants_completed: usize,
    pub total_participants: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Question {0} is not active or already done")]
    QuestionNotActive(QuestionId),

    #[error("Maximum attempts reached for question {0}")]
    MaxAttemptsReached(QuestionId),

    #[error("Challenge is still in progress")]
    ChallengeInProgress(ChallengeProgress),

    #[error("User {0} is not in this challenge session")]
    NotAParticipant(String),

    #[error("Challenge is not accepting answers")]
    ChallengeNotActive,

    #[error("Question {0} is not part of this challenge")]
    QuestionNotInChallenge(QuestionId),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Question bank has only {got} of {wanted} {difficulty} questions for {scope}")]
    InsufficientQuestions {
        scope: String,
        difficulty: Difficulty,
        wanted: usize,
        got: usize,
    },

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::QuestionNotActive(_)
            | EngineError::MaxAttemptsReached(_)
            | EngineError::ChallengeInProgress(_)
            | EngineError::NotAParticipant(_)
            | EngineError::ChallengeNotActive
            | EngineError::QuestionNotInChallenge(_) => ErrorKind::Precondition,
            EngineError::Upstream(_) => ErrorKind::Upstream,
            EngineError::InsufficientQuestions { .. } | EngineError::InvariantViolation(_) => {
                ErrorKind::Invariant
            }
        }
    }
}

impl From<PortError> for EngineError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => EngineError::NotFound(what),
            PortError::Unavailable(msg) | PortError::Unexpected(msg) => EngineError::Upstream(msg),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
