//! crates/progression_core/src/ports.rs
//!
//! Defines the service contracts (traits) the engine depends on.
//! These traits form the boundary of the hexagonal architecture, so the engine
//! never sees a concrete database, classifier or clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ChallengeSession, ChallengeSubmission, Difficulty, LeaderboardEntry, LearnerProfile,
    Question, QuestionId, Topic, Verdict,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// External collaborators
//=========================================================================================

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Returns up to `count` distinct questions chosen at random.
    /// `topic = None` samples across every topic.
    async fn sample(
        &self,
        topic: Option<Topic>,
        difficulty: Difficulty,
        count: usize,
    ) -> PortResult<Vec<Question>>;

    async fn get_question(&self, question_id: QuestionId) -> PortResult<Question>;
}

#[async_trait]
pub trait CorrectnessOracle: Send + Sync {
    /// Judges a free-text answer to a question prompt.
    async fn classify(&self, prompt: &str, answer: &str) -> PortResult<Verdict>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

//=========================================================================================
// Persistence
//=========================================================================================

#[async_trait]
pub trait LearnerStore: Send + Sync {
    async fn load_profile(&self, learner_id: &str) -> PortResult<Option<LearnerProfile>>;

    /// Replaces the whole profile document in one write.
    async fn save_profile(&self, profile: &LearnerProfile) -> PortResult<()>;

    /// Highest total scores first.
    async fn top_scores(&self, limit: usize) -> PortResult<Vec<LeaderboardEntry>>;
}

#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn insert_session(&self, session: &ChallengeSession) -> PortResult<()>;

    async fn get_session(&self, session_id: Uuid) -> PortResult<ChallengeSession>;

    async fn save_session(&self, session: &ChallengeSession) -> PortResult<()>;

    /// Pending sessions in which `user_id` is a participant who has not accepted yet.
    async fn pending_for(&self, user_id: &str) -> PortResult<Vec<ChallengeSession>>;

    /// Ids of active sessions whose clock ran out at or before `now`.
    async fn expired_active_sessions(&self, now: DateTime<Utc>) -> PortResult<Vec<Uuid>>;

    async fn get_submission(
        &self,
        session_id: Uuid,
        participant: &str,
    ) -> PortResult<Option<ChallengeSubmission>>;

    async fn submissions_for_session(
        &self,
        session_id: Uuid,
    ) -> PortResult<Vec<ChallengeSubmission>>;

    async fn save_submission(&self, submission: &ChallengeSubmission) -> PortResult<()>;
}
