pub mod adaptive;
pub mod challenge;
pub mod domain;
pub mod error;
pub mod judge;
pub mod locks;
pub mod ports;

#[cfg(test)]
mod testing;

pub use adaptive::{AdaptiveController, AnswerOutcome};
pub use challenge::{ChallengeService, NewChallenge, RecordedAnswer};
pub use domain::{
    ChallengeQuestion, ChallengeResult, ChallengeSession, ChallengeStatus, ChallengeSubmission,
    Difficulty, LeaderboardEntry, LearnerProfile, Participant, Phase, Question, QuestionId, Round,
    RoundKind, RoundQuestion, Standing, SubmissionEntry, SubmissionStatus, Topic, TopicMastery,
    Verdict,
};
pub use error::{ChallengeProgress, EngineError, EngineResult, ErrorKind};
pub use ports::{
    ChallengeStore, Clock, CorrectnessOracle, LearnerStore, PortError, PortResult,
    QuestionRepository, SystemClock,
};
