//! crates/progression_core/src/domain.rs
//!
//! Defines the pure, core data structures for the progression engine.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

pub type QuestionId = i64;

/// Score every topic starts from for a fresh learner.
pub const DEFAULT_MASTERY: f64 = 0.5;

//=========================================================================================
// Questions
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Recursion,
    FileIo,
    Oop,
    Loops,
    StringManipulation,
}

impl Topic {
    /// The fixed topic order. Weakest-topic selection breaks ties by position in this list.
    pub const ALL: [Topic; 5] = [
        Topic::Recursion,
        Topic::FileIo,
        Topic::Oop,
        Topic::Loops,
        Topic::StringManipulation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Recursion => "Recursion",
            Topic::FileIo => "File I/O",
            Topic::Oop => "OOP",
            Topic::Loops => "Loops",
            Topic::StringManipulation => "String Manipulation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A practice question as served by the question repository.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    pub topic: Topic,
    pub difficulty: Difficulty,
}

/// The raw judgement returned by the correctness oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub label: String,
}

impl Verdict {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Only the exact label `correct` counts as a success.
    pub fn is_correct(&self) -> bool {
        self.label == "correct"
    }
}

//=========================================================================================
// Adaptive assessment
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RoundOne,
    WeakTopic,
    Done,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::RoundOne => "round1",
            Phase::WeakTopic => "weakTopic",
            Phase::Done => "done",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "round1" => Some(Phase::RoundOne),
            "weakTopic" => Some(Phase::WeakTopic),
            "done" => Some(Phase::Done),
            _ => None,
        }
    }
}

/// Per-topic mastery scores, stored in the fixed order of [`Topic::ALL`].
#[derive(Debug, Clone, PartialEq)]
pub struct TopicMastery {
    scores: [f64; 5],
}

impl Default for TopicMastery {
    fn default() -> Self {
        Self {
            scores: [DEFAULT_MASTERY; 5],
        }
    }
}

impl TopicMastery {
    pub fn get(&self, topic: Topic) -> f64 {
        self.scores[topic.index()]
    }

    /// Stores `value` clamped to `[0, 1]`.
    pub fn set(&mut self, topic: Topic, value: f64) {
        self.scores[topic.index()] = value.clamp(0.0, 1.0);
    }

    /// Iterates topics in their fixed order.
    pub fn iter(&self) -> impl Iterator<Item = (Topic, f64)> + '_ {
        Topic::ALL.into_iter().map(|t| (t, self.get(t)))
    }
}

/// What a round was assembled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundKind {
    /// The fixed first round covering every topic.
    Diagnostic,
    /// A focused round drawn from one weak topic.
    WeakTopic(Topic),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundQuestion {
    pub question_id: QuestionId,
    pub topic: Topic,
    pub attempts: u8,
    pub correct: bool,
    pub done: bool,
}

impl RoundQuestion {
    pub fn new(question: &Question) -> Self {
        Self {
            question_id: question.id,
            topic: question.topic,
            attempts: 0,
            correct: false,
            done: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    pub round_number: u32,
    pub kind: RoundKind,
    pub questions: Vec<RoundQuestion>,
    pub completed: bool,
}

impl Round {
    pub fn all_done(&self) -> bool {
        self.questions.iter().all(|q| q.done)
    }

    pub fn first_open(&self) -> Option<&RoundQuestion> {
        self.questions.iter().find(|q| !q.done)
    }
}

/// A learner's adaptive-assessment state.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnerProfile {
    pub learner_id: String,
    pub phase: Phase,
    pub mastery: TopicMastery,
    pub total_score: u64,
    pub rounds: Vec<Round>,
}

impl LearnerProfile {
    pub fn new(learner_id: impl Into<String>) -> Self {
        Self {
            learner_id: learner_id.into(),
            phase: Phase::RoundOne,
            mastery: TopicMastery::default(),
            total_score: 0,
            rounds: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub learner_id: String,
    pub total_score: u64,
}

//=========================================================================================
// Challenges
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChallengeStatus {
    Pending,
    Active,
    Completed,
}

impl ChallengeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeStatus::Pending => "pending",
            ChallengeStatus::Active => "active",
            ChallengeStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ChallengeStatus::Pending),
            "active" => Some(ChallengeStatus::Active),
            "completed" => Some(ChallengeStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: String,
    pub accepted: bool,
}

/// A question snapshotted into a challenge at creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeQuestion {
    pub question_id: QuestionId,
    pub prompt: String,
}

/// One row of the final ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub participant: String,
    pub total_score: u32,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeResult {
    pub winner: Option<String>,
    pub details: Vec<Standing>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeSession {
    pub id: Uuid,
    pub creator: String,
    pub participants: Vec<Participant>,
    pub questions: Vec<ChallengeQuestion>,
    pub difficulty: Difficulty,
    pub status: ChallengeStatus,
    pub time_limit_secs: u32,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub result: Option<ChallengeResult>,
}

impl ChallengeSession {
    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn accepted_participants(&self) -> impl Iterator<Item = &str> {
        self.participants
            .iter()
            .filter(|p| p.accepted)
            .map(|p| p.user_id.as_str())
    }

    /// The snapshotted question with this id, if it belongs to the session.
    pub fn question(&self, question_id: QuestionId) -> Option<&ChallengeQuestion> {
        self.questions.iter().find(|q| q.question_id == question_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    Active,
    Completed,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Active => "active",
            SubmissionStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(SubmissionStatus::Active),
            "completed" => Some(SubmissionStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionEntry {
    pub question_id: QuestionId,
    pub answer: String,
    pub attempts: u8,
    pub correct: bool,
    /// Seconds the participant reports spending on the question.
    pub time_taken: Option<f64>,
}

/// A participant's answer ledger within one challenge session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeSubmission {
    pub session_id: Uuid,
    pub participant: String,
    pub entries: Vec<SubmissionEntry>,
    pub total_score: u32,
    pub status: SubmissionStatus,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ChallengeSubmission {
    pub fn new(session_id: Uuid, participant: impl Into<String>) -> Self {
        Self {
            session_id,
            participant: participant.into(),
            entries: Vec::new(),
            total_score: 0,
            status: SubmissionStatus::Active,
            finished_at: None,
        }
    }
}
