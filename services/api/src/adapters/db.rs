//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the PostgreSQL implementation of
//! the `QuestionRepository`, `LearnerStore` and `ChallengeStore` ports. Each
//! aggregate lives in one row; nested collections are stored as JSONB so a
//! save is always a single statement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use progression_core::domain::{
    ChallengeQuestion, ChallengeResult, ChallengeSession, ChallengeStatus, ChallengeSubmission,
    Difficulty, LeaderboardEntry, LearnerProfile, Participant, Phase, Question, QuestionId, Round,
    RoundKind, RoundQuestion, Standing, SubmissionEntry, SubmissionStatus, Topic, TopicMastery,
};
use progression_core::ports::{
    ChallengeStore, LearnerStore, PortError, PortResult, QuestionRepository,
};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter backed by a Postgres connection pool.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Inserts questions that are not in the table yet. Existing rows win.
    pub async fn seed_questions(&self, questions: &[Question]) -> Result<u64, sqlx::Error> {
        let mut inserted = 0;
        for q in questions {
            inserted += sqlx::query(
                "INSERT INTO questions (question_id, prompt, topic, difficulty) \
                 VALUES ($1, $2, $3, $4) ON CONFLICT (question_id) DO NOTHING",
            )
            .bind(q.id)
            .bind(&q.prompt)
            .bind(q.topic.as_str())
            .bind(q.difficulty.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        }
        info!("Seeded {} new questions", inserted);
        Ok(inserted)
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            PortError::Unavailable(e.to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn corrupt(what: &str, value: &str) -> PortError {
    PortError::Unexpected(format!("Stored {} '{}' is not recognised", what, value))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct QuestionRecord {
    question_id: i64,
    prompt: String,
    topic: String,
    difficulty: String,
}
impl QuestionRecord {
    fn to_domain(self) -> PortResult<Question> {
        Ok(Question {
            id: self.question_id,
            topic: Topic::parse(&self.topic).ok_or_else(|| corrupt("topic", &self.topic))?,
            difficulty: Difficulty::parse(&self.difficulty)
                .ok_or_else(|| corrupt("difficulty", &self.difficulty))?,
            prompt: self.prompt,
        })
    }
}

/// Round state as persisted in `learner_profiles.rounds`.
#[derive(Serialize, Deserialize)]
struct RoundDoc {
    round_number: u32,
    /// `None` for the diagnostic round, the topic name for a weak-topic round.
    weak_topic: Option<String>,
    questions: Vec<RoundQuestionDoc>,
    completed: bool,
}

#[derive(Serialize, Deserialize)]
struct RoundQuestionDoc {
    question_id: QuestionId,
    topic: String,
    attempts: u8,
    correct: bool,
    done: bool,
}

impl RoundDoc {
    fn from_domain(round: &Round) -> Self {
        Self {
            round_number: round.round_number,
            weak_topic: match round.kind {
                RoundKind::Diagnostic => None,
                RoundKind::WeakTopic(t) => Some(t.as_str().to_string()),
            },
            questions: round
                .questions
                .iter()
                .map(|q| RoundQuestionDoc {
                    question_id: q.question_id,
                    topic: q.topic.as_str().to_string(),
                    attempts: q.attempts,
                    correct: q.correct,
                    done: q.done,
                })
                .collect(),
            completed: round.completed,
        }
    }

    fn to_domain(self) -> PortResult<Round> {
        let kind = match self.weak_topic {
            None => RoundKind::Diagnostic,
            Some(t) => RoundKind::WeakTopic(Topic::parse(&t).ok_or_else(|| corrupt("topic", &t))?),
        };
        let questions = self
            .questions
            .into_iter()
            .map(|q| {
                Ok(RoundQuestion {
                    question_id: q.question_id,
                    topic: Topic::parse(&q.topic).ok_or_else(|| corrupt("topic", &q.topic))?,
                    attempts: q.attempts,
                    correct: q.correct,
                    done: q.done,
                })
            })
            .collect::<PortResult<Vec<_>>>()?;
        Ok(Round {
            round_number: self.round_number,
            kind,
            questions,
            completed: self.completed,
        })
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    learner_id: String,
    phase: String,
    mastery: Json<serde_json::Map<String, serde_json::Value>>,
    total_score: i64,
    rounds: Json<Vec<RoundDoc>>,
}
impl ProfileRecord {
    fn to_domain(self) -> PortResult<LearnerProfile> {
        let mut mastery = TopicMastery::default();
        for topic in Topic::ALL {
            if let Some(score) = self.mastery.0.get(topic.as_str()).and_then(|v| v.as_f64()) {
                mastery.set(topic, score);
            }
        }
        Ok(LearnerProfile {
            phase: Phase::parse(&self.phase).ok_or_else(|| corrupt("phase", &self.phase))?,
            learner_id: self.learner_id,
            mastery,
            total_score: self.total_score.max(0) as u64,
            rounds: self
                .rounds
                .0
                .into_iter()
                .map(RoundDoc::to_domain)
                .collect::<PortResult<Vec<_>>>()?,
        })
    }
}

fn mastery_doc(mastery: &TopicMastery) -> serde_json::Map<String, serde_json::Value> {
    mastery
        .iter()
        .map(|(topic, score)| (topic.as_str().to_string(), serde_json::Value::from(score)))
        .collect()
}

#[derive(FromRow)]
struct LeaderboardRecord {
    learner_id: String,
    total_score: i64,
}

/// Participant as persisted in `challenge_sessions.participants`.
/// The pending query matches on this exact shape.
#[derive(Serialize, Deserialize)]
struct ParticipantDoc {
    user: String,
    accepted: bool,
}

#[derive(Serialize, Deserialize)]
struct ChallengeQuestionDoc {
    question_id: QuestionId,
    prompt: String,
}

#[derive(Serialize, Deserialize)]
struct ResultDoc {
    winner: Option<String>,
    details: Vec<StandingDoc>,
}

#[derive(Serialize, Deserialize)]
struct StandingDoc {
    participant: String,
    total_score: u32,
    finished_at: Option<DateTime<Utc>>,
}

impl ResultDoc {
    fn from_domain(result: &ChallengeResult) -> Self {
        Self {
            winner: result.winner.clone(),
            details: result
                .details
                .iter()
                .map(|s| StandingDoc {
                    participant: s.participant.clone(),
                    total_score: s.total_score,
                    finished_at: s.finished_at,
                })
                .collect(),
        }
    }

    fn to_domain(self) -> ChallengeResult {
        ChallengeResult {
            winner: self.winner,
            details: self
                .details
                .into_iter()
                .map(|s| Standing {
                    participant: s.participant,
                    total_score: s.total_score,
                    finished_at: s.finished_at,
                })
                .collect(),
        }
    }
}

const SESSION_COLUMNS: &str = "id, creator, participants, questions, difficulty, status, \
     time_limit_secs, created_at, start_time, end_time, result";

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    creator: String,
    participants: Json<Vec<ParticipantDoc>>,
    questions: Json<Vec<ChallengeQuestionDoc>>,
    difficulty: String,
    status: String,
    time_limit_secs: i32,
    created_at: DateTime<Utc>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    result: Option<Json<ResultDoc>>,
}
impl SessionRecord {
    fn to_domain(self) -> PortResult<ChallengeSession> {
        Ok(ChallengeSession {
            id: self.id,
            creator: self.creator,
            participants: self
                .participants
                .0
                .into_iter()
                .map(|p| Participant {
                    user_id: p.user,
                    accepted: p.accepted,
                })
                .collect(),
            questions: self
                .questions
                .0
                .into_iter()
                .map(|q| ChallengeQuestion {
                    question_id: q.question_id,
                    prompt: q.prompt,
                })
                .collect(),
            difficulty: Difficulty::parse(&self.difficulty)
                .ok_or_else(|| corrupt("difficulty", &self.difficulty))?,
            status: ChallengeStatus::parse(&self.status)
                .ok_or_else(|| corrupt("status", &self.status))?,
            time_limit_secs: self.time_limit_secs.max(0) as u32,
            created_at: self.created_at,
            start_time: self.start_time,
            end_time: self.end_time,
            result: self.result.map(|r| r.0.to_domain()),
        })
    }
}

#[derive(Serialize, Deserialize)]
struct EntryDoc {
    question_id: QuestionId,
    answer: String,
    attempts: u8,
    correct: bool,
    time_taken: Option<f64>,
}

#[derive(FromRow)]
struct SubmissionRecord {
    session_id: Uuid,
    participant: String,
    entries: Json<Vec<EntryDoc>>,
    total_score: i32,
    status: String,
    finished_at: Option<DateTime<Utc>>,
}
impl SubmissionRecord {
    fn to_domain(self) -> PortResult<ChallengeSubmission> {
        Ok(ChallengeSubmission {
            session_id: self.session_id,
            participant: self.participant,
            entries: self
                .entries
                .0
                .into_iter()
                .map(|e| SubmissionEntry {
                    question_id: e.question_id,
                    answer: e.answer,
                    attempts: e.attempts,
                    correct: e.correct,
                    time_taken: e.time_taken,
                })
                .collect(),
            total_score: self.total_score.max(0) as u32,
            status: SubmissionStatus::parse(&self.status)
                .ok_or_else(|| corrupt("status", &self.status))?,
            finished_at: self.finished_at,
        })
    }
}

//=========================================================================================
// `QuestionRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl QuestionRepository for DbAdapter {
    async fn sample(
        &self,
        topic: Option<Topic>,
        difficulty: Difficulty,
        count: usize,
    ) -> PortResult<Vec<Question>> {
        let records = sqlx::query_as::<_, QuestionRecord>(
            "SELECT question_id, prompt, topic, difficulty FROM questions \
             WHERE difficulty = $1 AND ($2::TEXT IS NULL OR topic = $2) \
             ORDER BY random() LIMIT $3",
        )
        .bind(difficulty.as_str())
        .bind(topic.map(|t| t.as_str()))
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(QuestionRecord::to_domain).collect()
    }

    async fn get_question(&self, question_id: QuestionId) -> PortResult<Question> {
        sqlx::query_as::<_, QuestionRecord>(
            "SELECT question_id, prompt, topic, difficulty FROM questions WHERE question_id = $1",
        )
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Question {} not found", question_id)))?
        .to_domain()
    }
}

//=========================================================================================
// `LearnerStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl LearnerStore for DbAdapter {
    async fn load_profile(&self, learner_id: &str) -> PortResult<Option<LearnerProfile>> {
        sqlx::query_as::<_, ProfileRecord>(
            "SELECT learner_id, phase, mastery, total_score, rounds \
             FROM learner_profiles WHERE learner_id = $1",
        )
        .bind(learner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .map(ProfileRecord::to_domain)
        .transpose()
    }

    async fn save_profile(&self, profile: &LearnerProfile) -> PortResult<()> {
        let rounds: Vec<RoundDoc> = profile.rounds.iter().map(RoundDoc::from_domain).collect();
        sqlx::query(
            "INSERT INTO learner_profiles (learner_id, phase, mastery, total_score, rounds, updated_at) \
             VALUES ($1, $2, $3, $4, $5, now()) \
             ON CONFLICT (learner_id) DO UPDATE SET phase = EXCLUDED.phase, \
             mastery = EXCLUDED.mastery, total_score = EXCLUDED.total_score, \
             rounds = EXCLUDED.rounds, updated_at = now()",
        )
        .bind(&profile.learner_id)
        .bind(profile.phase.as_str())
        .bind(Json(mastery_doc(&profile.mastery)))
        .bind(profile.total_score as i64)
        .bind(Json(rounds))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn top_scores(&self, limit: usize) -> PortResult<Vec<LeaderboardEntry>> {
        let records = sqlx::query_as::<_, LeaderboardRecord>(
            "SELECT learner_id, total_score FROM learner_profiles \
             ORDER BY total_score DESC, learner_id ASC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(|r| LeaderboardEntry {
                learner_id: r.learner_id,
                total_score: r.total_score.max(0) as u64,
            })
            .collect())
    }
}

//=========================================================================================
// `ChallengeStore` Trait Implementation
//=========================================================================================

impl DbAdapter {
    async fn write_session(&self, session: &ChallengeSession, upsert: bool) -> PortResult<()> {
        let participants: Vec<ParticipantDoc> = session
            .participants
            .iter()
            .map(|p| ParticipantDoc {
                user: p.user_id.clone(),
                accepted: p.accepted,
            })
            .collect();
        let questions: Vec<ChallengeQuestionDoc> = session
            .questions
            .iter()
            .map(|q| ChallengeQuestionDoc {
                question_id: q.question_id,
                prompt: q.prompt.clone(),
            })
            .collect();
        let conflict = if upsert {
            " ON CONFLICT (id) DO UPDATE SET participants = EXCLUDED.participants, \
              status = EXCLUDED.status, start_time = EXCLUDED.start_time, \
              end_time = EXCLUDED.end_time, result = EXCLUDED.result"
        } else {
            ""
        };
        let sql = format!(
            "INSERT INTO challenge_sessions ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11){}",
            SESSION_COLUMNS, conflict
        );
        sqlx::query(&sql)
            .bind(session.id)
            .bind(&session.creator)
            .bind(Json(participants))
            .bind(Json(questions))
            .bind(session.difficulty.as_str())
            .bind(session.status.as_str())
            .bind(session.time_limit_secs as i32)
            .bind(session.created_at)
            .bind(session.start_time)
            .bind(session.end_time)
            .bind(session.result.as_ref().map(|r| Json(ResultDoc::from_domain(r))))
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

#[async_trait]
impl ChallengeStore for DbAdapter {
    async fn insert_session(&self, session: &ChallengeSession) -> PortResult<()> {
        self.write_session(session, false).await
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<ChallengeSession> {
        let sql = format!("SELECT {} FROM challenge_sessions WHERE id = $1", SESSION_COLUMNS);
        sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Challenge session {} not found", session_id)))?
            .to_domain()
    }

    async fn save_session(&self, session: &ChallengeSession) -> PortResult<()> {
        self.write_session(session, true).await
    }

    async fn pending_for(&self, user_id: &str) -> PortResult<Vec<ChallengeSession>> {
        let sql = format!(
            "SELECT {} FROM challenge_sessions WHERE status = 'pending' \
             AND participants @> jsonb_build_array(jsonb_build_object('user', $1::TEXT, 'accepted', false)) \
             ORDER BY created_at ASC",
            SESSION_COLUMNS
        );
        let records = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(SessionRecord::to_domain).collect()
    }

    async fn expired_active_sessions(&self, now: DateTime<Utc>) -> PortResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM challenge_sessions WHERE status = 'active' AND end_time <= $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn get_submission(
        &self,
        session_id: Uuid,
        participant: &str,
    ) -> PortResult<Option<ChallengeSubmission>> {
        sqlx::query_as::<_, SubmissionRecord>(
            "SELECT session_id, participant, entries, total_score, status, finished_at \
             FROM challenge_submissions WHERE session_id = $1 AND participant = $2",
        )
        .bind(session_id)
        .bind(participant)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .map(SubmissionRecord::to_domain)
        .transpose()
    }

    async fn submissions_for_session(
        &self,
        session_id: Uuid,
    ) -> PortResult<Vec<ChallengeSubmission>> {
        let records = sqlx::query_as::<_, SubmissionRecord>(
            "SELECT session_id, participant, entries, total_score, status, finished_at \
             FROM challenge_submissions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(SubmissionRecord::to_domain).collect()
    }

    async fn save_submission(&self, submission: &ChallengeSubmission) -> PortResult<()> {
        let entries: Vec<EntryDoc> = submission
            .entries
            .iter()
            .map(|e| EntryDoc {
                question_id: e.question_id,
                answer: e.answer.clone(),
                attempts: e.attempts,
                correct: e.correct,
                time_taken: e.time_taken,
            })
            .collect();
        sqlx::query(
            "INSERT INTO challenge_submissions \
             (session_id, participant, entries, total_score, status, finished_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (session_id, participant) DO UPDATE SET entries = EXCLUDED.entries, \
             total_score = EXCLUDED.total_score, status = EXCLUDED.status, \
             finished_at = EXCLUDED.finished_at",
        )
        .bind(submission.session_id)
        .bind(&submission.participant)
        .bind(Json(entries))
        .bind(submission.total_score as i32)
        .bind(submission.status.as_str())
        .bind(submission.finished_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}
