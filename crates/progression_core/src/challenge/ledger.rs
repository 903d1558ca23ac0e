//! crates/progression_core/src/challenge/ledger.rs
//!
//! Per-participant answer history and scoring inside one challenge.
//! A question gets at most two judged attempts: 10 points for a correct
//! first attempt, 5 for a correct second one.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::challenge::ChallengeService;
use crate::domain::{
    ChallengeStatus, ChallengeSubmission, QuestionId, SubmissionEntry, SubmissionStatus, Verdict,
};
use crate::error::{EngineError, EngineResult};
use crate::judge::classify_within;

pub const MAX_CHALLENGE_ATTEMPTS: u8 = 2;
const FIRST_ATTEMPT_POINTS: u32 = 10;
const SECOND_ATTEMPT_POINTS: u32 = 5;

/// The ledger after one judged answer.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAnswer {
    pub submission: ChallengeSubmission,
    pub verdict: Verdict,
    pub points_awarded: u32,
}

/// Whether `question_id` can still be answered in this ledger.
fn check_open(submission: &ChallengeSubmission, question_id: QuestionId) -> EngineResult<()> {
    match submission
        .entries
        .iter()
        .find(|e| e.question_id == question_id)
    {
        Some(entry) if entry.correct || entry.attempts >= MAX_CHALLENGE_ATTEMPTS => {
            Err(EngineError::MaxAttemptsReached(question_id))
        }
        _ => Ok(()),
    }
}

/// Applies one judged answer to the ledger and returns the points it earned.
/// Marks the ledger completed once every question of the session has an entry.
pub(crate) fn apply_answer(
    submission: &mut ChallengeSubmission,
    question_id: QuestionId,
    answer: &str,
    time_taken: Option<f64>,
    correct: bool,
    question_count: usize,
    now: DateTime<Utc>,
) -> u32 {
    let points = match submission
        .entries
        .iter_mut()
        .find(|e| e.question_id == question_id)
    {
        Some(entry) => {
            entry.attempts += 1;
            entry.answer = answer.to_string();
            entry.time_taken = time_taken;
            if correct {
                entry.correct = true;
                SECOND_ATTEMPT_POINTS
            } else {
                0
            }
        }
        None => {
            submission.entries.push(SubmissionEntry {
                question_id,
                answer: answer.to_string(),
                attempts: 1,
                correct,
                time_taken,
            });
            if correct {
                FIRST_ATTEMPT_POINTS
            } else {
                0
            }
        }
    };
    submission.total_score += points;

    if submission.status == SubmissionStatus::Active && submission.entries.len() >= question_count {
        submission.status = SubmissionStatus::Completed;
        submission.finished_at = Some(now);
    }
    points
}

impl ChallengeService {
    /// Judges and records a participant's answer to one challenge question.
    #[instrument(skip(self, answer))]
    pub async fn record_answer(
        &self,
        session_id: Uuid,
        participant: &str,
        question_id: QuestionId,
        answer: &str,
        time_taken: Option<f64>,
    ) -> EngineResult<RecordedAnswer> {
        if participant.trim().is_empty() {
            return Err(EngineError::Validation("participant is required".to_string()));
        }
        if answer.trim().is_empty() {
            return Err(EngineError::Validation("answer is required".to_string()));
        }

        let _guard = self.locks.lock(&session_id).await;
        let session = self.store.get_session(session_id).await?;

        if session.participant(participant).is_none() {
            return Err(EngineError::NotAParticipant(participant.to_string()));
        }
        let now = self.clock.now();
        let clock_running = session.end_time.is_some_and(|end| now < end);
        if session.status != ChallengeStatus::Active || !clock_running {
            return Err(EngineError::ChallengeNotActive);
        }
        let prompt = session
            .question(question_id)
            .map(|q| q.prompt.clone())
            .ok_or(EngineError::QuestionNotInChallenge(question_id))?;

        let mut submission = self
            .store
            .get_submission(session_id, participant)
            .await?
            .unwrap_or_else(|| ChallengeSubmission::new(session_id, participant));
        check_open(&submission, question_id)?;

        let verdict = classify_within(self.oracle.as_ref(), self.oracle_timeout, &prompt, answer).await?;
        let points = apply_answer(
            &mut submission,
            question_id,
            answer,
            time_taken,
            verdict.is_correct(),
            session.questions.len(),
            now,
        );
        self.store.save_submission(&submission).await?;

        debug!(question_id, label = %verdict.label, points, "Challenge answer recorded");
        if submission.status == SubmissionStatus::Completed && submission.finished_at == Some(now) {
            info!(%session_id, participant, total_score = submission.total_score, "Participant finished");
        }
        Ok(RecordedAnswer {
            submission,
            verdict,
            points_awarded: points,
        })
    }

    pub async fn submission(
        &self,
        session_id: Uuid,
        participant: &str,
    ) -> EngineResult<ChallengeSubmission> {
        self.store
            .get_submission(session_id, participant)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!(
                    "No submission from {participant} in challenge {session_id}"
                ))
            })
    }
}
