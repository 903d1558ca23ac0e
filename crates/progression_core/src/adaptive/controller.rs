//! crates/progression_core/src/adaptive/controller.rs
//!
//! The adaptive session controller. Composes the mastery tracker with the
//! question repository, the correctness oracle and the learner store, and runs
//! every read-modify-write of a profile inside that learner's exclusion scope.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::adaptive::mastery::{
    active_round_index, complete_active_round, record_attempt, start_round_one,
    start_weak_topic_round,
};
use crate::domain::{LeaderboardEntry, LearnerProfile, Phase, Question, QuestionId, Verdict};
use crate::error::{EngineError, EngineResult};
use crate::judge::classify_within;
use crate::locks::KeyedLocks;
use crate::ports::{CorrectnessOracle, LearnerStore, QuestionRepository};

/// The result of judging one answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub verdict: Verdict,
    pub points_awarded: u32,
    pub next_question: Option<Question>,
}

pub struct AdaptiveController {
    learners: Arc<dyn LearnerStore>,
    questions: Arc<dyn QuestionRepository>,
    oracle: Arc<dyn CorrectnessOracle>,
    oracle_timeout: Duration,
    locks: KeyedLocks<String>,
}

impl AdaptiveController {
    pub fn new(
        learners: Arc<dyn LearnerStore>,
        questions: Arc<dyn QuestionRepository>,
        oracle: Arc<dyn CorrectnessOracle>,
        oracle_timeout: Duration,
    ) -> Self {
        Self {
            learners,
            questions,
            oracle,
            oracle_timeout,
            locks: KeyedLocks::new(),
        }
    }

    /// Returns the learner's next unanswered question, creating the profile
    /// and the diagnostic round on first contact. `None` means nothing is left.
    #[instrument(skip(self))]
    pub async fn current_question(&self, learner_id: &str) -> EngineResult<Option<Question>> {
        require_learner_id(learner_id)?;
        let _guard = self.locks.lock(&learner_id.to_string()).await;

        let (mut profile, created) = self.load_or_new(learner_id).await?;
        let started = self.ensure_active_round(&mut profile).await?;
        if created || started {
            self.learners.save_profile(&profile).await?;
        }
        self.open_question(&profile).await
    }

    /// Judges an answer to one of the active round's open questions and
    /// advances the round state machine when the round finishes.
    #[instrument(skip(self, answer))]
    pub async fn submit_answer(
        &self,
        learner_id: &str,
        question_id: QuestionId,
        answer: &str,
    ) -> EngineResult<AnswerOutcome> {
        require_learner_id(learner_id)?;
        if answer.trim().is_empty() {
            return Err(EngineError::Validation("user_answer is required".to_string()));
        }
        let question = self.questions.get_question(question_id).await?;

        let _guard = self.locks.lock(&learner_id.to_string()).await;
        let (mut profile, _) = self.load_or_new(learner_id).await?;

        let round_index = match active_round_index(&profile)? {
            Some(i) if profile.phase != Phase::Done => i,
            _ => return Err(EngineError::QuestionNotActive(question_id)),
        };
        let slot = profile.rounds[round_index]
            .questions
            .iter()
            .position(|q| q.question_id == question_id && !q.done)
            .ok_or(EngineError::QuestionNotActive(question_id))?;

        // Nothing is written until the oracle has answered.
        let verdict = self.judge(&question.prompt, answer).await?;

        let points = record_attempt(
            &mut profile.rounds[round_index].questions[slot],
            verdict.is_correct(),
        );
        profile.total_score += u64::from(points);
        debug!(question_id, label = %verdict.label, points, "Answer recorded");

        if profile.rounds[round_index].all_done() {
            complete_active_round(&mut profile, self.questions.as_ref()).await?;
            info!(phase = profile.phase.as_str(), "Round completed");
        }

        self.learners.save_profile(&profile).await?;
        let next_question = self.open_question(&profile).await?;
        Ok(AnswerOutcome {
            verdict,
            points_awarded: points,
            next_question,
        })
    }

    pub async fn leaderboard(&self, limit: usize) -> EngineResult<Vec<LeaderboardEntry>> {
        Ok(self.learners.top_scores(limit).await?)
    }

    /// Drops lock slots for learners nobody is currently touching.
    pub fn prune_locks(&self) -> usize {
        self.locks.prune()
    }

    async fn load_or_new(&self, learner_id: &str) -> EngineResult<(LearnerProfile, bool)> {
        Ok(match self.learners.load_profile(learner_id).await? {
            Some(profile) => (profile, false),
            None => (LearnerProfile::new(learner_id), true),
        })
    }

    /// Starts a round when the learner has none open. Returns whether the profile changed.
    async fn ensure_active_round(&self, profile: &mut LearnerProfile) -> EngineResult<bool> {
        if active_round_index(profile)?.is_some() {
            return Ok(false);
        }
        match profile.phase {
            Phase::RoundOne => {
                start_round_one(profile, self.questions.as_ref()).await?;
                Ok(true)
            }
            Phase::WeakTopic => {
                if start_weak_topic_round(profile, self.questions.as_ref())
                    .await?
                    .is_none()
                {
                    profile.phase = Phase::Done;
                }
                Ok(true)
            }
            Phase::Done => Ok(false),
        }
    }

    async fn open_question(&self, profile: &LearnerProfile) -> EngineResult<Option<Question>> {
        if profile.phase == Phase::Done {
            return Ok(None);
        }
        let Some(index) = active_round_index(profile)? else {
            return Ok(None);
        };
        match profile.rounds[index].first_open() {
            Some(open) => Ok(Some(self.questions.get_question(open.question_id).await?)),
            None => Ok(None),
        }
    }

    async fn judge(&self, prompt: &str, answer: &str) -> EngineResult<Verdict> {
        classify_within(self.oracle.as_ref(), self.oracle_timeout, prompt, answer).await
    }
}

fn require_learner_id(learner_id: &str) -> EngineResult<()> {
    if learner_id.trim().is_empty() {
        return Err(EngineError::Validation("user_id is required".to_string()));
    }
    Ok(())
}
