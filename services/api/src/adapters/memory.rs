//! services/api/src/adapters/memory.rs
//!
//! A process-local store implementing every persistence port. Used when no
//! `DATABASE_URL` is configured and by the HTTP tests.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use progression_core::domain::{
    ChallengeSession, ChallengeStatus, ChallengeSubmission, Difficulty, LeaderboardEntry,
    LearnerProfile, Question, QuestionId, Topic,
};
use progression_core::ports::{
    ChallengeStore, LearnerStore, PortError, PortResult, QuestionRepository,
};
use rand::seq::SliceRandom;
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ApiError;

//=========================================================================================
// Question bank file
//=========================================================================================

/// One question as it appears in the seed file.
#[derive(Deserialize)]
struct QuestionDoc {
    question_id: QuestionId,
    prompt: String,
    topic: String,
    difficulty: String,
}

impl QuestionDoc {
    fn to_domain(self) -> Result<Question, ApiError> {
        let topic = Topic::parse(&self.topic).ok_or_else(|| {
            ApiError::Internal(format!(
                "Question {} has unknown topic '{}'",
                self.question_id, self.topic
            ))
        })?;
        let difficulty = Difficulty::parse(&self.difficulty).ok_or_else(|| {
            ApiError::Internal(format!(
                "Question {} has unknown difficulty '{}'",
                self.question_id, self.difficulty
            ))
        })?;
        Ok(Question {
            id: self.question_id,
            prompt: self.prompt,
            topic,
            difficulty,
        })
    }
}

/// Parses a JSON array of `{question_id, prompt, topic, difficulty}` objects.
pub fn parse_question_bank(raw: &str) -> Result<Vec<Question>, ApiError> {
    let docs: Vec<QuestionDoc> = serde_json::from_str(raw)
        .map_err(|e| ApiError::Internal(format!("Invalid question bank: {}", e)))?;
    docs.into_iter().map(QuestionDoc::to_domain).collect()
}

pub fn load_question_bank(path: &Path) -> Result<Vec<Question>, ApiError> {
    let raw = std::fs::read_to_string(path)?;
    parse_question_bank(&raw)
}

//=========================================================================================
// The Store
//=========================================================================================

#[derive(Default)]
pub struct MemoryStore {
    questions: Vec<Question>,
    profiles: RwLock<HashMap<String, LearnerProfile>>,
    sessions: RwLock<HashMap<Uuid, ChallengeSession>>,
    submissions: RwLock<HashMap<(Uuid, String), ChallengeSubmission>>,
}

impl MemoryStore {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            ..Self::default()
        }
    }

    fn pick(&self, topic: Option<Topic>, difficulty: Difficulty, count: usize) -> Vec<Question> {
        let candidates: Vec<&Question> = self
            .questions
            .iter()
            .filter(|q| q.difficulty == difficulty && topic.map_or(true, |t| q.topic == t))
            .collect();
        candidates
            .choose_multiple(&mut rand::thread_rng(), count)
            .map(|q| (*q).clone())
            .collect()
    }
}

#[async_trait]
impl QuestionRepository for MemoryStore {
    async fn sample(
        &self,
        topic: Option<Topic>,
        difficulty: Difficulty,
        count: usize,
    ) -> PortResult<Vec<Question>> {
        Ok(self.pick(topic, difficulty, count))
    }

    async fn get_question(&self, question_id: QuestionId) -> PortResult<Question> {
        self.questions
            .iter()
            .find(|q| q.id == question_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Question {} not found", question_id)))
    }
}

#[async_trait]
impl LearnerStore for MemoryStore {
    async fn load_profile(&self, learner_id: &str) -> PortResult<Option<LearnerProfile>> {
        Ok(self.profiles.read().await.get(learner_id).cloned())
    }

    async fn save_profile(&self, profile: &LearnerProfile) -> PortResult<()> {
        self.profiles
            .write()
            .await
            .insert(profile.learner_id.clone(), profile.clone());
        Ok(())
    }

    async fn top_scores(&self, limit: usize) -> PortResult<Vec<LeaderboardEntry>> {
        let mut entries: Vec<LeaderboardEntry> = self
            .profiles
            .read()
            .await
            .values()
            .map(|p| LeaderboardEntry {
                learner_id: p.learner_id.clone(),
                total_score: p.total_score,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.total_score
                .cmp(&a.total_score)
                .then_with(|| a.learner_id.cmp(&b.learner_id))
        });
        entries.truncate(limit);
        Ok(entries)
    }
}

#[async_trait]
impl ChallengeStore for MemoryStore {
    async fn insert_session(&self, session: &ChallengeSession) -> PortResult<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(PortError::Unexpected(format!(
                "Challenge session {} already exists",
                session.id
            )));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<ChallengeSession> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Challenge session {} not found", session_id)))
    }

    async fn save_session(&self, session: &ChallengeSession) -> PortResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn pending_for(&self, user_id: &str) -> PortResult<Vec<ChallengeSession>> {
        let mut pending: Vec<ChallengeSession> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| {
                s.status == ChallengeStatus::Pending
                    && s.participant(user_id).is_some_and(|p| !p.accepted)
            })
            .cloned()
            .collect();
        pending.sort_by_key(|s| s.created_at);
        Ok(pending)
    }

    async fn expired_active_sessions(&self, now: DateTime<Utc>) -> PortResult<Vec<Uuid>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| {
                s.status == ChallengeStatus::Active && s.end_time.is_some_and(|end| end <= now)
            })
            .map(|s| s.id)
            .collect())
    }

    async fn get_submission(
        &self,
        session_id: Uuid,
        participant: &str,
    ) -> PortResult<Option<ChallengeSubmission>> {
        Ok(self
            .submissions
            .read()
            .await
            .get(&(session_id, participant.to_string()))
            .cloned())
    }

    async fn submissions_for_session(
        &self,
        session_id: Uuid,
    ) -> PortResult<Vec<ChallengeSubmission>> {
        Ok(self
            .submissions
            .read()
            .await
            .values()
            .filter(|s| s.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn save_submission(&self, submission: &ChallengeSubmission) -> PortResult<()> {
        self.submissions.write().await.insert(
            (submission.session_id, submission.participant.clone()),
            submission.clone(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANK: &str = r#"[
        {"question_id": 1, "prompt": "Reverse a string recursively", "topic": "Recursion", "difficulty": "medium"},
        {"question_id": 2, "prompt": "Read a file line by line", "topic": "File I/O", "difficulty": "medium"},
        {"question_id": 3, "prompt": "Sum with a for loop", "topic": "Loops", "difficulty": "easy"},
        {"question_id": 4, "prompt": "Fibonacci recursion", "topic": "Recursion", "difficulty": "medium"}
    ]"#;

    #[test]
    fn bank_parses_display_names() {
        let questions = parse_question_bank(BANK).unwrap();
        assert_eq!(questions.len(), 4);
        assert_eq!(questions[1].topic, Topic::FileIo);
        assert_eq!(questions[2].difficulty, Difficulty::Easy);
    }

    #[test]
    fn bank_rejects_unknown_topics() {
        let raw = r#"[{"question_id": 9, "prompt": "p", "topic": "Pointers", "difficulty": "easy"}]"#;
        assert!(parse_question_bank(raw).is_err());
    }

    #[tokio::test]
    async fn sample_filters_and_never_repeats() {
        let store = MemoryStore::new(parse_question_bank(BANK).unwrap());

        let picked = store
            .sample(Some(Topic::Recursion), Difficulty::Medium, 5)
            .await
            .unwrap();

        let mut ids: Vec<QuestionId> = picked.iter().map(|q| q.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 4]);
    }

    #[tokio::test]
    async fn leaderboard_orders_by_score() {
        let store = MemoryStore::default();
        for (who, score) in [("ann", 30), ("ben", 80), ("cat", 55)] {
            let mut profile = LearnerProfile::new(who);
            profile.total_score = score;
            store.save_profile(&profile).await.unwrap();
        }

        let top = store.top_scores(2).await.unwrap();

        let names: Vec<&str> = top.iter().map(|e| e.learner_id.as_str()).collect();
        assert_eq!(names, vec!["ben", "cat"]);
    }
}
