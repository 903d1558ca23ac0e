//! Deterministic in-process fakes for every port, shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::domain::{
    ChallengeSession, ChallengeStatus, ChallengeSubmission, Difficulty, LeaderboardEntry,
    LearnerProfile, Question, QuestionId, Topic, Verdict,
};
use crate::ports::{
    ChallengeStore, Clock, CorrectnessOracle, LearnerStore, PortError, PortResult,
    QuestionRepository,
};

pub fn question(id: QuestionId, topic: Topic, difficulty: Difficulty) -> Question {
    Question {
        id,
        prompt: format!("Prompt {id}"),
        topic,
        difficulty,
    }
}

//=========================================================================================
// Questions
//=========================================================================================

pub struct FixedQuestionBank {
    questions: Vec<Question>,
}

impl FixedQuestionBank {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    /// Four medium and one hard question per topic. Ids are `topic_index * 100 + n`.
    pub fn standard() -> Self {
        let mut questions = Vec::new();
        for (t, topic) in Topic::ALL.into_iter().enumerate() {
            let base = (t as i64 + 1) * 100;
            for n in 1..=4 {
                questions.push(question(base + n, topic, Difficulty::Medium));
            }
            questions.push(question(base + 9, topic, Difficulty::Hard));
        }
        Self { questions }
    }

    pub fn reversed(mut self) -> Self {
        self.questions.reverse();
        self
    }
}

#[async_trait]
impl QuestionRepository for FixedQuestionBank {
    async fn sample(
        &self,
        topic: Option<Topic>,
        difficulty: Difficulty,
        count: usize,
    ) -> PortResult<Vec<Question>> {
        Ok(self
            .questions
            .iter()
            .filter(|q| q.difficulty == difficulty && topic.map_or(true, |t| q.topic == t))
            .take(count)
            .cloned()
            .collect())
    }

    async fn get_question(&self, question_id: QuestionId) -> PortResult<Question> {
        self.questions
            .iter()
            .find(|q| q.id == question_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Question {question_id} not found")))
    }
}

//=========================================================================================
// Oracle
//=========================================================================================

/// Labels an answer `correct` when it equals `"right"`, anything else `incorrect`.
#[derive(Default)]
pub struct ScriptedOracle {
    pub calls: AtomicUsize,
    pub fail: bool,
    pub delay: Option<Duration>,
}

impl ScriptedOracle {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CorrectnessOracle for ScriptedOracle {
    async fn classify(&self, _prompt: &str, answer: &str) -> PortResult<Verdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(PortError::Unavailable("classifier offline".to_string()));
        }
        Ok(Verdict::new(if answer == "right" {
            "correct"
        } else {
            "incorrect"
        }))
    }
}

//=========================================================================================
// Clock
//=========================================================================================

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

//=========================================================================================
// Stores
//=========================================================================================

#[derive(Default)]
pub struct MemoryLearners {
    pub profiles: Mutex<HashMap<String, LearnerProfile>>,
    pub saves: AtomicUsize,
}

impl MemoryLearners {
    pub fn profile(&self, learner_id: &str) -> Option<LearnerProfile> {
        self.profiles.lock().unwrap().get(learner_id).cloned()
    }
}

#[async_trait]
impl LearnerStore for MemoryLearners {
    async fn load_profile(&self, learner_id: &str) -> PortResult<Option<LearnerProfile>> {
        Ok(self.profile(learner_id))
    }

    async fn save_profile(&self, profile: &LearnerProfile) -> PortResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.learner_id.clone(), profile.clone());
        Ok(())
    }

    async fn top_scores(&self, limit: usize) -> PortResult<Vec<LeaderboardEntry>> {
        let mut entries: Vec<LeaderboardEntry> = self
            .profiles
            .lock()
            .unwrap()
            .values()
            .map(|p| LeaderboardEntry {
                learner_id: p.learner_id.clone(),
                total_score: p.total_score,
            })
            .collect();
        entries.sort_by(|a, b| b.total_score.cmp(&a.total_score));
        entries.truncate(limit);
        Ok(entries)
    }
}

#[derive(Default)]
pub struct MemoryChallenges {
    pub sessions: Mutex<HashMap<Uuid, ChallengeSession>>,
    pub submissions: Mutex<HashMap<(Uuid, String), ChallengeSubmission>>,
}

#[async_trait]
impl ChallengeStore for MemoryChallenges {
    async fn insert_session(&self, session: &ChallengeSession) -> PortResult<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<ChallengeSession> {
        self.sessions
            .lock()
            .unwrap()
            .get(&session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Challenge session {session_id} not found")))
    }

    async fn save_session(&self, session: &ChallengeSession) -> PortResult<()> {
        self.insert_session(session).await
    }

    async fn pending_for(&self, user_id: &str) -> PortResult<Vec<ChallengeSession>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                s.status == ChallengeStatus::Pending
                    && s.participant(user_id).is_some_and(|p| !p.accepted)
            })
            .cloned()
            .collect())
    }

    async fn expired_active_sessions(&self, now: DateTime<Utc>) -> PortResult<Vec<Uuid>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.status == ChallengeStatus::Active && s.end_time.is_some_and(|end| now >= end))
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
            .lock()
            .unwrap()
            .get(&(session_id, participant.to_string()))
            .cloned())
    }

    async fn submissions_for_session(
        &self,
        session_id: Uuid,
    ) -> PortResult<Vec<ChallengeSubmission>> {
        Ok(self
            .submissions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn save_submission(&self, submission: &ChallengeSubmission) -> PortResult<()> {
        self.submissions.lock().unwrap().insert(
            (submission.session_id, submission.participant.clone()),
            submission.clone(),
        );
        Ok(())
    }
}

//=========================================================================================
// Challenge harness
//=========================================================================================

pub struct ChallengeHarness {
    pub service: Arc<crate::challenge::ChallengeService>,
    pub store: Arc<MemoryChallenges>,
    pub clock: Arc<ManualClock>,
    pub oracle: Arc<ScriptedOracle>,
}

impl ChallengeHarness {
    pub fn new() -> Self {
        Self::with_oracle(ScriptedOracle::default())
    }

    pub fn with_oracle(oracle: ScriptedOracle) -> Self {
        let store = Arc::new(MemoryChallenges::default());
        let clock = Arc::new(ManualClock::new());
        let oracle = Arc::new(oracle);
        let service = Arc::new(crate::challenge::ChallengeService::new(
            store.clone(),
            Arc::new(FixedQuestionBank::standard()),
            oracle.clone(),
            clock.clone(),
            Duration::from_secs(5),
        ));
        Self {
            service,
            store,
            clock,
            oracle,
        }
    }

    /// A two-question, 300-second challenge between `participants`.
    pub async fn create(&self, participants: &[&str]) -> ChallengeSession {
        self.service
            .create(crate::challenge::NewChallenge {
                creator: "carol".to_string(),
                participants: participants.iter().map(|p| p.to_string()).collect(),
                question_count: 2,
                difficulty: Difficulty::Medium,
                time_limit_secs: 300,
            })
            .await
            .unwrap()
    }

    /// A challenge every participant has already accepted.
    pub async fn active(&self, participants: &[&str]) -> ChallengeSession {
        let session = self.create(participants).await;
        let mut latest = session;
        for p in participants {
            latest = self.service.accept(latest.id, p).await.unwrap();
        }
        latest
    }
}
