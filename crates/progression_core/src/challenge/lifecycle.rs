//! crates/progression_core/src/challenge/lifecycle.rs
//!
//! Challenge creation and acceptance.

use chrono::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::challenge::ChallengeService;
use crate::domain::{
    ChallengeQuestion, ChallengeSession, ChallengeStatus, Difficulty, Participant,
};
use crate::error::{EngineError, EngineResult, ErrorKind};

/// Longest clock a challenge may run, in seconds.
pub const MAX_TIME_LIMIT_SECS: u32 = 24 * 60 * 60;

/// Parameters for a new challenge.
#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub creator: String,
    pub participants: Vec<String>,
    pub question_count: usize,
    pub difficulty: Difficulty,
    pub time_limit_secs: u32,
}

impl NewChallenge {
    fn validate(&self) -> EngineResult<()> {
        if self.creator.trim().is_empty() {
            return Err(EngineError::Validation("creator is required".to_string()));
        }
        if self.participants.is_empty() || self.participants.iter().any(|p| p.trim().is_empty()) {
            return Err(EngineError::Validation(
                "participants must be a non-empty list of user ids".to_string(),
            ));
        }
        if self.question_count == 0 {
            return Err(EngineError::Validation(
                "questionCount must be at least 1".to_string(),
            ));
        }
        if self.time_limit_secs == 0 || self.time_limit_secs > MAX_TIME_LIMIT_SECS {
            return Err(EngineError::Validation(format!(
                "timeLimit must be between 1 and {} seconds",
                MAX_TIME_LIMIT_SECS
            )));
        }
        Ok(())
    }
}

impl ChallengeService {
    /// Snapshots a question set and opens a pending challenge.
    #[instrument(skip(self, request), fields(creator = %request.creator))]
    pub async fn create(&self, request: NewChallenge) -> EngineResult<ChallengeSession> {
        request.validate()?;

        let sampled = self
            .questions
            .sample(None, request.difficulty, request.question_count)
            .await?;
        if sampled.len() < request.question_count {
            return Err(EngineError::Validation(format!(
                "questionCount {} exceeds the {} {} questions available",
                request.question_count,
                sampled.len(),
                request.difficulty
            )));
        }

        let mut participants: Vec<Participant> = Vec::with_capacity(request.participants.len());
        for user_id in request.participants {
            if participants.iter().all(|p| p.user_id != user_id) {
                participants.push(Participant {
                    user_id,
                    accepted: false,
                });
            }
        }

        let session = ChallengeSession {
            id: Uuid::new_v4(),
            creator: request.creator,
            participants,
            questions: sampled
                .into_iter()
                .take(request.question_count)
                .map(|q| ChallengeQuestion {
                    question_id: q.id,
                    prompt: q.prompt,
                })
                .collect(),
            difficulty: request.difficulty,
            status: ChallengeStatus::Pending,
            time_limit_secs: request.time_limit_secs,
            created_at: self.clock.now(),
            start_time: None,
            end_time: None,
            result: None,
        };
        self.store.insert_session(&session).await?;
        info!(session_id = %session.id, participants = session.participants.len(), "Challenge created");
        Ok(session)
    }

    /// Loads a session. An active session whose clock has run out is
    /// finalized on the way out.
    pub async fn get(&self, session_id: Uuid) -> EngineResult<ChallengeSession> {
        let session = self.store.get_session(session_id).await?;
        let expired = session.status == ChallengeStatus::Active
            && session.end_time.is_some_and(|end| self.clock.now() >= end);
        if !expired {
            return Ok(session);
        }
        match self.finalize(session_id).await {
            Ok(finalized) => Ok(finalized),
            Err(e) if e.kind() == ErrorKind::Precondition => Ok(session),
            Err(e) => Err(e),
        }
    }

    pub async fn pending_for(&self, user_id: &str) -> EngineResult<Vec<ChallengeSession>> {
        if user_id.trim().is_empty() {
            return Err(EngineError::Validation("user is required".to_string()));
        }
        Ok(self.store.pending_for(user_id).await?)
    }

    /// Marks `user_id` as accepted. The last acceptance starts the clock.
    #[instrument(skip(self))]
    pub async fn accept(&self, session_id: Uuid, user_id: &str) -> EngineResult<ChallengeSession> {
        if user_id.trim().is_empty() {
            return Err(EngineError::Validation("user is required".to_string()));
        }
        let _guard = self.locks.lock(&session_id).await;
        let mut session = self.store.get_session(session_id).await?;

        let participant = session
            .participants
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or_else(|| EngineError::NotAParticipant(user_id.to_string()))?;
        if participant.accepted {
            return Ok(session);
        }
        participant.accepted = true;

        if session.status == ChallengeStatus::Pending
            && session.participants.iter().all(|p| p.accepted)
        {
            let start = self.clock.now();
            session.status = ChallengeStatus::Active;
            session.start_time = Some(start);
            session.end_time = Some(start + Duration::seconds(i64::from(session.time_limit_secs)));
            info!(%session_id, "All participants accepted, challenge started");
        }

        self.store.save_session(&session).await?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{ChallengeStore, Clock};
    use crate::testing::ChallengeHarness;

    #[tokio::test]
    async fn create_snapshots_questions_and_starts_pending() {
        let h = ChallengeHarness::new();

        let session = h.create(&["alice", "bob", "alice"]).await;

        assert_eq!(session.status, ChallengeStatus::Pending);
        assert_eq!(session.questions.len(), 2);
        assert_eq!(session.participants.len(), 2);
        assert!(session.participants.iter().all(|p| !p.accepted));
        assert_eq!(session.end_time, None);
        assert_eq!(h.store.get_session(session.id).await.unwrap(), session);
    }

    #[tokio::test]
    async fn create_rejects_empty_participants() {
        let h = ChallengeHarness::new();
        let err = h
            .service
            .create(NewChallenge {
                creator: "carol".to_string(),
                participants: vec![],
                question_count: 2,
                difficulty: Difficulty::Medium,
                time_limit_secs: 300,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn create_rejects_more_questions_than_the_bank_holds() {
        let h = ChallengeHarness::new();
        let err = h
            .service
            .create(NewChallenge {
                creator: "carol".to_string(),
                participants: vec!["alice".to_string()],
                question_count: 10,
                difficulty: Difficulty::Hard,
                time_limit_secs: 300,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("5 hard questions"));
    }

    #[tokio::test]
    async fn create_rejects_out_of_range_time_limits() {
        let h = ChallengeHarness::new();
        for time_limit_secs in [0, MAX_TIME_LIMIT_SECS + 1, u32::MAX] {
            let err = h
                .service
                .create(NewChallenge {
                    creator: "carol".to_string(),
                    participants: vec!["alice".to_string()],
                    question_count: 2,
                    difficulty: Difficulty::Medium,
                    time_limit_secs,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)), "{}", time_limit_secs);
        }
    }

    #[tokio::test]
    async fn last_acceptance_activates_and_sets_end_time() {
        let h = ChallengeHarness::new();
        let session = h.create(&["alice", "bob"]).await;

        let after_alice = h.service.accept(session.id, "alice").await.unwrap();
        assert_eq!(after_alice.status, ChallengeStatus::Pending);
        assert_eq!(after_alice.start_time, None);

        h.clock.advance(Duration::seconds(7));
        let after_bob = h.service.accept(session.id, "bob").await.unwrap();
        assert_eq!(after_bob.status, ChallengeStatus::Active);
        let start = after_bob.start_time.unwrap();
        assert_eq!(start, h.clock.now());
        assert_eq!(after_bob.end_time, Some(start + Duration::seconds(300)));
    }

    #[tokio::test]
    async fn repeated_acceptance_is_idempotent() {
        let h = ChallengeHarness::new();
        let session = h.active(&["alice"]).await;
        let end_time = session.end_time;

        h.clock.advance(Duration::seconds(30));
        let again = h.service.accept(session.id, "alice").await.unwrap();

        assert_eq!(again, session);
        assert_eq!(again.end_time, end_time);
    }

    #[tokio::test]
    async fn outsider_cannot_accept() {
        let h = ChallengeHarness::new();
        let session = h.create(&["alice"]).await;

        let err = h.service.accept(session.id, "mallory").await.unwrap_err();

        assert!(matches!(err, EngineError::NotAParticipant(ref u) if u == "mallory"));
    }

    #[tokio::test]
    async fn pending_lists_only_unaccepted_invitations() {
        let h = ChallengeHarness::new();
        let first = h.create(&["alice", "bob"]).await;
        let second = h.create(&["bob", "dave"]).await;
        h.service.accept(first.id, "alice").await.unwrap();
        h.service.accept(second.id, "bob").await.unwrap();

        let for_alice = h.service.pending_for("alice").await.unwrap();
        let for_bob = h.service.pending_for("bob").await.unwrap();

        assert!(for_alice.is_empty());
        assert_eq!(for_bob.len(), 1);
        assert_eq!(for_bob[0].id, first.id);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let h = ChallengeHarness::new();
        let err = h.service.accept(Uuid::new_v4(), "alice").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
