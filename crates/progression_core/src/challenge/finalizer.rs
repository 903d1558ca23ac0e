//! crates/progression_core/src/challenge/finalizer.rs
//!
//! Freezes a challenge's result once every accepted participant has
//! finished or the clock has run out.

use std::cmp::Ordering;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::challenge::ChallengeService;
use crate::domain::{
    ChallengeResult, ChallengeSession, ChallengeStatus, Standing, SubmissionStatus,
};
use crate::error::{ChallengeProgress, EngineError, EngineResult, ErrorKind};

/// Sorts by score descending, then by finish time ascending. A participant
/// who never finished ranks below everyone who did. The sort is stable.
pub fn rank_standings(standings: &mut [Standing]) {
    standings.sort_by(|a, b| {
        b.total_score
            .cmp(&a.total_score)
            .then_with(|| match (a.finished_at, b.finished_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    });
}

impl ChallengeService {
    /// Completes the session and stores its ranked result. Calling it on a
    /// completed session returns the stored result unchanged.
    #[instrument(skip(self))]
    pub async fn finalize(&self, session_id: Uuid) -> EngineResult<ChallengeSession> {
        let _guard = self.locks.lock(&session_id).await;
        let mut session = self.store.get_session(session_id).await?;
        if session.status == ChallengeStatus::Completed {
            return Ok(session);
        }

        let submissions = self.store.submissions_for_session(session_id).await?;
        let accepted: Vec<&str> = session.accepted_participants().collect();
        let participants_completed = accepted
            .iter()
            .filter(|p| {
                submissions
                    .iter()
                    .any(|s| s.participant == **p && s.status == SubmissionStatus::Completed)
            })
            .count();
        let timer_expired = session
            .end_time
            .is_some_and(|end| self.clock.now() >= end);
        let all_completed = participants_completed == accepted.len();

        if session.status == ChallengeStatus::Pending || !(timer_expired || all_completed) {
            return Err(EngineError::ChallengeInProgress(ChallengeProgress {
                all_completed: session.status == ChallengeStatus::Active && all_completed,
                timer_expired,
                participants_completed,
                total_participants: accepted.len(),
            }));
        }

        let mut details: Vec<Standing> = accepted
            .iter()
            .map(|p| {
                let ledger = submissions.iter().find(|s| s.participant == *p);
                Standing {
                    participant: p.to_string(),
                    total_score: ledger.map_or(0, |s| s.total_score),
                    finished_at: ledger.and_then(|s| s.finished_at),
                }
            })
            .collect();
        rank_standings(&mut details);

        let winner = details.first().map(|s| s.participant.clone());
        session.status = ChallengeStatus::Completed;
        session.result = Some(ChallengeResult { winner, details });
        self.store.save_session(&session).await?;

        info!(
            %session_id,
            timer_expired,
            winner = session.result.as_ref().and_then(|r| r.winner.as_deref()).unwrap_or("-"),
            "Challenge finalized"
        );
        Ok(session)
    }

    /// Finalizes every active session whose clock has run out.
    /// Returns how many were finalized.
    pub async fn finalize_expired(&self) -> EngineResult<usize> {
        let expired = self
            .store
            .expired_active_sessions(self.clock.now())
            .await?;
        let mut finalized = 0;
        for session_id in expired {
            match self.finalize(session_id).await {
                Ok(_) => finalized += 1,
                Err(e) if e.kind() == ErrorKind::Precondition => {}
                Err(e) => warn!(%session_id, "Failed to finalize expired challenge: {}", e),
            }
        }
        Ok(finalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ChallengeStore;
    use crate::testing::ChallengeHarness;
    use chrono::{Duration, TimeZone, Utc};

    fn standing(who: &str, score: u32, finished_min: Option<u32>) -> Standing {
        Standing {
            participant: who.to_string(),
            total_score: score,
            finished_at: finished_min
                .map(|m| Utc.with_ymd_and_hms(2024, 3, 1, 12, m, 0).unwrap()),
        }
    }

    #[test]
    fn equal_scores_rank_earlier_finish_first() {
        let mut standings = vec![
            standing("late", 20, Some(9)),
            standing("early", 20, Some(4)),
            standing("low", 5, Some(1)),
        ];
        rank_standings(&mut standings);
        let order: Vec<&str> = standings.iter().map(|s| s.participant.as_str()).collect();
        assert_eq!(order, vec!["early", "late", "low"]);
    }

    #[test]
    fn unfinished_never_outranks_finished_at_equal_score() {
        let mut standings = vec![
            standing("idle-a", 10, None),
            standing("done", 10, Some(30)),
            standing("idle-b", 10, None),
        ];
        rank_standings(&mut standings);
        let order: Vec<&str> = standings.iter().map(|s| s.participant.as_str()).collect();
        assert_eq!(order, vec!["done", "idle-a", "idle-b"]);
    }

    #[tokio::test]
    async fn in_progress_reports_diagnostics() {
        let h = ChallengeHarness::new();
        let session = h.active(&["alice", "bob"]).await;
        h.service.record_answer(session.id, "alice", 101, "right", None).await.unwrap();
        h.service.record_answer(session.id, "alice", 102, "right", None).await.unwrap();

        let err = h.service.finalize(session.id).await.unwrap_err();

        match err {
            EngineError::ChallengeInProgress(progress) => assert_eq!(
                progress,
                ChallengeProgress {
                    all_completed: false,
                    timer_expired: false,
                    participants_completed: 1,
                    total_participants: 2,
                }
            ),
            other => panic!("expected ChallengeInProgress, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pending_session_cannot_be_finalized() {
        let h = ChallengeHarness::new();
        let session = h.create(&["alice", "bob"]).await;

        let err = h.service.finalize(session.id).await.unwrap_err();

        assert!(matches!(err, EngineError::ChallengeInProgress(_)));
        assert_eq!(
            h.store.get_session(session.id).await.unwrap().status,
            ChallengeStatus::Pending
        );
    }

    #[tokio::test]
    async fn equal_scores_go_to_the_earlier_finisher() {
        let h = ChallengeHarness::new();
        let session = h.active(&["alice", "bob"]).await;
        h.service.record_answer(session.id, "bob", 101, "right", None).await.unwrap();
        h.service.record_answer(session.id, "bob", 102, "right", None).await.unwrap();
        h.clock.advance(Duration::seconds(20));
        h.service.record_answer(session.id, "alice", 101, "right", None).await.unwrap();
        h.service.record_answer(session.id, "alice", 102, "right", None).await.unwrap();

        let finalized = h.service.finalize(session.id).await.unwrap();

        assert_eq!(finalized.status, ChallengeStatus::Completed);
        let result = finalized.result.unwrap();
        assert_eq!(result.winner.as_deref(), Some("bob"));
        assert_eq!(result.details[0].total_score, 20);
        assert_eq!(result.details[1].participant, "alice");
    }

    #[tokio::test]
    async fn expiry_finalizes_with_zero_for_silent_participants() {
        let h = ChallengeHarness::new();
        let session = h.active(&["alice", "bob"]).await;
        h.service.record_answer(session.id, "bob", 101, "wrong", None).await.unwrap();
        h.clock.advance(Duration::seconds(300));

        let finalized = h.service.finalize(session.id).await.unwrap();

        let result = finalized.result.unwrap();
        assert_eq!(result.details.len(), 2);
        assert!(result.details.iter().all(|s| s.total_score == 0 && s.finished_at.is_none()));
        assert_eq!(result.winner.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn finalize_twice_returns_the_same_result() {
        let h = ChallengeHarness::new();
        let session = h.active(&["alice"]).await;
        h.service.record_answer(session.id, "alice", 101, "right", None).await.unwrap();
        h.clock.advance(Duration::seconds(400));

        let first = h.service.finalize(session.id).await.unwrap();
        h.clock.advance(Duration::seconds(60));
        let second = h.service.finalize(session.id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.result.unwrap().details[0].total_score, 10);
    }

    #[tokio::test]
    async fn reading_an_expired_session_finalizes_it() {
        let h = ChallengeHarness::new();
        let session = h.active(&["alice"]).await;
        h.clock.advance(Duration::seconds(301));

        let read = h.service.get(session.id).await.unwrap();

        assert_eq!(read.status, ChallengeStatus::Completed);
        assert!(read.result.is_some());
    }

    #[tokio::test]
    async fn sweep_finalizes_only_expired_sessions() {
        let h = ChallengeHarness::new();
        let stale = h.active(&["alice"]).await;
        h.clock.advance(Duration::seconds(200));
        let fresh = h.active(&["bob"]).await;
        h.clock.advance(Duration::seconds(150));

        let swept = h.service.finalize_expired().await.unwrap();

        assert_eq!(swept, 1);
        assert_eq!(
            h.store.get_session(stale.id).await.unwrap().status,
            ChallengeStatus::Completed
        );
        assert_eq!(
            h.store.get_session(fresh.id).await.unwrap().status,
            ChallengeStatus::Active
        );
    }
}
