//! crates/progression_core/src/challenge/mod.rs
//!
//! Multi-participant challenges. One `ChallengeService` owns the per-session
//! exclusion scope; its operations are split by concern:
//!
//! - `lifecycle`: creation, acceptance and the `pending -> active` transition.
//! - `ledger`: per-participant answer history and scoring.
//! - `finalizer`: completion checks, ranking and the `active -> completed` transition.

pub mod finalizer;
pub mod ledger;
pub mod lifecycle;

pub use finalizer::rank_standings;
pub use ledger::RecordedAnswer;
pub use lifecycle::NewChallenge;

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::locks::KeyedLocks;
use crate::ports::{ChallengeStore, Clock, CorrectnessOracle, QuestionRepository};

pub struct ChallengeService {
    store: Arc<dyn ChallengeStore>,
    questions: Arc<dyn QuestionRepository>,
    oracle: Arc<dyn CorrectnessOracle>,
    clock: Arc<dyn Clock>,
    oracle_timeout: Duration,
    locks: KeyedLocks<Uuid>,
}

impl ChallengeService {
    pub fn new(
        store: Arc<dyn ChallengeStore>,
        questions: Arc<dyn QuestionRepository>,
        oracle: Arc<dyn CorrectnessOracle>,
        clock: Arc<dyn Clock>,
        oracle_timeout: Duration,
    ) -> Self {
        Self {
            store,
            questions,
            oracle,
            clock,
            oracle_timeout,
            locks: KeyedLocks::new(),
        }
    }

    /// Drops lock slots for sessions nobody is currently touching.
    pub fn prune_locks(&self) -> usize {
        self.locks.prune()
    }
}
