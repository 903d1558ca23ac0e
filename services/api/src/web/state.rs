//! services/api/src/web/state.rs

use std::sync::Arc;

use progression_core::{AdaptiveController, ChallengeService};

use crate::config::Config;

/// Everything a handler can reach. Built once in `bin/api.rs`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Per-learner rounds, scoring and the leaderboard.
    pub adaptive: Arc<AdaptiveController>,
    /// Challenge creation, answers and results.
    pub challenges: Arc<ChallengeService>,
}
