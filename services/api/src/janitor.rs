//! services/api/src/janitor.rs
//!
//! Periodic housekeeping: finalizes challenges whose clock ran out and drops
//! idle per-aggregate lock slots.

use std::sync::Arc;
use std::time::Duration;

use progression_core::{AdaptiveController, ChallengeService};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs one sweep. Returns the number of challenges finalized.
pub async fn sweep(adaptive: &AdaptiveController, challenges: &ChallengeService) -> usize {
    let finalized = match challenges.finalize_expired().await {
        Ok(n) => n,
        Err(e) => {
            warn!("Janitor could not list expired challenges: {}", e);
            0
        }
    };
    let pruned = adaptive.prune_locks() + challenges.prune_locks();
    if finalized > 0 {
        info!(finalized, "Janitor finalized expired challenges");
    }
    debug!(pruned, "Janitor pruned idle lock slots");
    finalized
}

/// Spawns the janitor loop. It stops when `cancel` is triggered.
pub fn spawn(
    adaptive: Arc<AdaptiveController>,
    challenges: Arc<ChallengeService>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Janitor stopped");
                    break;
                }
                _ = ticker.tick() => {
                    sweep(&adaptive, &challenges).await;
                }
            }
        }
    })
}
