//! crates/progression_core/src/judge.rs
//!
//! Time-bounded calls to the correctness oracle.

use std::time::Duration;

use tracing::warn;

use crate::domain::Verdict;
use crate::error::{EngineError, EngineResult};
use crate::ports::CorrectnessOracle;

/// Classifies an answer, failing with `Upstream` if the oracle errors or
/// does not answer within `timeout`.
pub async fn classify_within(
    oracle: &dyn CorrectnessOracle,
    timeout: Duration,
    prompt: &str,
    answer: &str,
) -> EngineResult<Verdict> {
    match tokio::time::timeout(timeout, oracle.classify(prompt, answer)).await {
        Ok(Ok(verdict)) => Ok(verdict),
        Ok(Err(e)) => {
            warn!("Correctness oracle failed: {}", e);
            Err(EngineError::Upstream(e.to_string()))
        }
        Err(_) => {
            warn!("Correctness oracle timed out after {:?}", timeout);
            Err(EngineError::Upstream(
                "correctness oracle timed out".to_string(),
            ))
        }
    }
}
