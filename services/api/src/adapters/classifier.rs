//! services/api/src/adapters/classifier.rs
//!
//! A `CorrectnessOracle` backed by the answer-classifier microservice.

use std::time::Duration;

use async_trait::async_trait;
use progression_core::domain::Verdict;
use progression_core::ports::{CorrectnessOracle, PortError, PortResult};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    instruction: &'a str,
    input_text: &'a str,
    user_answer: &'a str,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    label: String,
}

#[derive(Clone)]
pub struct HttpClassifierAdapter {
    client: reqwest::Client,
    url: String,
}

impl HttpClassifierAdapter {
    /// `timeout` bounds each request at the transport level. The engine
    /// applies its own deadline on top of it.
    pub fn new(url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl CorrectnessOracle for HttpClassifierAdapter {
    async fn classify(&self, prompt: &str, answer: &str) -> PortResult<Verdict> {
        let response = self
            .client
            .post(&self.url)
            .json(&ClassifyRequest {
                instruction: prompt,
                input_text: "",
                user_answer: answer,
            })
            .send()
            .await
            .map_err(|e| PortError::Unavailable(format!("Classifier request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(PortError::Unavailable(format!(
                "Classifier returned status: {}",
                response.status()
            )));
        }

        let body: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Invalid classifier response: {}", e)))?;
        Ok(Verdict::new(body.label))
    }
}
