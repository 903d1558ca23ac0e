//! services/api/src/adapters/oracle_llm.rs
//!
//! This module contains the adapter for the LLM-backed correctness oracle.
//! It implements the `CorrectnessOracle` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use progression_core::{
    domain::Verdict,
    ports::{CorrectnessOracle, PortError, PortResult},
};

const GRADER_PROMPT: &str = "You grade answers to programming exercises. \
Reply with exactly one word: 'correct' if the answer solves the exercise, \
otherwise 'incorrect'.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CorrectnessOracle` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiOracleAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiOracleAdapter {
    /// Creates a new `OpenAiOracleAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// Maps the model's free-form reply onto the classifier's label set.
fn label_from_reply(reply: &str) -> &'static str {
    let word = reply
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    if word == "correct" {
        "correct"
    } else {
        "incorrect"
    }
}

//=========================================================================================
// `CorrectnessOracle` Trait Implementation
//=========================================================================================

#[async_trait]
impl CorrectnessOracle for OpenAiOracleAdapter {
    async fn classify(&self, prompt: &str, answer: &str) -> PortResult<Verdict> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(GRADER_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("EXERCISE: {}\n\nANSWER: {}", prompt, answer))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unavailable(e.to_string()))?;

        let reply = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Grading LLM response contained no text content.".to_string())
            })?;
        Ok(Verdict::new(label_from_reply(&reply)))
    }
}
