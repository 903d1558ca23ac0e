//! services/api/src/web/adaptive.rs
//!
//! Handlers for the single-learner adaptive assessment and the leaderboard.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::Json,
};
use progression_core::domain::{LeaderboardEntry, Question, QuestionId};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::web::state::AppState;

const LEADERBOARD_SIZE: usize = 10;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct QuestionResponse {
    pub question_id: QuestionId,
    pub prompt: String,
    #[schema(example = "File I/O")]
    pub topic: String,
    #[schema(example = "medium")]
    pub difficulty: String,
}

impl From<Question> for QuestionResponse {
    fn from(q: Question) -> Self {
        Self {
            question_id: q.id,
            prompt: q.prompt,
            topic: q.topic.as_str().to_string(),
            difficulty: q.difficulty.as_str().to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// A question, or a message explaining why there is none.
#[derive(Serialize, ToSchema)]
#[serde(untagged)]
pub enum QuestionOrMessage {
    Question(QuestionResponse),
    Message(MessageResponse),
}

impl QuestionOrMessage {
    fn from_option(question: Option<Question>, none_message: &str) -> Self {
        match question {
            Some(q) => QuestionOrMessage::Question(q.into()),
            None => QuestionOrMessage::Message(MessageResponse {
                message: none_message.to_string(),
            }),
        }
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CurrentQuestionQuery {
    /// The learner asking for a question.
    pub user_id: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AnswerRequest {
    pub user_id: Option<String>,
    pub question_id: Option<QuestionId>,
    pub user_answer: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AnswerResponse {
    /// The oracle's label; only `correct` scores.
    #[schema(example = "correct")]
    pub classification: String,
    pub next_question: QuestionOrMessage,
}

#[derive(Serialize, ToSchema)]
pub struct LeaderboardRow {
    pub user_id: String,
    pub total_score: u64,
}

impl From<LeaderboardEntry> for LeaderboardRow {
    fn from(e: LeaderboardEntry) -> Self {
        Self {
            user_id: e.learner_id,
            total_score: e.total_score,
        }
    }
}

pub(crate) fn required<T>(value: Option<T>, message: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::Validation(message.to_string()))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Get the learner's next unanswered question.
///
/// Creates the learner's profile and diagnostic round on first contact.
#[utoipa::path(
    get,
    path = "/currentQuestion",
    params(CurrentQuestionQuery),
    responses(
        (status = 200, description = "The next question, or a message when none is active", body = QuestionOrMessage),
        (status = 400, description = "user_id is missing"),
        (status = 503, description = "Question repository unavailable")
    )
)]
pub async fn current_question_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<CurrentQuestionQuery>,
) -> Result<Json<QuestionOrMessage>, ApiError> {
    let user_id = required(query.user_id, "user_id is required")?;
    let question = app_state.adaptive.current_question(&user_id).await?;
    Ok(Json(QuestionOrMessage::from_option(
        question,
        "No active question; maybe round is complete.",
    )))
}

/// Submit an answer to the learner's active question.
#[utoipa::path(
    post,
    path = "/answer",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer judged", body = AnswerResponse),
        (status = 400, description = "Missing fields, or the question is not active"),
        (status = 404, description = "Unknown question"),
        (status = 503, description = "Correctness oracle unavailable")
    )
)]
pub async fn answer_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<AnswerRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let missing = "user_id, question_id, user_answer are required.";
    let user_id = required(req.user_id, missing)?;
    let question_id = required(req.question_id, missing)?;
    let user_answer = required(req.user_answer, missing)?;

    let outcome = app_state
        .adaptive
        .submit_answer(&user_id, question_id, &user_answer)
        .await?;
    Ok(Json(AnswerResponse {
        classification: outcome.verdict.label,
        next_question: QuestionOrMessage::from_option(
            outcome.next_question,
            "No further question.",
        ),
    }))
}

/// The ten learners with the highest total score.
#[utoipa::path(
    get,
    path = "/leaderboard",
    responses(
        (status = 200, description = "Top learners by score", body = [LeaderboardRow])
    )
)]
pub async fn leaderboard_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<LeaderboardRow>>, ApiError> {
    let entries = app_state.adaptive.leaderboard(LEADERBOARD_SIZE).await?;
    Ok(Json(entries.into_iter().map(LeaderboardRow::from).collect()))
}
