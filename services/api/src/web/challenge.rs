//! services/api/src/web/challenge.rs
//!
//! Handlers for multi-participant challenges.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use progression_core::domain::{
    ChallengeSession, ChallengeSubmission, Difficulty, QuestionId,
};
use progression_core::{NewChallenge, RecordedAnswer};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::adaptive::required;
use crate::web::state::AppState;

const DEFAULT_QUESTION_COUNT: usize = 5;
const DEFAULT_TIME_LIMIT_SECS: u32 = 300;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ParticipantResponse {
    pub user: String,
    pub accepted: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ChallengeQuestionResponse {
    pub question_id: QuestionId,
    pub prompt: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StandingResponse {
    pub participant: String,
    pub total_score: u32,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct ChallengeResultResponse {
    pub winner: Option<String>,
    /// Participants ranked best first.
    pub details: Vec<StandingResponse>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeSessionResponse {
    pub id: Uuid,
    pub creator: String,
    pub participants: Vec<ParticipantResponse>,
    pub questions: Vec<ChallengeQuestionResponse>,
    #[schema(example = "medium")]
    pub difficulty: String,
    #[schema(example = "pending")]
    pub status: String,
    /// Seconds the challenge runs once everyone has accepted.
    pub time_limit: u32,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub result: Option<ChallengeResultResponse>,
}

impl From<ChallengeSession> for ChallengeSessionResponse {
    fn from(s: ChallengeSession) -> Self {
        Self {
            id: s.id,
            creator: s.creator,
            participants: s
                .participants
                .into_iter()
                .map(|p| ParticipantResponse {
                    user: p.user_id,
                    accepted: p.accepted,
                })
                .collect(),
            questions: s
                .questions
                .into_iter()
                .map(|q| ChallengeQuestionResponse {
                    question_id: q.question_id,
                    prompt: q.prompt,
                })
                .collect(),
            difficulty: s.difficulty.as_str().to_string(),
            status: s.status.as_str().to_string(),
            time_limit: s.time_limit_secs,
            created_at: s.created_at,
            start_time: s.start_time,
            end_time: s.end_time,
            result: s.result.map(|r| ChallengeResultResponse {
                winner: r.winner,
                details: r
                    .details
                    .into_iter()
                    .map(|d| StandingResponse {
                        participant: d.participant,
                        total_score: d.total_score,
                        finished_at: d.finished_at,
                    })
                    .collect(),
            }),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEntryResponse {
    #[serde(rename = "question_id")]
    pub question_id: QuestionId,
    pub answer: String,
    pub attempts: u8,
    pub correct: bool,
    pub time_taken: Option<f64>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub challenge_session: Uuid,
    pub participant: String,
    pub submissions: Vec<SubmissionEntryResponse>,
    pub total_score: u32,
    #[schema(example = "active")]
    pub status: String,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<ChallengeSubmission> for SubmissionResponse {
    fn from(s: ChallengeSubmission) -> Self {
        Self {
            challenge_session: s.session_id,
            participant: s.participant,
            submissions: s
                .entries
                .into_iter()
                .map(|e| SubmissionEntryResponse {
                    question_id: e.question_id,
                    answer: e.answer,
                    attempts: e.attempts,
                    correct: e.correct,
                    time_taken: e.time_taken,
                })
                .collect(),
            total_score: s.total_score,
            status: s.status.as_str().to_string(),
            finished_at: s.finished_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub submission: SubmissionResponse,
    #[schema(example = "correct")]
    pub classification: String,
    pub points_awarded: u32,
}

impl From<RecordedAnswer> for SubmitResponse {
    fn from(r: RecordedAnswer) -> Self {
        Self {
            submission: r.submission.into(),
            classification: r.verdict.label,
            points_awarded: r.points_awarded,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateChallengeRequest {
    pub creator: Option<String>,
    pub participants: Option<Vec<String>>,
    /// Defaults to 5.
    pub question_count: Option<usize>,
    /// `easy`, `medium` or `hard`. Defaults to `medium`.
    pub difficulty: Option<String>,
    /// Seconds, at most one day. Defaults to 300.
    pub time_limit: Option<u32>,
}

#[derive(Deserialize, ToSchema)]
pub struct AcceptRequest {
    pub user: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub participant: Option<String>,
    #[serde(rename = "question_id")]
    pub question_id: Option<QuestionId>,
    pub answer: Option<String>,
    /// Seconds the participant spent on the question.
    pub time_taken: Option<f64>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PendingQuery {
    /// The invited user.
    pub user: Option<String>,
}

fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::Validation(format!("'{}' is not a valid challenge id", raw)))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|e| ApiError::Validation(e.body_text()))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Create a challenge and invite participants.
#[utoipa::path(
    post,
    path = "/challenge/create",
    request_body = CreateChallengeRequest,
    responses(
        (status = 201, description = "Challenge created in the pending state", body = ChallengeSessionResponse),
        (status = 400, description = "Missing creator or participants, more questions than the bank holds, or a time limit out of range")
    )
)]
pub async fn create_challenge_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<CreateChallengeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ChallengeSessionResponse>), ApiError> {
    let req = body(payload)?;
    let missing = "creator and participants array are required";
    let creator = required(req.creator, missing)?;
    let participants = required(req.participants, missing)?;
    let difficulty = match req.difficulty.as_deref() {
        None => Difficulty::Medium,
        Some(raw) => Difficulty::parse(raw).ok_or_else(|| {
            ApiError::Validation(format!("'{}' is not one of easy, medium, hard", raw))
        })?,
    };

    let session = app_state
        .challenges
        .create(NewChallenge {
            creator,
            participants,
            question_count: req.question_count.unwrap_or(DEFAULT_QUESTION_COUNT),
            difficulty,
            time_limit_secs: req.time_limit.unwrap_or(DEFAULT_TIME_LIMIT_SECS),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// Fetch a challenge. An active challenge whose clock ran out is finalized first.
#[utoipa::path(
    get,
    path = "/challenge/{id}",
    params(("id" = Uuid, Path, description = "Challenge id")),
    responses(
        (status = 200, description = "The challenge", body = ChallengeSessionResponse),
        (status = 404, description = "Unknown challenge")
    )
)]
pub async fn get_challenge_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ChallengeSessionResponse>, ApiError> {
    let session = app_state.challenges.get(parse_session_id(&id)?).await?;
    Ok(Json(session.into()))
}

/// Pending challenges the user has been invited to and not yet accepted.
#[utoipa::path(
    get,
    path = "/challenge/pending",
    params(PendingQuery),
    responses(
        (status = 200, description = "Pending invitations", body = [ChallengeSessionResponse]),
        (status = 400, description = "user is missing")
    )
)]
pub async fn pending_challenges_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<PendingQuery>,
) -> Result<Json<Vec<ChallengeSessionResponse>>, ApiError> {
    let user = required(query.user, "user query param is required")?;
    let sessions = app_state.challenges.pending_for(&user).await?;
    Ok(Json(sessions.into_iter().map(Into::into).collect()))
}

/// Accept an invitation. The last acceptance starts the clock.
#[utoipa::path(
    post,
    path = "/challenge/{id}/accept",
    params(("id" = Uuid, Path, description = "Challenge id")),
    request_body = AcceptRequest,
    responses(
        (status = 200, description = "Updated challenge", body = ChallengeSessionResponse),
        (status = 400, description = "user is missing or not invited"),
        (status = 404, description = "Unknown challenge")
    )
)]
pub async fn accept_challenge_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<AcceptRequest>, JsonRejection>,
) -> Result<Json<ChallengeSessionResponse>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let user = required(body(payload)?.user, "user is required in request body")?;
    let session = app_state.challenges.accept(session_id, &user).await?;
    Ok(Json(session.into()))
}

/// Submit an answer to one of the challenge's questions.
#[utoipa::path(
    post,
    path = "/challenge/{id}/submit",
    params(("id" = Uuid, Path, description = "Challenge id")),
    request_body = SubmitRequest,
    responses(
        (status = 200, description = "Answer recorded", body = SubmitResponse),
        (status = 400, description = "Missing fields, challenge not active, or attempts exhausted"),
        (status = 404, description = "Unknown challenge"),
        (status = 503, description = "Correctness oracle unavailable")
    )
)]
pub async fn submit_challenge_answer_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let req = body(payload)?;
    let missing = "participant, question_id, and answer are required";
    let participant = required(req.participant, missing)?;
    let question_id = required(req.question_id, missing)?;
    let answer = required(req.answer, missing)?;

    let recorded = app_state
        .challenges
        .record_answer(session_id, &participant, question_id, &answer, req.time_taken)
        .await?;
    Ok(Json(recorded.into()))
}

/// A participant's answer ledger.
#[utoipa::path(
    get,
    path = "/challenge/{id}/submission/{participant}",
    params(
        ("id" = Uuid, Path, description = "Challenge id"),
        ("participant" = String, Path, description = "Participant user id")
    ),
    responses(
        (status = 200, description = "The ledger", body = SubmissionResponse),
        (status = 404, description = "No submission yet")
    )
)]
pub async fn get_submission_handler(
    State(app_state): State<Arc<AppState>>,
    Path((id, participant)): Path<(String, String)>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission = app_state
        .challenges
        .submission(parse_session_id(&id)?, &participant)
        .await?;
    Ok(Json(submission.into()))
}

/// Finalize the challenge and return its ranked result.
///
/// Answers 400 with progress diagnostics while participants are still playing.
#[utoipa::path(
    get,
    path = "/challenge/{id}/results",
    params(("id" = Uuid, Path, description = "Challenge id")),
    responses(
        (status = 200, description = "Completed challenge with its result", body = ChallengeSessionResponse),
        (status = 400, description = "Challenge still in progress"),
        (status = 404, description = "Unknown challenge")
    )
)]
pub async fn challenge_results_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ChallengeSessionResponse>, ApiError> {
    let session = app_state.challenges.finalize(parse_session_id(&id)?).await?;
    Ok(Json(session.into()))
}
