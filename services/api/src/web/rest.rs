//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification.

use utoipa::OpenApi;

use crate::web::{adaptive, challenge};

#[derive(OpenApi)]
#[openapi(
    paths(
        adaptive::current_question_handler,
        adaptive::answer_handler,
        adaptive::leaderboard_handler,
        challenge::create_challenge_handler,
        challenge::pending_challenges_handler,
        challenge::get_challenge_handler,
        challenge::accept_challenge_handler,
        challenge::submit_challenge_answer_handler,
        challenge::get_submission_handler,
        challenge::challenge_results_handler,
    ),
    components(
        schemas(
            adaptive::QuestionResponse,
            adaptive::MessageResponse,
            adaptive::QuestionOrMessage,
            adaptive::AnswerRequest,
            adaptive::AnswerResponse,
            adaptive::LeaderboardRow,
            challenge::CreateChallengeRequest,
            challenge::AcceptRequest,
            challenge::SubmitRequest,
            challenge::SubmitResponse,
            challenge::ChallengeSessionResponse,
            challenge::SubmissionResponse,
        )
    ),
    tags(
        (name = "Progression API", description = "Adaptive assessment and timed multi-participant challenges.")
    )
)]
pub struct ApiDoc;
