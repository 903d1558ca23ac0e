pub mod adaptive;
pub mod challenge;
pub mod rest;
pub mod state;

use std::sync::Arc;

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::web::rest::ApiDoc;
use crate::web::state::AppState;

/// Builds the full HTTP application: API routes, Swagger UI, CORS and
/// per-request tracing.
pub fn router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(app_state.config.cors_origin.clone())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    let adaptive_routes = Router::new()
        .route("/currentQuestion", get(adaptive::current_question_handler))
        .route("/answer", post(adaptive::answer_handler))
        .route("/leaderboard", get(adaptive::leaderboard_handler));

    let challenge_routes = Router::new()
        .route("/challenge/create", post(challenge::create_challenge_handler))
        .route("/challenge/pending", get(challenge::pending_challenges_handler))
        .route("/challenge/{id}", get(challenge::get_challenge_handler))
        .route("/challenge/{id}/accept", post(challenge::accept_challenge_handler))
        .route("/challenge/{id}/submit", post(challenge::submit_challenge_answer_handler))
        .route(
            "/challenge/{id}/submission/{participant}",
            get(challenge::get_submission_handler),
        )
        .route("/challenge/{id}/results", get(challenge::challenge_results_handler));

    let api_router = Router::new()
        .merge(adaptive_routes)
        .merge(challenge_routes)
        .with_state(app_state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
