//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        memory::load_question_bank, DbAdapter, HttpClassifierAdapter, MemoryStore,
        OpenAiOracleAdapter,
    },
    config::{Config, OracleBackend},
    error::ApiError,
    janitor,
    web::{router, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use progression_core::ports::{
    ChallengeStore, CorrectnessOracle, LearnerStore, QuestionRepository, SystemClock,
};
use progression_core::{AdaptiveController, ChallengeService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Stores {
    learners: Arc<dyn LearnerStore>,
    challenges: Arc<dyn ChallengeStore>,
    questions: Arc<dyn QuestionRepository>,
}

async fn build_stores(config: &Config) -> Result<Stores, ApiError> {
    match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            let db_adapter = Arc::new(DbAdapter::new(db_pool));
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");

            match load_question_bank(&config.question_bank_path) {
                Ok(questions) => {
                    db_adapter.seed_questions(&questions).await?;
                }
                Err(e) => warn!(
                    "Skipping question seeding from {}: {}",
                    config.question_bank_path.display(),
                    e
                ),
            }
            Ok(Stores {
                learners: db_adapter.clone(),
                challenges: db_adapter.clone(),
                questions: db_adapter,
            })
        }
        None => {
            warn!("DATABASE_URL is not set; state is kept in memory and lost on restart.");
            let questions = load_question_bank(&config.question_bank_path)?;
            info!(
                "Loaded {} questions from {}",
                questions.len(),
                config.question_bank_path.display()
            );
            let store = Arc::new(MemoryStore::new(questions));
            Ok(Stores {
                learners: store.clone(),
                challenges: store.clone(),
                questions: store,
            })
        }
    }
}

fn build_oracle(config: &Config) -> Result<Arc<dyn CorrectnessOracle>, ApiError> {
    match config.oracle_backend {
        OracleBackend::Http => {
            info!("Using answer classifier at {}", config.classifier_url);
            let adapter =
                HttpClassifierAdapter::new(config.classifier_url.clone(), config.oracle_timeout)
                    .map_err(|e| ApiError::Internal(e.to_string()))?;
            Ok(Arc::new(adapter))
        }
        OracleBackend::OpenAi => {
            let api_key = config
                .openai_api_key
                .as_ref()
                .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?;
            let client = Client::with_config(OpenAIConfig::new().with_api_key(api_key));
            info!("Using {} as the correctness oracle", config.oracle_model);
            Ok(Arc::new(OpenAiOracleAdapter::new(
                client,
                config.oracle_model.clone(),
            )))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for the shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Storage and Collaborators ---
    let stores = build_stores(&config).await?;
    let oracle = build_oracle(&config)?;

    // --- 3. Engine Services ---
    let adaptive = Arc::new(AdaptiveController::new(
        stores.learners,
        stores.questions.clone(),
        oracle.clone(),
        config.oracle_timeout,
    ));
    let challenges = Arc::new(ChallengeService::new(
        stores.challenges,
        stores.questions,
        oracle,
        Arc::new(SystemClock),
        config.oracle_timeout,
    ));

    // --- 4. Background Janitor ---
    let cancel = CancellationToken::new();
    let janitor_handle = janitor::spawn(
        adaptive.clone(),
        challenges.clone(),
        config.janitor_interval,
        cancel.clone(),
    );

    // --- 5. Build the Shared AppState and Router ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        adaptive,
        challenges,
    });
    let app = router(app_state);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    if let Err(e) = janitor_handle.await {
        warn!("Janitor task ended abnormally: {}", e);
    }
    Ok(())
}
