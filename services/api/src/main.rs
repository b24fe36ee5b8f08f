mod config;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::{Config, Provider};
use viva_core::{
    Examiner, GeminiExaminer, InMemorySessionStore, OpenAiExaminer, TurnController, TurnRequest,
    TurnResponse, VivaCase,
};

/// One examination turn. The controller is infallible by design, so the only
/// caller-visible failures are transport-level.
async fn turn_handler(
    State(controller): State<Arc<TurnController>>,
    Json(req): Json<TurnRequest>,
) -> Json<TurnResponse> {
    Json(controller.handle_turn(&req).await)
}

async fn healthz() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    // --- 3. Load Case Content ---
    let case = match &config.case_file {
        Some(path) => VivaCase::from_json_file(path).context("Failed to load case file")?,
        None => VivaCase::builtin(),
    };
    info!(case_id = %case.id, title = %case.title, "Loaded viva case");

    // --- 4. Wire the Engine ---
    let examiner: Arc<dyn Examiner> = match config.provider {
        Provider::OpenAi => Arc::new(OpenAiExaminer::new(
            config.api_key.clone(),
            config.chat_model.clone(),
        )),
        Provider::Gemini => Arc::new(GeminiExaminer::new(
            config.api_key.clone(),
            config.chat_model.clone(),
        )),
    };
    let store = Arc::new(InMemorySessionStore::new(config.session_ttl));
    let controller = Arc::new(TurnController::new(
        store,
        examiner,
        Arc::new(case),
        config.examiner_timeout,
    ));

    // --- 5. Serve ---
    // Permissive CORS so the stateless browser client can call directly.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/viva/turn", post(turn_handler))
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(controller);

    info!(address = %config.bind_address, "Starting viva API server");
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
