//! HTTP server setup and the small top-level handlers.

use std::sync::Arc;

use axum::middleware;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::analyzer::EvidenceAnalyzer;
use crate::assistant::BoardAssistant;
use crate::config::Config;
use crate::google::{GoogleAuth, ServiceAccount};
use crate::llm::{GeminiClient, SharedLlmClient};
use crate::output::{OutputGenerator, ReportWindow};
use crate::storage::{DriveStorage, MemoryFileStorage, SharedFileStorage};
use crate::store::{MemoryTaskStore, SharedTaskStore, SheetsTaskStore};
use crate::task::{EvidenceCategory, TaskStatus};
use crate::tracker::Tracker;

use super::auth;
use super::errors::task_error;
use super::types::*;
use super::{chat, outputs, tasks};

/// Extra body allowance on uploads for multipart framing and the notes field.
const UPLOAD_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// `google` or `memory`
    pub backend: &'static str,
    pub tracker: Tracker,
    pub outputs: OutputGenerator,
    pub assistant: BoardAssistant,
}

impl AppState {
    pub fn new(
        config: Config,
        backend: &'static str,
        store: SharedTaskStore,
        storage: SharedFileStorage,
        llm: SharedLlmClient,
    ) -> Self {
        let model = config.ai.model.clone();
        let analyzer = Arc::new(EvidenceAnalyzer::new(Arc::clone(&llm), model.clone()));
        Self {
            tracker: Tracker::new(store, storage, analyzer, config.max_upload_bytes),
            outputs: OutputGenerator::new(Arc::clone(&llm), model.clone()),
            assistant: BoardAssistant::new(llm, model),
            backend,
            config,
        }
    }
}

/// Connect the task store and file storage named by the config.
///
/// Without Google settings (dev mode only) both live in memory.
async fn connect_backends(
    config: &Config,
) -> anyhow::Result<(&'static str, SharedTaskStore, SharedFileStorage)> {
    let Some(google) = config.google.as_ref() else {
        if !config.dev_mode {
            anyhow::bail!("Google settings are required outside dev mode");
        }
        tracing::warn!("Google credentials not configured, using in-memory task store and file storage");
        return Ok((
            "memory",
            Arc::new(MemoryTaskStore::new()),
            Arc::new(MemoryFileStorage::new()),
        ));
    };

    let account = ServiceAccount::from_file(&google.service_account_json)?;
    let auth = Arc::new(GoogleAuth::new(account)?);
    tracing::info!("Using Google service account {}", auth.client_email());

    let store =
        SheetsTaskStore::connect(Arc::clone(&auth), &google.sheets_id, &google.worksheet).await?;
    let storage = DriveStorage::new(auth, &google.drive_folder_id);
    Ok(("google", Arc::new(store), Arc::new(storage)))
}

/// Build the full router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login));

    let upload_limit = (state.config.max_upload_bytes + UPLOAD_OVERHEAD_BYTES) as usize;
    let upload_route = Router::new()
        .route("/api/tasks/upload", post(tasks::upload_evidence))
        .layer(DefaultBodyLimit::max(upload_limit));

    let protected_routes = Router::new()
        .route("/api/stats", get(get_stats))
        .route("/api/board", get(get_board))
        .route("/api/tasks", get(tasks::list_tasks))
        .route("/api/tasks/export", get(tasks::export_tasks))
        .route("/api/tasks/:id", get(tasks::get_task))
        .route("/api/tasks/:id/status", post(tasks::set_status))
        .merge(upload_route)
        .nest("/api/outputs", outputs::routes())
        .route("/api/chat", post(chat::chat))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let (backend, store, storage) = connect_backends(&config).await?;
    let llm: SharedLlmClient = Arc::new(GeminiClient::new(config.ai.api_key.clone()));
    tracing::info!("Using model {} ({} backend)", config.ai.model, backend);

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, backend, store, storage, llm));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dev_mode: state.config.dev_mode,
        auth_required: state.config.auth.auth_required(state.config.dev_mode),
        backend: state.backend.to_string(),
        model: state.config.ai.model.clone(),
    })
}

/// Task counts per status and per evidence category.
async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, (StatusCode, String)> {
    let board = state.tracker.board().await.map_err(task_error)?;
    let week = ReportWindow::current_week(Utc::now().date_naive());

    let mut by_category: Vec<CategoryCount> = EvidenceCategory::ALL
        .into_iter()
        .map(|category| CategoryCount { category, count: 0 })
        .collect();
    let mut done_this_week = 0;
    for column in &board.columns {
        for task in &column.tasks {
            if let Some(entry) = by_category
                .iter_mut()
                .find(|c| c.category == task.evidence().category())
            {
                entry.count += 1;
            }
            if task.status() == TaskStatus::Done && week.contains(task.created_at()) {
                done_this_week += 1;
            }
        }
    }

    Ok(Json(StatsResponse {
        total_tasks: board.total,
        by_status: board
            .columns
            .iter()
            .map(|c| StatusCount {
                status: c.status,
                count: c.count,
            })
            .collect(),
        by_category,
        done_this_week,
    }))
}

/// The five workflow columns.
async fn get_board(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BoardResponse>, (StatusCode, String)> {
    let board = state.tracker.board().await.map_err(task_error)?;
    Ok(Json(board.into()))
}

#[cfg(test)]
pub(crate) fn test_state(
    replies: Vec<Result<String, String>>,
) -> (Arc<AppState>, Arc<crate::testing::ScriptedLlm>) {
    let config = Config::from_lookup(|key| match key {
        "DEV_MODE" => Some("true".to_string()),
        "GEMINI_API_KEY" => Some("test-key".to_string()),
        "MAX_UPLOAD_MB" => Some("1".to_string()),
        _ => None,
    })
    .expect("dev config");
    let llm = Arc::new(crate::testing::ScriptedLlm::new(replies));
    let state = AppState::new(
        config,
        "memory",
        Arc::new(MemoryTaskStore::new()),
        Arc::new(MemoryFileStorage::new()),
        llm.clone(),
    );
    (Arc::new(state), llm)
}
