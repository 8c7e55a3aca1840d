//! Axum route handlers for the style-learning HTTP server.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::analyzer::TextAnalyzer;
use crate::buffer::BufferedIngestion;
use crate::cluster::{OnlineClusterUpdater, ReplyClusterEngine};
use crate::config::StyleConfig;
use crate::error::StyleError;
use crate::locks::UserLocks;
use crate::profile::GeneralStyleLearner;
use crate::storage::{SampleSource, SqliteStyleStore};

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStyleStore>,
    pub learner: Arc<GeneralStyleLearner>,
    pub ingestion: Arc<BufferedIngestion>,
    pub engine: Arc<ReplyClusterEngine>,
    pub updater: Arc<OnlineClusterUpdater>,
}

impl AppState {
    /// Wire all engines over one store, one analyzer, and one shared set of
    /// per-user locks.
    pub fn new(
        store: Arc<SqliteStyleStore>,
        analyzer: Arc<dyn TextAnalyzer>,
        config: &StyleConfig,
    ) -> Self {
        let locks = UserLocks::new();
        let learner = Arc::new(GeneralStyleLearner::new(
            store.clone(),
            analyzer.clone(),
            config.label_thresholds,
            locks.clone(),
        ));
        let ingestion = Arc::new(BufferedIngestion::new(
            store.clone(),
            learner.clone(),
            locks.clone(),
            config.buffer_threshold,
        ));
        let engine = Arc::new(ReplyClusterEngine::new(
            store.clone(),
            analyzer.clone(),
            locks.clone(),
            config,
        ));
        let updater = Arc::new(OnlineClusterUpdater::new(
            store.clone(),
            analyzer,
            engine.clone(),
            locks,
            config,
        ));
        Self {
            store,
            learner,
            ingestion,
            engine,
            updater,
        }
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/buffer/ping", get(ping_buffer_handler))
        .route("/style/init", post(style_init_handler))
        .route("/style/update", post(style_update_handler))
        .route("/style/get", post(style_get_handler))
        .route("/buffer/add", post(buffer_add_handler))
        .route("/reply/init", post(reply_init_handler))
        .route("/reply/update", post(reply_update_handler))
        .route("/reply/get-style", post(reply_get_style_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type HandlerError = (StatusCode, Json<Value>);

/// Map a domain error onto the HTTP surface.
///
/// Recoverable absences are client-visible 4xx; analyzer trouble is a bad
/// gateway since the collaborator, not this service, failed.
fn error_response(err: StyleError) -> HandlerError {
    let status = match &err {
        StyleError::ProfileNotFound { .. } | StyleError::NoClusters { .. } => {
            StatusCode::NOT_FOUND
        }
        StyleError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        StyleError::InvalidSource { .. } => StatusCode::BAD_REQUEST,
        StyleError::Analyzer(_) => StatusCode::BAD_GATEWAY,
        StyleError::Store(_) | StyleError::Io(_) | StyleError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

/// GET /health — liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "stylelearn",
    }))
}

/// GET /buffer/ping — buffer-service liveness probe.
async fn ping_buffer_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "buffer online" }))
}

// ---------------------------------------------------------------------------
// General style
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct StyleInitRequest {
    user_id: String,
    emails: Vec<String>,
}

/// POST /style/init — bulk-learn general style from a list of emails.
async fn style_init_handler(
    State(state): State<AppState>,
    Json(request): Json<StyleInitRequest>,
) -> Result<Json<Value>, HandlerError> {
    let (labels, vector) = state
        .learner
        .learn(&request.user_id, &request.emails)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({
        "derived_labels": labels,
        "feature_vector": vector,
    })))
}

#[derive(Deserialize)]
struct StyleUpdateRequest {
    user_id: String,
    email_text: String,
}

/// POST /style/update — fold one email into the running style.
async fn style_update_handler(
    State(state): State<AppState>,
    Json(request): Json<StyleUpdateRequest>,
) -> Result<Json<Value>, HandlerError> {
    let labels = state
        .learner
        .update(&request.user_id, &request.email_text)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "derived_labels": labels })))
}

#[derive(Deserialize)]
struct StyleGetRequest {
    user_id: String,
}

/// POST /style/get — current derived labels; 404 when no profile exists.
async fn style_get_handler(
    State(state): State<AppState>,
    Json(request): Json<StyleGetRequest>,
) -> Result<Json<Value>, HandlerError> {
    let labels = state
        .learner
        .current_labels(&request.user_id)
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "derived_labels": labels })))
}

// ---------------------------------------------------------------------------
// Buffered ingestion
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct BufferAddRequest {
    user_id: String,
    email_text: String,
    source: String,
}

/// POST /buffer/add — enqueue a sample, then check the threshold on a
/// detached task so the producer never waits on learning.
async fn buffer_add_handler(
    State(state): State<AppState>,
    Json(request): Json<BufferAddRequest>,
) -> Result<Json<Value>, HandlerError> {
    let source: SampleSource = request.source.parse().map_err(error_response)?;
    state
        .ingestion
        .enqueue(&request.user_id, &request.email_text, source)
        .map_err(error_response)?;

    let ingestion = state.ingestion.clone();
    let user_id = request.user_id.clone();
    tokio::spawn(async move {
        if let Err(e) = ingestion.maybe_learn(&user_id).await {
            tracing::warn!(user_id = %user_id, error = %e, "background buffer learning failed");
        }
    });

    Ok(Json(serde_json::json!({ "status": "buffered" })))
}

// ---------------------------------------------------------------------------
// Reply clusters
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ReplyInitRequest {
    user_id: String,
    /// `[incoming, reply]` pairs.
    pairs: Vec<(String, String)>,
}

/// POST /reply/init — append pairs and run a full re-cluster.
async fn reply_init_handler(
    State(state): State<AppState>,
    Json(request): Json<ReplyInitRequest>,
) -> Result<Json<Value>, HandlerError> {
    let clusters = state
        .engine
        .initialize(&request.user_id, &request.pairs)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({
        "status": "initialized",
        "clusters": clusters,
    })))
}

#[derive(Deserialize)]
struct ReplyUpdateRequest {
    user_id: String,
    incoming_email: String,
    reply_email: String,
}

/// POST /reply/update — feed one pair into the online updater.
///
/// A user without clusters reports 400: online updates require a prior
/// `/reply/init`.
async fn reply_update_handler(
    State(state): State<AppState>,
    Json(request): Json<ReplyUpdateRequest>,
) -> Result<Json<Value>, HandlerError> {
    state
        .updater
        .apply_pair(
            &request.user_id,
            &request.incoming_email,
            &request.reply_email,
        )
        .await
        .map_err(|err| match err {
            StyleError::NoClusters { .. } => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": err.to_string() })),
            ),
            other => error_response(other),
        })?;
    Ok(Json(serde_json::json!({ "status": "updated" })))
}

#[derive(Deserialize)]
struct ReplyGetStyleRequest {
    user_id: String,
    email_text: String,
}

/// POST /reply/get-style — labels of the reply style the user tends toward
/// for mail that looks like the given text; 404 when no clusters exist.
async fn reply_get_style_handler(
    State(state): State<AppState>,
    Json(request): Json<ReplyGetStyleRequest>,
) -> Result<Json<Value>, HandlerError> {
    let labels = state
        .engine
        .nearest_cluster_labels(&request.user_id, &request.email_text)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({ "derived_labels": labels })))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
