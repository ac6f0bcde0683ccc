use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::decision::ValidationResult;
use crate::error::{ModelError, ValidationError};
use crate::history::{History, HistoryEntry};
use crate::orchestrator::{ValidationContext, ValidationOrchestrator};
use crate::report::{ContextReport, Report};

const HISTORY_CAPACITY: usize = 2_000;
const DEFAULT_HISTORY_ROWS: usize = 10;

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<ValidationOrchestrator>,
    history: Arc<History>,
    weights_path: PathBuf,
}

impl AppState {
    pub fn new(orchestrator: Arc<ValidationOrchestrator>) -> Self {
        let weights_path = orchestrator.config().model.weights_path.clone();
        Self {
            orchestrator,
            history: Arc::new(History::with_capacity(HISTORY_CAPACITY)),
            weights_path,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/validate", post(validate))
        .route("/weights", get(weights))
        .route("/debug/history", get(debug_history))
        .route("/admin/reload-weights", post(admin_reload_weights))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ValidateReq {
    pub report: Report,
    /// Replaces the server's recent-report cache for this call.
    #[serde(default)]
    pub context: Option<Vec<ContextReport>>,
    #[serde(default)]
    pub rainfall_24h_mm: Option<f64>,
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ValidationError::InvalidInput { field, .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": self.to_string(), "field": field }),
            ),
            ValidationError::Model(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": self.to_string() }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for ModelError {
    fn into_response(self) -> Response {
        let status = match self {
            ModelError::Io(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn validate(
    State(state): State<AppState>,
    Json(body): Json<ValidateReq>,
) -> Result<Json<ValidationResult>, ValidationError> {
    let ctx = ValidationContext {
        reports: body.context.as_deref(),
        rainfall_24h_mm: body.rainfall_24h_mm,
    };
    let result = state.orchestrator.validate(&body.report, ctx).await?;
    state.history.push(&result);
    Ok(Json(result))
}

async fn weights(State(state): State<AppState>) -> Json<serde_json::Value> {
    let model = state.orchestrator.model();
    Json(json!({
        "normalized": model.get_weights(),
        "raw": model.weights,
        "bias": model.bias,
        "n_layers": model.n_layers,
    }))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    #[serde(default)]
    n: Option<usize>,
}

async fn debug_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Json<Vec<HistoryEntry>> {
    Json(
        state
            .history
            .snapshot_last_n(q.n.unwrap_or(DEFAULT_HISTORY_ROWS)),
    )
}

async fn admin_reload_weights(State(state): State<AppState>) -> Result<String, ModelError> {
    state.orchestrator.reload_weights(&state.weights_path)?;
    Ok("reloaded".to_string())
}
