use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::RwLock;
use serde_json::{json, Map, Value};

use crate::dataset;
use crate::error::ServiceError;
use crate::features;
use crate::model::{self, ModelArtifact, MODEL_FILES};

const PREVIEW_ROWS: usize = 5;

pub struct LoadedModel {
    pub artifact: ModelArtifact,
    pub path: PathBuf,
}

// ---------- Server state ----------

/// The model handle is the only shared mutable state. Readers clone the
/// inner Arc and drop the lock, so a reload is a single reference swap and
/// in-flight predictions see either the old or the new artifact in full.
#[derive(Clone)]
pub struct AppState {
    model: Arc<RwLock<Option<Arc<LoadedModel>>>>,
    model_dir: Arc<PathBuf>,
    data_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(model_dir: PathBuf, data_path: PathBuf) -> Self {
        Self {
            model: Arc::new(RwLock::new(None)),
            model_dir: Arc::new(model_dir),
            data_path: Arc::new(data_path),
        }
    }

    pub fn current(&self) -> Option<Arc<LoadedModel>> {
        self.model.read().clone()
    }

    /// Resolve the candidate list and load the first artifact that exists.
    /// On failure the previously installed artifact stays in place.
    pub fn try_load(&self) -> anyhow::Result<PathBuf> {
        let path = model::resolve_model_path(&self.model_dir).ok_or_else(|| {
            anyhow::anyhow!(
                "no model file found in {}; tried {:?}",
                self.model_dir.display(),
                MODEL_FILES
            )
        })?;
        let artifact = ModelArtifact::load(&path)?;
        *self.model.write() = Some(Arc::new(LoadedModel {
            artifact,
            path: path.clone(),
        }));
        Ok(path)
    }
}

// ---------- Handlers ----------

async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let loaded = state.current();
    Json(json!({
        "ok": true,
        "model_loaded": loaded.is_some(),
        "model_path": loaded.map(|m| m.path.display().to_string()),
    }))
}

async fn predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ServiceError> {
    // Fail fast before touching the payload.
    let loaded = state.current().ok_or(ServiceError::ModelUnavailable)?;

    let payload = parse_payload(&headers, &body).map_err(ServiceError::PredictionFailed)?;
    let frame = features::coerce(&payload);
    let (prediction, probability) = loaded
        .artifact
        .predict(&frame)
        .map_err(|e| ServiceError::PredictionFailed(e.to_string()))?;

    Ok(Json(json!({
        "prediction": prediction,
        "probability": probability,
    })))
}

async fn reload_model(State(state): State<AppState>) -> impl IntoResponse {
    match state.try_load() {
        Ok(path) => {
            tracing::info!("reloaded model from {}", path.display());
            (
                StatusCode::OK,
                Json(json!({ "reloaded": true, "model_path": path.display().to_string() })),
            )
        }
        Err(e) => {
            tracing::error!("model reload failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "reloaded": false, "error": e.to_string() })),
            )
        }
    }
}

async fn data_head(State(state): State<AppState>) -> Result<Json<Value>, ServiceError> {
    let records = dataset::read_records(&state.data_path)
        .map_err(|e| ServiceError::DataUnavailable(e.to_string()))?;
    let head: Vec<_> = records.into_iter().take(PREVIEW_ROWS).collect();
    Ok(Json(json!({ "head": head })))
}

async fn data_tail(State(state): State<AppState>) -> Result<Json<Value>, ServiceError> {
    let records = dataset::read_records(&state.data_path)
        .map_err(|e| ServiceError::DataUnavailable(e.to_string()))?;
    let skip = records.len().saturating_sub(PREVIEW_ROWS);
    let tail: Vec<_> = records.into_iter().skip(skip).collect();
    Ok(Json(json!({ "tail": tail })))
}

// ---------- Payload parsing ----------

/// The endpoint accepts JSON objects or url-encoded form bodies; both reduce
/// to a string-keyed map that the coercion step interprets.
fn parse_payload(headers: &HeaderMap, body: &str) -> Result<Map<String, Value>, String> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);

    if is_json {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err("expected a JSON object".to_string()),
            Err(e) => Err(format!("invalid JSON body: {}", e)),
        }
    } else {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(body).map_err(|e| format!("invalid form body: {}", e))?;
        Ok(pairs
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/reload-model", post(reload_model))
        .route("/data-head", get(data_head))
        .route("/data-tail", get(data_tail))
        .with_state(state)
}
