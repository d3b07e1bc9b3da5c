//! HTTP scoring service: one model loaded at startup, served read-only.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mlops_core::store::fetch_latest_model;
use mlops_core::{ModelArtifact, ObjectStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

pub const SCORE_PATH: &str = "/score/v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreRequest {
    #[serde(rename = "X")]
    pub x: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreResponse {
    pub prediction: f64,
    pub model_info: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("request body has no \"X\" field")] MissingFeature,
    #[error("\"X\" must be a finite number: {0}")] InvalidFeature(String),
    #[error("request body is not a JSON object: {0}")] MalformedBody(String),
    #[error("expected Content-Type: application/json")] UnsupportedMediaType,
}

impl ScoreError {
    pub fn status(&self) -> StatusCode {
        match self {
            ScoreError::MissingFeature | ScoreError::InvalidFeature(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ScoreError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ScoreError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ScoreError::MissingFeature => "missing_feature",
            ScoreError::InvalidFeature(_) => "invalid_feature",
            ScoreError::MalformedBody(_) => "malformed_body",
            ScoreError::UnsupportedMediaType => "unsupported_media_type",
        }
    }
}

impl From<JsonRejection> for ScoreError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => ScoreError::UnsupportedMediaType,
            other => ScoreError::MalformedBody(other.body_text()),
        }
    }
}

impl IntoResponse for ScoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(status=status.as_u16(), error=%self, "score_request_rejected");
        (status, Json(ErrorBody { error: self.code().to_string(), message: self.to_string() })).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ModelArtifact>,
}

pub fn router(model: Arc<ModelArtifact>) -> Router {
    Router::new()
        .route(SCORE_PATH, post(score))
        .route("/live", get(|| async { Json(serde_json::json!({"live": true})) }))
        .with_state(AppState { model })
}

fn feature(body: &Value) -> Result<f64, ScoreError> {
    let obj = body.as_object().ok_or_else(|| ScoreError::MalformedBody(format!("got {body}")))?;
    let raw = obj.get("X").ok_or(ScoreError::MissingFeature)?;
    let x = raw.as_f64().ok_or_else(|| ScoreError::InvalidFeature(format!("got {raw}")))?;
    if !x.is_finite() { return Err(ScoreError::InvalidFeature(format!("got {x}"))); }
    Ok(x)
}

#[instrument(skip_all)]
async fn score(State(state): State<AppState>, body: Result<Json<Value>, JsonRejection>) -> Result<Json<ScoreResponse>, ScoreError> {
    let Json(body) = body?;
    let x = feature(&body)?;
    let prediction = state.model.model.predict(&[x]).map_err(|e| ScoreError::InvalidFeature(e.to_string()))?;
    if !prediction.is_finite() { return Err(ScoreError::InvalidFeature(format!("prediction for {x} is not finite"))); }
    info!(x, prediction, "scored");
    Ok(Json(ScoreResponse { prediction, model_info: state.model.model_info() }))
}

/// Fetch the newest model under `models/`; the server never reloads it.
pub async fn load_model(store: &dyn ObjectStore) -> Result<Arc<ModelArtifact>> {
    let (key, artifact) = fetch_latest_model(store).await.context("loading latest model")?;
    info!(key=%key.key, info=%artifact.model_info(), "model_loaded");
    Ok(Arc::new(artifact))
}

pub async fn serve<F>(listener: TcpListener, model: Arc<ModelArtifact>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("reading listener address")?;
    info!(%addr, path=SCORE_PATH, "scoring_service_listening");
    axum::serve(listener, router(model)).with_graceful_shutdown(shutdown).await.context("serving http")?;
    info!("scoring_service_stopped");
    Ok(())
}
