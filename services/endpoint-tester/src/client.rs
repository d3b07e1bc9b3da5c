//! HTTP client for the scoring endpoint with connect-level retries.

use std::time::{Duration, Instant};

use mlops_core::TesterConfig;
use mlops_resilience::{retry_async, RetryConfig};
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TesterError {
    #[error("invalid scoring endpoint {0:?}")] InvalidEndpoint(String),
    #[error("transport error: {0}")] Transport(#[from] reqwest::Error),
    #[error("scoring endpoint answered {status}: {body}")] Status { status: u16, body: String },
    #[error("undecodable scoring response: {0}")] Decode(#[from] serde_json::Error),
}

impl TesterError {
    /// Only failures to reach the server are worth another attempt.
    pub fn is_connect(&self) -> bool { matches!(self, TesterError::Transport(e) if e.is_connect()) }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScoreReply {
    pub prediction: f64,
    pub model_info: String,
    #[serde(skip)]
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct ScoringClient {
    http: reqwest::Client,
    endpoint: Url,
    retry: RetryConfig,
}

impl ScoringClient {
    pub fn new(endpoint: &str, retry: RetryConfig) -> Result<Self, TesterError> {
        let endpoint = Url::parse(endpoint).map_err(|_| TesterError::InvalidEndpoint(endpoint.to_string()))?;
        if !matches!(endpoint.scheme(), "http" | "https") { return Err(TesterError::InvalidEndpoint(endpoint.to_string())); }
        Ok(Self { http: reqwest::Client::new(), endpoint, retry })
    }

    pub fn from_config(cfg: &TesterConfig) -> Result<Self, TesterError> {
        Self::new(&cfg.endpoint, RetryConfig::fixed(cfg.max_retries, Duration::from_millis(cfg.retry_delay_ms)))
    }

    pub fn endpoint(&self) -> &str { self.endpoint.as_str() }

    /// Score one feature value. `elapsed` covers the successful attempt only.
    pub async fn score(&self, x: f64) -> Result<ScoreReply, TesterError> {
        retry_async(&self.retry, |attempt| self.attempt(x, attempt), TesterError::is_connect).await
    }

    async fn attempt(&self, x: f64, attempt: usize) -> Result<ScoreReply, TesterError> {
        let started = Instant::now();
        let resp = self.http.post(self.endpoint.clone()).json(&serde_json::json!({ "X": x })).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        let elapsed = started.elapsed();
        if !status.is_success() { return Err(TesterError::Status { status: status.as_u16(), body }); }
        let mut reply: ScoreReply = serde_json::from_str(&body)?;
        reply.elapsed = elapsed;
        debug!(x, attempt, prediction=reply.prediction, elapsed_ms=elapsed.as_secs_f64() * 1e3, "scored_row");
        Ok(reply)
    }
}
