use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::error::{AdvisorChatError, Result};
use crate::providers::upstream::{UpstreamClient, UpstreamError};
use crate::transcript::Turn;

pub const CHAT_PATH: &str = "/api/chat";

/// Everything a request handler may read. Nothing in here is mutated after
/// startup, so concurrent callers never observe each other's transcripts.
#[derive(Clone)]
pub struct AppState {
    pub api_key: Option<Arc<str>>,
    pub upstream: Arc<UpstreamClient>,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            api_key: config.api_key().map(Arc::from),
            upstream: Arc::new(UpstreamClient::from_config(config)),
            static_dir: config.static_dir.clone(),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Deserialize)]
struct ChatPayload {
    messages: Vec<Turn>,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Server missing OPENAI_API_KEY environment variable.")]
    MissingCredential,
    #[error("Bad request: `messages` must be an array of {{role, content}} turns.")]
    BadRequest(String),
    #[error("Proxy error contacting upstream.")]
    Upstream(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingCredential => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            ProxyError::MissingCredential | ProxyError::BadRequest(_) => None,
            ProxyError::Upstream(details) => Some(details.clone()),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                message: self.to_string(),
                details: self.details(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<UpstreamError> for ProxyError {
    fn from(err: UpstreamError) -> Self {
        ProxyError::Upstream(err.to_string())
    }
}

pub fn build_router(state: AppState) -> Router {
    let assets = ServeDir::new(&state.static_dir).append_index_html_on_directories(true);
    Router::new()
        .route("/health", get(health))
        .route(CHAT_PATH, post(chat))
        .fallback_service(assets)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

fn parse_transcript(body: &[u8]) -> std::result::Result<Vec<Turn>, ProxyError> {
    serde_json::from_slice::<ChatPayload>(body)
        .map(|payload| payload.messages)
        .map_err(|err| ProxyError::BadRequest(err.to_string()))
}

async fn chat(State(state): State<AppState>, body: Bytes) -> Response {
    match forward_chat(&state, &body).await {
        Ok(response) => response,
        Err(err) => {
            match &err {
                ProxyError::MissingCredential => {
                    tracing::error!("Rejecting chat request: no upstream credential configured")
                }
                ProxyError::BadRequest(reason) => {
                    tracing::warn!(%reason, "Rejecting malformed transcript")
                }
                ProxyError::Upstream(details) => {
                    tracing::error!(%details, "Upstream completion call failed")
                }
            }
            err.into_response()
        }
    }
}

async fn forward_chat(state: &AppState, body: &[u8]) -> std::result::Result<Response, ProxyError> {
    let api_key = state.api_key.as_deref().ok_or(ProxyError::MissingCredential)?;
    let messages = parse_transcript(body)?;

    tracing::debug!(
        turns = messages.len(),
        model = state.upstream.model(),
        "Forwarding transcript upstream"
    );
    let reply = state.upstream.complete(api_key, &messages).await?;

    if reply.is_success() {
        tracing::info!(status = %reply.status, "Upstream completion relayed");
        return Ok((StatusCode::OK, Json(reply.body)).into_response());
    }

    tracing::warn!(status = %reply.status, "Relaying upstream error");
    Ok((reply.status, Json(reply.body)).into_response())
}

pub async fn run_with_shutdown<F>(config: ProxyConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if config.api_key().is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; every chat request will fail with 500");
    }
    if !config.static_dir.is_dir() {
        tracing::warn!(
            static_dir = %config.static_dir.display(),
            "Static directory not found; only API routes will respond"
        );
    }

    let state = AppState::from_config(&config);
    let app = build_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AdvisorChatError::Runtime(format!("bind {addr}: {e}")))?;

    tracing::info!(
        "Server listening on http://{} (MODEL={})",
        addr,
        config.model
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AdvisorChatError::Runtime(e.to_string()))?;

    Ok(())
}
