//! HTTP API over the question pipeline and the statement executor.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Liveness banner |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/query` | Run SQL on the configured warehouse |
//! | `POST` | `/ask` | Ask the agent and return a shaped result |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `timeout` (408), `upstream` (502),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends can
//! call the API directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::conversation::ConversationClient;
use crate::error::GenieError;
use crate::models::{MessageStatus, Record};
use crate::pipeline::Pipeline;
use crate::shape::ShapedResponse;
use crate::statement::StatementExecutor;
use crate::transport::Transport;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let transport = Transport::from_config(config)?;
        let conversation = ConversationClient::from_config(config, transport.clone());
        let executor = StatementExecutor::from_config(config, transport);
        let pipeline = Pipeline::from_config(config, conversation, executor);
        Ok(Self::new(pipeline))
    }
}

/// Builds the router with all routes and the CORS layer.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/query", post(handle_query))
        .route("/ask", post(handle_ask))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let app = build_router(state);

    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, "http api listening");
    println!("Genie harness API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"upstream"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: code.to_string(),
        message: message.into(),
    }
}

impl From<GenieError> for AppError {
    fn from(err: GenieError) -> Self {
        let message = err.to_string();
        match err {
            GenieError::InvalidInput(_) => {
                app_error(StatusCode::BAD_REQUEST, "bad_request", message)
            }
            GenieError::Timeout { .. } => {
                app_error(StatusCode::REQUEST_TIMEOUT, "timeout", message)
            }
            GenieError::Transport { .. }
            | GenieError::QueryExecution(_)
            | GenieError::MalformedResponse(_) => {
                app_error(StatusCode::BAD_GATEWAY, "upstream", message)
            }
        }
    }
}

// ============ GET / and GET /health ============

#[derive(Serialize)]
struct RootResponse {
    message: String,
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Genie harness API is running".to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
}

#[derive(Serialize)]
struct QueryResponse {
    results: Vec<Record>,
}

/// Runs the raw statement and returns its rows keyed by column name.
async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(app_error(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "query must not be empty",
        ));
    }
    let pipeline = &state.pipeline;
    let warehouse_id = pipeline.warehouse_id().ok_or_else(|| {
        app_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "no warehouse configured",
        )
    })?;

    let result = pipeline
        .executor()
        .execute(warehouse_id, &req.query, pipeline.statement_timeout_secs())
        .await?;

    Ok(Json(QueryResponse {
        results: result.records(),
    }))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Serialize)]
struct AskResponse {
    conversation_id: String,
    status: MessageStatus,
    /// `null` when the agent message ended FAILED or CANCELLED.
    response: Option<ShapedResponse>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let conversation_id = req
        .conversation_id
        .as_deref()
        .filter(|id| !id.trim().is_empty());

    let outcome = state.pipeline.respond(&req.question, conversation_id).await?;

    Ok(Json(AskResponse {
        conversation_id: outcome.conversation_id,
        status: outcome.status,
        response: outcome.response,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_follow_variant() {
        let e: AppError = GenieError::InvalidInput("x".into()).into();
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.code, "bad_request");

        let e: AppError = GenieError::Timeout { what: "SQL statement".into(), secs: 2 }.into();
        assert_eq!(e.status, StatusCode::REQUEST_TIMEOUT);

        let e: AppError = GenieError::QueryExecution("boom".into()).into();
        assert_eq!(e.status, StatusCode::BAD_GATEWAY);
        assert_eq!(e.code, "upstream");
        assert!(e.message.contains("boom"));
    }
}
