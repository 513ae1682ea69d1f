//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question through the tool router |
//! | `GET`  | `/health` | Health check |
//! | `GET`  | `/` | Service metadata |
//! | `GET`  | `/tools/list` | The search tools with their input schemas |
//! | `POST` | `/tools/{name}` | Run one search tool directly |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "upstream", "message": "LLM provider is disabled" } }
//! ```
//!
//! Empty queries are `400 bad_request`; an unknown tool is `404 not_found`.
//! Every other failure is a `500` whose code names the failure class:
//! `configuration`, `store_unavailable`, `upstream`, `timeout`, `internal`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use repo_harness_core::agent::{SearchTool, ToolRouter};
use repo_harness_core::HarnessError;

use crate::agent::answer_within;
use crate::config::Config;

const SERVICE_NAME: &str = "Repo Harness (repository + docs Q&A)";

#[derive(Clone)]
pub struct AppState {
    router: Arc<ToolRouter>,
    /// Deadline for one `/ask`.
    ask_timeout: Duration,
}

impl AppState {
    pub fn new(router: Arc<ToolRouter>, ask_timeout: Duration) -> Self {
        Self {
            router,
            ask_timeout,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .layer(cors)
        .with_state(state)
}

/// Bind `config.server.bind` and serve until the process is terminated.
pub async fn run_server(config: &Config, router: Arc<ToolRouter>) -> anyhow::Result<()> {
    let state = AppState::new(router, Duration::from_secs(config.agent.timeout_secs));
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "HTTP server listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: code.to_string(),
        message: message.into(),
    }
}

impl From<HarnessError> for AppError {
    fn from(err: HarnessError) -> Self {
        match err {
            HarnessError::InvalidRequest(msg) => bad_request(msg),
            other => {
                warn!(code = other.code(), error = %other, "request failed");
                internal(other.code(), other.to_string())
            }
        }
    }
}

/// `query` as a non-empty string, or 400.
fn required_query(body: &Value) -> Result<&str, AppError> {
    match body.get("query").and_then(Value::as_str) {
        Some(q) if !q.trim().is_empty() => Ok(q),
        Some(_) => Err(bad_request("query must not be empty")),
        None => Err(bad_request("missing string field: query")),
    }
}

// ============ POST /ask ============

#[derive(Serialize, Deserialize)]
pub struct AskResponse {
    pub result: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(body) = body.map_err(|rejection| bad_request(rejection.body_text()))?;
    let query = required_query(&body)?;
    debug!(query, "ask");

    let answer = answer_within(&state.router, query, state.ask_timeout).await?;

    Ok(Json(AskResponse { result: answer }))
}

// ============ GET /health, GET / ============

async fn handle_health() -> Json<Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn handle_root() -> Json<Value> {
    Json(serde_json::json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "ask": "POST /ask - Ask questions about the repository",
            "health": "GET /health - Health check",
            "tools": "GET /tools/list - List search tools",
            "tool_call": "POST /tools/{name} - Run a search tool",
        }
    }))
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .router
        .tools()
        .iter()
        .map(|t| ToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            parameters: t.input_schema(),
        })
        .collect();
    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let registered = name
        .parse::<SearchTool>()
        .map(|tool| state.router.tools().contains(&tool))
        .unwrap_or(false);
    if !registered {
        return Err(not_found(format!("no tool registered with name: {}", name)));
    }

    let Json(body) = body.map_err(|rejection| bad_request(rejection.body_text()))?;
    let query = required_query(&body)?;
    let result = state.router.invoke(&name, query).await?;
    Ok(Json(AskResponse { result }))
}
