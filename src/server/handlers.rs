//! HTTP request handlers

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::error::ApiError;
use super::AppState;
use crate::executor::{execute_command, ExecError, ExecutionContext, Params};
use crate::metrics::{self, SystemInfo};
use crate::models::{CommandInvocation, CommandResult, OperationResult, OperationStatus};

/// Body of a test run request
#[derive(Debug, Default, Deserialize)]
pub struct TestRequest {
    #[serde(default)]
    pub params: Option<Params>,
}

/// Result envelope returned by the test endpoints
#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub id: String,
    pub status: OperationStatus,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub duration_ms: u64,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<&OperationResult> for TestResponse {
    fn from(result: &OperationResult) -> Self {
        Self {
            id: result.test_id.clone(),
            status: result.status,
            started: result.start_time,
            finished: result.end_time,
            duration_ms: result.duration_ms,
            output: result.output.clone(),
            error: result.error.clone(),
            data: result.data.clone(),
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().timestamp(),
        "version": env!("CARGO_PKG_VERSION"),
        "operations": state.registry.len(),
    }))
}

pub async fn system_info() -> Result<Json<SystemInfo>, ApiError> {
    let info = tokio::task::spawn_blocking(metrics::collect_system_info)
        .await
        .map_err(|e| ApiError::Internal(format!("system info collection failed: {e}")))?;
    Ok(Json(info))
}

/// Run an ad-hoc command
///
/// Dropping the request drops the child handle, which kills the process.
pub async fn exec_command(
    payload: Result<Json<CommandInvocation>, JsonRejection>,
) -> Result<(StatusCode, Json<CommandResult>), ApiError> {
    let Json(invocation) = payload
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e.body_text())))?;

    if invocation.command.trim().is_empty() {
        return Err(ApiError::BadRequest("command must not be empty".to_string()));
    }

    info!("Executing command: {}", invocation);
    let result = execute_command(&invocation).await;

    let status = match &result.failure {
        None | Some(ExecError::Signal) => StatusCode::OK,
        Some(ExecError::TimedOut { .. }) => StatusCode::REQUEST_TIMEOUT,
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    Ok((status, Json(result)))
}

pub async fn list_tests(State(state): State<AppState>) -> Json<Value> {
    let tests = state.registry.list();
    Json(json!({
        "count": tests.len(),
        "tests": tests,
    }))
}

/// Run a registered test; an empty body means no parameters
pub async fn run_test(
    State(state): State<AppState>,
    Path(test_id): Path<String>,
    body: Bytes,
) -> Result<Json<TestResponse>, ApiError> {
    let request: TestRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TestRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?
    };

    let ctx = ExecutionContext::background().with_params(request.params.unwrap_or_default());
    let result = state.registry.run(&test_id, &ctx).await?;
    Ok(Json(TestResponse::from(result.as_ref())))
}

pub async fn get_test_result(
    State(state): State<AppState>,
    Path(test_id): Path<String>,
) -> Result<Json<TestResponse>, ApiError> {
    state
        .registry
        .get_result(&test_id)
        .map(|result| Json(TestResponse::from(result.as_ref())))
        .ok_or_else(|| ApiError::NotFound(format!("no result for test '{test_id}'")))
}
