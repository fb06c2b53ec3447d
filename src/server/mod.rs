//! HTTP surface
//!
//! Routes health, system info, command execution and the test endpoints
//! onto the shared registry.

mod error;
mod handlers;

pub use error::ApiError;

use anyhow::{Context, Result};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::registry::{panic_message, Registry};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/system/info", get(handlers::system_info))
        .route("/cmd/exec", post(handlers::exec_command))
        .route("/tests/list", get(handlers::list_tests))
        .route("/tests/run/{test_id}", post(handlers::run_test))
        .route("/tests/results/{test_id}", get(handlers::get_test_result));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

/// Serve until SIGINT or SIGTERM
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    error!("Request handler panicked: {}", panic_message(panic.as_ref()));
    ApiError::Internal("internal server error".to_string()).into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Operation, OperationResult};
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::time::{Duration, Instant};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let registry = Registry::new();
        registry
            .register(Operation::new(
                "disk-info",
                "Disk info",
                "Collects disk information",
                |_| async {
                    let result = OperationResult::start("disk-info");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    result
                        .with_output("Disk count: 1\n1. Test SSD (512GB)")
                        .with_data(json!({ "count": 1 }))
                        .complete()
                },
            ))
            .unwrap();
        registry
            .register(Operation::new(
                "echo-params",
                "Echo params",
                "Returns its parameters",
                |ctx| async move {
                    let params = Value::Object(ctx.params().clone());
                    OperationResult::start("echo-params")
                        .with_data(params)
                        .complete()
                },
            ))
            .unwrap();
        registry
            .register(Operation::new("boom", "Boom", "Panics", |_| async {
                let explode = true;
                if explode {
                    panic!("kaboom");
                }
                OperationResult::start("boom").complete()
            }))
            .unwrap();
        router(AppState::new(Arc::new(registry)))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, body) = send(&app, get_request("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["operations"], 3);
        assert!(body["timestamp"].is_i64());
    }

    #[tokio::test]
    async fn test_system_info() {
        let app = test_app();
        let (status, body) = send(&app, get_request("/api/v1/system/info")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["cpu_count"].as_u64().unwrap() >= 1);
        assert!(body["memory_total"].is_u64());
    }

    #[tokio::test]
    async fn test_list_tests() {
        let app = test_app();
        let (status, body) = send(&app, get_request("/api/v1/tests/list")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 3);
        let ids: Vec<&str> = body["tests"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["boom", "disk-info", "echo-params"]);
        assert_eq!(body["tests"][1]["name"], "Disk info");
    }

    #[tokio::test]
    async fn test_run_then_fetch_result() {
        let app = test_app();
        let (status, run) = send(&app, post_json("/api/v1/tests/run/disk-info", "")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(run["id"], "disk-info");
        assert_eq!(run["status"], "completed");
        assert!(run["duration_ms"].as_u64().unwrap() >= 100);
        assert_eq!(run["data"]["count"], 1);
        assert!(run.get("error").is_none());

        let (status, stored) = send(&app, get_request("/api/v1/tests/results/disk-info")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stored, run);
    }

    #[tokio::test]
    async fn test_run_passes_params() {
        let app = test_app();
        let body = r#"{"params": {"target": "eth0", "count": 2}}"#;
        let (status, run) = send(&app, post_json("/api/v1/tests/run/echo-params", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(run["data"], json!({ "target": "eth0", "count": 2 }));
    }

    #[tokio::test]
    async fn test_run_unknown_test() {
        let app = test_app();
        let (status, body) = send(&app, post_json("/api/v1/tests/run/nope", "")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn test_run_malformed_body() {
        let app = test_app();
        let (status, body) = send(&app, post_json("/api/v1/tests/run/disk-info", "{not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = send(&app, get_request("/api/v1/tests/results/disk-info")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_result_before_run() {
        let app = test_app();
        let (status, body) = send(&app, get_request("/api/v1/tests/results/disk-info")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_panicking_operation_is_reported() {
        let app = test_app();
        let (status, run) = send(&app, post_json("/api/v1/tests/run/boom", "")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(run["status"], "failed");
        assert!(run["error"].as_str().unwrap().contains("kaboom"));

        let (status, _) = send(&app, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_exec_empty_command() {
        let app = test_app();
        let (status, body) = send(&app, post_json("/api/v1/cmd/exec", r#"{"command": "  "}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "command must not be empty");
    }

    #[tokio::test]
    async fn test_exec_malformed_body() {
        let app = test_app();
        let (status, body) = send(&app, post_json("/api/v1/cmd/exec", "{\"command\":")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_success() {
        let app = test_app();
        let body = r#"{"command": "echo", "args": ["hello"]}"#;
        let (status, result) = send(&app, post_json("/api/v1/cmd/exec", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["success"], true);
        assert_eq!(result["exit_code"], 0);
        assert_eq!(result["output"], "hello\n");
        assert!(result.get("error").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_nonzero_exit_is_ok() {
        let app = test_app();
        let body = r#"{"command": "sh", "args": ["-c", "exit 3"]}"#;
        let (status, result) = send(&app, post_json("/api/v1/cmd/exec", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["success"], false);
        assert_eq!(result["exit_code"], 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_timeout() {
        let app = test_app();
        let body = r#"{"command": "sleep", "args": ["5"], "timeout": 1}"#;
        let started = Instant::now();
        let (status, result) = send(&app, post_json("/api/v1/cmd/exec", body)).await;

        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(result["success"], false);
        assert_eq!(result["exit_code"], -1);
        assert!(result["error"].as_str().unwrap().contains("timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_missing_binary() {
        let app = test_app();
        let body = r#"{"command": "definitely-not-a-real-binary-4711"}"#;
        let (status, result) = send(&app, post_json("/api/v1/cmd/exec", body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(result["success"], false);
        assert_eq!(result["exit_code"], -1);
        assert!(result["error"].is_string());
    }

    #[test]
    fn test_handle_panic_response() {
        let response = handle_panic(Box::new("handler blew up"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
