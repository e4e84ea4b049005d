//! Shared helpers for API integration tests.
//!
//! Mirrors the router construction in `main.rs` so tests exercise the
//! same middleware stack (CORS, request ID, timeout, tracing, panic
//! recovery) that production uses.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;
use tutorgen_api::auth::jwt::JwtConfig;
use tutorgen_api::config::ServerConfig;
use tutorgen_api::router::build_app_router;
use tutorgen_api::state::AppState;
use tutorgen_core::pipeline::Pipeline;
use tutorgen_pipeline::TutorialPipeline;
use tutorgen_worker::{JobRunner, WorkerPool, WorkerPoolConfig};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        worker_pool_size: 3,
        worker_queue_capacity: 32,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 30,
        },
    }
}

/// Build the application with the real tutorial pipeline.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(
        pool,
        Arc::new(TutorialPipeline::new()),
        WorkerPoolConfig::default(),
    )
}

/// Build the application with a scripted pipeline and explicit pool sizing.
pub fn build_test_app_with(
    pool: PgPool,
    pipeline: Arc<dyn Pipeline>,
    pool_config: WorkerPoolConfig,
) -> Router {
    let config = test_config();
    let worker_pool = WorkerPool::start(pool_config);
    let submitter = worker_pool.submitter();
    // The worker tasks are detached; tests drive them through the
    // submitter and never exercise shutdown.
    drop(worker_pool);

    let runner = JobRunner::new(pool.clone(), pipeline);
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        submitter,
        runner,
    };

    build_app_router(state, &config)
}

/// Issue one request and return `(status, headers, raw body)`.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes.to_vec())
}

/// Issue one request and parse the body as JSON (Null when empty).
pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, _, bytes) = send(app, method, uri, token, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Register a fresh user and return their access token.
pub async fn register(app: &Router, email: &str) -> String {
    let (status, body) = send_json(
        app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({
            "email": email,
            "password": "password-123",
            "full_name": "Test User",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body["access_token"].as_str().unwrap().to_string()
}

/// Create a job and return its id.
pub async fn create_job(app: &Router, token: &str, config: Value) -> i64 {
    let (status, body) = send_json(app, "POST", "/api/v1/jobs", Some(token), Some(config)).await;
    assert_eq!(status, StatusCode::CREATED, "create job failed: {body}");
    body["data"]["job_id"].as_i64().unwrap()
}

/// Poll a job's status until a worker has picked it up.
pub async fn poll_until_processing(app: &Router, token: &str, job_id: i64) {
    for _ in 0..200 {
        let (status, body) = send_json(
            app,
            "GET",
            &format!("/api/v1/jobs/{job_id}"),
            Some(token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "status query failed: {body}");
        if body["data"]["status"] == "processing" {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {job_id} was never picked up by a worker");
}

/// Poll a job's status until it reaches a terminal state.
pub async fn poll_until_terminal(app: &Router, token: &str, job_id: i64) -> Value {
    for _ in 0..200 {
        let (status, body) = send_json(
            app,
            "GET",
            &format!("/api/v1/jobs/{job_id}"),
            Some(token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "status query failed: {body}");
        let snapshot = body["data"].clone();
        if matches!(
            snapshot["status"].as_str(),
            Some("completed") | Some("failed")
        ) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {job_id} did not reach a terminal state in time");
}
