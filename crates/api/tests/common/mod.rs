//! Shared helpers for API integration tests.
//!
//! Each test binary gets the full production router (same middleware
//! stack as `main.rs`) wired to an in-process store, a static two-device
//! inventory, and a fake executor so no subprocess is ever spawned.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use homelab_api::config::ServerConfig;
use homelab_api::router::build_app_router;
use homelab_api::state::AppState;
use homelab_engine::{
    ActionExecutor, ActionOutcome, ActionRequest, DeviceRecord, ExecutorError, StaticDirectory,
    WorkflowScheduler,
};
use homelab_store::Store;

// ---------------------------------------------------------------------------
// Fake executor
// ---------------------------------------------------------------------------

/// Executor stub: every action succeeds unless listed in `failures`
/// (keyed by device id + action name). An optional per-action delay keeps
/// instances observably in-flight for cancellation tests.
pub struct FakeExecutor {
    failures: HashSet<(String, String)>,
    delay: Option<Duration>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self {
            failures: HashSet::new(),
            delay: None,
        }
    }

    pub fn fail_on(mut self, device_id: &str, action_name: &str) -> Self {
        self.failures
            .insert((device_id.to_string(), action_name.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ActionExecutor for FakeExecutor {
    async fn execute(&self, request: &ActionRequest) -> Result<ActionOutcome, ExecutorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let key = (request.device.id.clone(), request.action_name.clone());
        if self.failures.contains(&key) {
            Ok(ActionOutcome {
                success: false,
                log_output: format!("{} failed on {}", request.action_name, request.device.id),
            })
        } else {
            Ok(ActionOutcome {
                success: true,
                log_output: format!("{} ok on {}", request.action_name, request.device.id),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        inventory_path: "devices.json".to_string(),
        playbook_dir: "playbooks".to_string(),
        vault_password_dir: None,
        action_timeout_secs: 600,
    }
}

/// Inventory used by all tests: two known devices, `nas` and `pi`.
pub fn test_directory() -> StaticDirectory {
    StaticDirectory::new(vec![
        DeviceRecord {
            id: "nas".to_string(),
            name: Some("Storage NAS".to_string()),
            address: "192.168.1.10".to_string(),
            ssh_user: Some("admin".to_string()),
        },
        DeviceRecord {
            id: "pi".to_string(),
            name: Some("Raspberry Pi".to_string()),
            address: "192.168.1.11".to_string(),
            ssh_user: Some("pi".to_string()),
        },
    ])
}

/// Build the full application router with all middleware layers, backed by
/// an always-succeeding executor.
///
/// This goes through `build_app_router` so integration tests exercise the
/// same middleware stack (CORS, request ID, timeout, tracing, panic
/// recovery) that production uses. The returned `Router` is cloneable, so
/// one app serves many `oneshot` requests against shared state.
pub fn build_test_app() -> Router {
    build_test_app_with(Arc::new(FakeExecutor::new()))
}

/// Build the application router around a specific executor stub.
pub fn build_test_app_with(executor: Arc<dyn ActionExecutor>) -> Router {
    let config = test_config();
    let store = Store::new();
    let scheduler = WorkflowScheduler::new(store.clone(), executor, Arc::new(test_directory()));

    let state = AppState {
        store,
        scheduler,
        config: Arc::new(config.clone()),
    };

    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("response body should be valid JSON")
}

// ---------------------------------------------------------------------------
// Workflow helpers
// ---------------------------------------------------------------------------

/// A three-step chain: install (with rollback) -> configure -> restart.
pub fn chain_template_body(name: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "description": "provision chain",
        "steps": [
            {
                "order": 0,
                "action_name": "install",
                "rollback_action": "cleanup"
            },
            {
                "order": 1,
                "action_name": "configure",
                "depends_on": [0]
            },
            {
                "order": 2,
                "action_name": "restart",
                "depends_on": [1]
            }
        ]
    })
}

/// Create a template and return its id.
pub async fn create_template(app: &Router, name: &str) -> i64 {
    let response = post_json(
        app.clone(),
        "/api/v1/workflows/templates",
        chain_template_body(name),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    let json = body_json(response).await;
    json["data"]["id"].as_i64().expect("id should be a number")
}

/// Start a workflow for `template_id` on the given devices; returns the
/// new instance id.
pub async fn start_workflow(
    app: &Router,
    template_id: i64,
    device_ids: &[&str],
    rollback_on_failure: bool,
) -> i64 {
    let body = serde_json::json!({
        "template_id": template_id,
        "device_ids": device_ids,
        "rollback_on_failure": rollback_on_failure
    });
    let response = post_json(app.clone(), "/api/v1/workflows", body).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    let json = body_json(response).await;
    json["data"]["id"].as_i64().expect("id should be a number")
}

/// Poll the detail endpoint until the instance reaches a terminal status,
/// returning the final instance JSON (the `data` object).
pub async fn poll_until_terminal(app: &Router, instance_id: i64) -> serde_json::Value {
    let uri = format!("/api/v1/workflows/{instance_id}");
    for _ in 0..200 {
        let response = get(app.clone(), &uri).await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let json = body_json(response).await;
        let status = json["data"]["status"].as_str().expect("status string");
        if matches!(status, "completed" | "failed" | "cancelled" | "rolled_back") {
            return json["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("instance {instance_id} did not reach a terminal status");
}
