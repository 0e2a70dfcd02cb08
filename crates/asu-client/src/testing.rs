//! Test utilities for asu-client
//!
//! Provides an in-process Image Builder mock and a test server wrapper so
//! integration tests never touch a real build service.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::{AsuClient, Result};

/// One request the mock server received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// JSON body, for requests that carry one
    pub body: Option<Value>,
}

#[derive(Debug)]
struct MockState {
    build_responses: Mutex<VecDeque<Value>>,
    check_responses: Mutex<HashMap<String, Value>>,
    overview: Mutex<Value>,
    latest: Mutex<Value>,
    revision: Mutex<Value>,
    received: Mutex<Vec<RecordedRequest>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            build_responses: Mutex::new(VecDeque::new()),
            check_responses: Mutex::new(HashMap::new()),
            overview: Mutex::new(default_overview()),
            latest: Mutex::new(default_latest()),
            revision: Mutex::new(json!({"revision": "r28066-c9d1b6781f"})),
            received: Mutex::new(Vec::new()),
        }
    }
}

impl MockState {
    fn record(&self, method: &str, path: &str, body: Option<Value>) {
        self.received.lock().push(RecordedRequest {
            method: method.to_string(),
            path: path.to_string(),
            body,
        });
    }
}

/// Scriptable mock of an ASU Image Builder server
///
/// Serves the build, overview and revision routes under `/api/v1` plus the
/// static `/json/v1/latest.json` document. Fixture bodies carrying an
/// embedded `status` field are answered with that HTTP status, the way the
/// real service mirrors it for build routes; without one the reply is a
/// plain 200. Unscripted routes answer with sensible defaults: builds are
/// accepted and queued, polls for unknown hashes get a 404.
///
/// Clones share state, so a test can keep one handle for scripting and
/// assertions while the router owns another.
#[derive(Debug, Clone, Default)]
pub struct MockBuildServer {
    state: Arc<MockState>,
}

impl MockBuildServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the body answered to the next `POST build`
    ///
    /// Queued bodies are consumed in order; once the queue is empty the
    /// default accepted-and-queued body is served again.
    pub fn push_build_response(&self, body: Value) {
        self.state.build_responses.lock().push_back(body);
    }

    /// Set the body answered when polling the given request hash
    pub fn set_check_response(&self, request_hash: &str, body: Value) {
        self.state
            .check_responses
            .lock()
            .insert(request_hash.to_string(), body);
    }

    /// Replace the live overview fixture
    pub fn set_overview(&self, body: Value) {
        *self.state.overview.lock() = body;
    }

    /// Replace the static `latest.json` fixture
    pub fn set_latest(&self, body: Value) {
        *self.state.latest.lock() = body;
    }

    /// Replace the revision fixture served for every target
    pub fn set_revision(&self, body: Value) {
        *self.state.revision.lock() = body;
    }

    /// Requests received so far, in arrival order
    pub fn received(&self) -> Vec<RecordedRequest> {
        self.state.received.lock().clone()
    }

    /// Router serving the mock
    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/build", post(post_build))
            .route("/build/{request_hash}", get(get_build))
            .route("/overview", get(get_overview))
            .route("/revision/{version}/{target}/{subtarget}", get(get_revision));

        Router::new()
            .nest("/api/v1", api)
            .route("/json/v1/latest.json", get(get_latest))
            .with_state(self.state.clone())
    }
}

/// HTTP status mirroring the status embedded in a build body
fn status_from_body(body: &Value) -> StatusCode {
    body.get("status")
        .and_then(Value::as_u64)
        .and_then(|code| StatusCode::from_u16(code as u16).ok())
        .unwrap_or(StatusCode::OK)
}

fn default_build_accepted() -> Value {
    json!({
        "status": 202,
        "request_hash": "8b2f24a3c9e1",
        "detail": "queued",
        "queue_position": 1,
        "enqueued_at": "2024-06-01T12:00:00",
    })
}

fn default_overview() -> Value {
    json!({
        "latest": ["24.10.0", "23.05.5", "SNAPSHOT"],
        "branches": {
            "SNAPSHOT": {
                "name": "SNAPSHOT",
                "enabled": true,
                "snapshot": true,
                "versions": ["SNAPSHOT"],
                "git_branch": "main",
                "updates": "dev",
                "targets": {
                    "ath79/generic": "mips_24kc",
                    "bcm27xx/bcm2711": "aarch64_cortex-a72",
                },
            },
            "24.10": {
                "name": "24.10",
                "enabled": true,
                "snapshot": false,
                "versions": ["24.10.0"],
                "git_branch": "openwrt-24.10",
                "updates": "features",
                "targets": {
                    "ath79/generic": "mips_24kc",
                    "bcm27xx/bcm2711": "aarch64_cortex-a72",
                },
            },
        },
    })
}

fn default_latest() -> Value {
    json!({"latest": ["24.10.0", "23.05.5", "SNAPSHOT"]})
}

async fn post_build(
    State(state): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.record("POST", "/api/v1/build", Some(body));

    let response = state
        .build_responses
        .lock()
        .pop_front()
        .unwrap_or_else(default_build_accepted);
    (status_from_body(&response), Json(response))
}

async fn get_build(
    State(state): State<Arc<MockState>>,
    Path(request_hash): Path<String>,
) -> (StatusCode, Json<Value>) {
    state.record("GET", &format!("/api/v1/build/{}", request_hash), None);

    match state.check_responses.lock().get(&request_hash) {
        Some(body) => (status_from_body(body), Json(body.clone())),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "could not find provided request hash"})),
        ),
    }
}

async fn get_overview(State(state): State<Arc<MockState>>) -> (StatusCode, Json<Value>) {
    state.record("GET", "/api/v1/overview", None);
    let body = state.overview.lock().clone();
    (status_from_body(&body), Json(body))
}

async fn get_latest(State(state): State<Arc<MockState>>) -> (StatusCode, Json<Value>) {
    state.record("GET", "/json/v1/latest.json", None);
    let body = state.latest.lock().clone();
    (status_from_body(&body), Json(body))
}

async fn get_revision(
    State(state): State<Arc<MockState>>,
    Path((version, target, subtarget)): Path<(String, String, String)>,
) -> (StatusCode, Json<Value>) {
    state.record(
        "GET",
        &format!("/api/v1/revision/{}/{}/{}", version, target, subtarget),
        None,
    );
    let body = state.revision.lock().clone();
    (status_from_body(&body), Json(body))
}

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: AsuClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve a router and point a client at its `/api/v1/`
    ///
    /// # Example
    ///
    /// ```ignore
    /// use asu_client::testing::{MockBuildServer, TestServer};
    ///
    /// let mock = MockBuildServer::new();
    /// let server = TestServer::start(mock.router()).await?;
    ///
    /// let overview = server.client.overview().await?;
    /// ```
    pub async fn start(router: Router) -> Result<Self> {
        Self::start_with_timeout(router, Duration::from_secs(5), Duration::from_secs(2)).await
    }

    /// Serve a router with custom client timeouts
    pub async fn start_with_timeout(
        router: Router,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        // Spawn the server
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        let endpoint = format!("http://{}/api/v1/", addr);
        let client = AsuClient::with_config(&endpoint, timeout, connect_timeout)?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the API endpoint the client is pointed at
    pub fn endpoint(&self) -> String {
        format!("http://{}/api/v1/", self.addr)
    }

    /// Get a reference to the client
    pub fn client(&self) -> &AsuClient {
        &self.client
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal if not already done
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Abort the task if still running
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
