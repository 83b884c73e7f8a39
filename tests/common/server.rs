//! Test server lifecycle management
//!
//! This module manages spawning and shutting down fake notification API
//! servers. Each test gets an isolated server with its own in-memory state,
//! request counters and scriptable failures.

use super::constants::*;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use notification_center::models::{
    DeleteManyRequest, NotificationPayload, NotificationPreferences, PreferencesUpdate,
};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// In-memory state behind the fake notification API.
///
/// Tests script behavior through this: seed notifications, queue failures,
/// inspect request counters.
#[derive(Default)]
pub struct ServerState {
    pub notifications: Mutex<Vec<NotificationPayload>>,
    pub preferences: Mutex<NotificationPreferences>,
    /// Bearer token required on every endpoint; `None` disables the check.
    pub expected_token: Mutex<Option<String>>,
    /// Status codes to fail upcoming list calls with, consumed in order.
    pub list_failures: Mutex<VecDeque<u16>>,
    /// Status codes to fail upcoming mutation calls with, consumed in order.
    pub mutation_failures: Mutex<VecDeque<u16>>,
    /// Artificial latency applied to list calls.
    pub list_delay: Mutex<Option<Duration>>,
    pub list_calls: AtomicUsize,
    pub mark_read_calls: AtomicUsize,
    pub mark_all_read_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    /// `(ticket_id, agent_id)` pairs received on the allocation endpoint.
    pub allocations: Mutex<Vec<(String, String)>>,
}

impl ServerState {
    pub fn seed(&self, notifications: Vec<NotificationPayload>) {
        *self.notifications.lock().unwrap() = notifications;
    }

    pub fn unread(&self) -> usize {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| !n.read)
            .count()
    }

    pub fn fail_list_times(&self, status: u16, times: usize) {
        let mut failures = self.list_failures.lock().unwrap();
        for _ in 0..times {
            failures.push_back(status);
        }
    }

    pub fn fail_next_mutation(&self, status: u16) {
        self.mutation_failures.lock().unwrap().push_back(status);
    }

    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = Some(delay);
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = self.expected_token.lock().unwrap().clone() else {
            return true;
        };
        headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(|value| value == format!("Bearer {}", expected))
            .unwrap_or(false)
    }
}

/// Fake notification API server for end-to-end tests.
///
/// When dropped, the server gracefully shuts down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Scriptable server state, shared with the running server
    pub state: Arc<ServerState>,

    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port, requiring [`TEST_TOKEN`].
    pub async fn spawn() -> Self {
        super::init_tracing();

        let state = Arc::new(ServerState::default());
        *state.expected_token.lock().unwrap() = Some(TEST_TOKEN.to_string());

        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route("/api/notification/all", get(list_all))
            .route("/api/notification/search", get(search))
            .route("/api/notification/stats", get(stats))
            .route(
                "/api/notification/preferences",
                get(get_preferences).put(put_preferences),
            )
            .route("/api/notification/mark-all-read", patch(mark_all_read))
            .route("/api/notification/delete-multiple", post(delete_multiple))
            .route("/api/notification/{id}/read", patch(mark_read))
            .route("/api/notification/{id}/unread", patch(mark_unread))
            .route("/api/notification/{id}", delete(delete_one))
            .route("/api/tickets/update-agent", post(update_agent))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            state,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the root endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"message": "invalid or expired token"})),
    )
        .into_response()
}

fn not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"message": format!("notification {} not found", id)})),
    )
        .into_response()
}

fn injected_failure(status: u16) -> Response {
    (
        StatusCode::from_u16(status).expect("invalid injected status"),
        Json(json!({"message": "simulated upstream failure"})),
    )
        .into_response()
}

/// Pops a scripted mutation failure, if any.
fn mutation_failure(state: &ServerState) -> Option<Response> {
    state
        .mutation_failures
        .lock()
        .unwrap()
        .pop_front()
        .map(injected_failure)
}

async fn list_all(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.list_calls.fetch_add(1, Ordering::SeqCst);

    let delay = *state.list_delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(status) = state.list_failures.lock().unwrap().pop_front() {
        return injected_failure(status);
    }
    if !state.authorized(&headers) {
        return unauthorized();
    }

    let mut items = state.notifications.lock().unwrap().clone();
    if params.get("unreadOnly").map(|v| v == "true").unwrap_or(false) {
        items.retain(|i| !i.read);
    }
    if let Some(kind) = params.get("type") {
        items.retain(|i| i.kind.map(|k| k.as_str() == kind).unwrap_or(false));
    }
    if let Some(limit) = params.get("limit").and_then(|v| v.parse::<usize>().ok()) {
        items.truncate(limit);
    }

    Json(json!({
        "responseData": items,
        "success": true,
        "unreadCount": state.unread(),
    }))
    .into_response()
}

async fn search(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }

    let query = params.get("search").cloned().unwrap_or_default().to_lowercase();
    let items: Vec<NotificationPayload> = state
        .notifications
        .lock()
        .unwrap()
        .iter()
        .filter(|i| i.message.to_lowercase().contains(&query))
        .cloned()
        .collect();

    Json(json!({
        "responseData": items,
        "success": true,
        "unreadCount": state.unread(),
    }))
    .into_response()
}

async fn mark_read(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    state.mark_read_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(response) = mutation_failure(&state) {
        return response;
    }
    if !state.authorized(&headers) {
        return unauthorized();
    }

    let mut notifications = state.notifications.lock().unwrap();
    match notifications.iter_mut().find(|n| n.id.as_deref() == Some(id.as_str())) {
        Some(notification) => {
            notification.read = true;
            Json(json!({"success": true})).into_response()
        }
        None => not_found(&id),
    }
}

async fn mark_unread(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Some(response) = mutation_failure(&state) {
        return response;
    }
    if !state.authorized(&headers) {
        return unauthorized();
    }

    let mut notifications = state.notifications.lock().unwrap();
    match notifications.iter_mut().find(|n| n.id.as_deref() == Some(id.as_str())) {
        Some(notification) => {
            notification.read = false;
            Json(json!({"success": true})).into_response()
        }
        None => not_found(&id),
    }
}

async fn mark_all_read(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    state.mark_all_read_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(response) = mutation_failure(&state) {
        return response;
    }
    if !state.authorized(&headers) {
        return unauthorized();
    }

    for notification in state.notifications.lock().unwrap().iter_mut() {
        notification.read = true;
    }
    Json(json!({"success": true})).into_response()
}

async fn delete_one(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    state.delete_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(response) = mutation_failure(&state) {
        return response;
    }
    if !state.authorized(&headers) {
        return unauthorized();
    }

    let mut notifications = state.notifications.lock().unwrap();
    let before = notifications.len();
    notifications.retain(|n| n.id.as_deref() != Some(id.as_str()));
    if notifications.len() == before {
        return not_found(&id);
    }
    Json(json!({"success": true})).into_response()
}

async fn delete_multiple(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(request): Json<DeleteManyRequest>,
) -> Response {
    if let Some(response) = mutation_failure(&state) {
        return response;
    }
    if !state.authorized(&headers) {
        return unauthorized();
    }

    state.notifications.lock().unwrap().retain(|n| {
        n.id.as_deref()
            .map(|id| !request.notification_ids.iter().any(|wanted| wanted == id))
            .unwrap_or(true)
    });
    Json(json!({"success": true})).into_response()
}

async fn update_agent(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }

    let ticket_id = body["id"].as_str().unwrap_or_default().to_string();
    let agent_id = body["assignedAgent"]["id"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    state.allocations.lock().unwrap().push((ticket_id, agent_id));
    Json(json!({"success": true})).into_response()
}

async fn get_preferences(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let preferences = state.preferences.lock().unwrap().clone();
    Json(preferences).into_response()
}

async fn put_preferences(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(update): Json<PreferencesUpdate>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }

    let mut preferences = state.preferences.lock().unwrap();
    if let Some(enabled) = update.enabled {
        preferences.enabled = enabled;
    }
    if let Some(email) = update.email {
        preferences.email = email;
    }
    if let Some(push) = update.push {
        preferences.push = push;
    }
    if let Some(muted_types) = update.muted_types {
        preferences.muted_types = muted_types;
    }
    Json(preferences.clone()).into_response()
}

async fn stats(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }

    let notifications = state.notifications.lock().unwrap();
    let mut by_type: HashMap<&str, usize> = HashMap::new();
    for notification in notifications.iter() {
        let kind = notification.kind.map(|k| k.as_str()).unwrap_or("system");
        *by_type.entry(kind).or_insert(0) += 1;
    }

    Json(json!({
        "total": notifications.len(),
        "unread": notifications.iter().filter(|n| !n.read).count(),
        "byType": by_type,
    }))
    .into_response()
}
