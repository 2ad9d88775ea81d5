//! HTTP transport.
//!
//! Stateless REST endpoints over the shared dispatcher, a tool catalog, and
//! a long-lived Server-Sent Events stream for liveness. Handled failures stay
//! in-band as `{success:false, ...}` payloads with HTTP 200; only malformed
//! requests and unknown tool names produce non-200 statuses.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::sse::{Event, Sse},
    routing::{get, post},
};
use futures_util::stream::{self, Stream};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::config::{
    GRACEFUL_SHUTDOWN_TIMEOUT_SECS, HEARTBEAT_INTERVAL_SECS, SERVER_NAME, SERVER_VERSION,
};
use crate::error::{DbaError, DbaResult};
use crate::models::QueryResult;
use crate::models::query::now_iso8601;
use crate::tools::{Dispatcher, ToolInvocation, list_tools};
use crate::transport::{Transport, wait_for_signal};

/// HTTP transport implementation.
pub struct HttpTransport {
    dispatcher: Dispatcher,
    host: String,
    port: u16,
}

impl HttpTransport {
    pub fn new(dispatcher: Dispatcher, host: impl Into<String>, port: u16) -> Self {
        Self {
            dispatcher,
            host: host.into(),
            port,
        }
    }

    /// Address the server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbaResult<()> {
        let result = self.serve().await;

        // The cache drains on every exit path, bind failure included.
        info!("Closing database connections");
        self.dispatcher.manager().close_all().await;

        result
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

impl HttpTransport {
    async fn serve(&self) -> DbaResult<()> {
        let bind_addr = self.bind_addr();
        let app = router(self.dispatcher.clone());

        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| DbaError::transport(format!("failed to bind {bind_addr}: {e}")))?;

        info!(
            addr = %bind_addr,
            server = SERVER_NAME,
            version = SERVER_VERSION,
            "Starting HTTP transport"
        );

        const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(GRACEFUL_SHUTDOWN_TIMEOUT_SECS);

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let notify_tx = shutdown_notify.clone();
        let shutdown_signal = async move {
            wait_for_signal().await;
            notify_tx.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        // Open SSE subscriptions can hold graceful shutdown open indefinitely,
        // so the drain is bounded and a second signal is a hard stop.
        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => {
                        info!("HTTP server stopped");
                        Ok(())
                    }
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        Err(DbaError::transport(format!("HTTP server error: {e}")))
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for connections to close (send signal again to force exit)"
                );

                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout reached, dropping server");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, dropping server");
                    }
                }
            } => Ok(()),
        }
    }
}

#[derive(Clone)]
struct AppState {
    dispatcher: Dispatcher,
}

/// Build the router. Public so tests can drive it without a listener.
pub fn router(dispatcher: Dispatcher) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(identity))
        .route("/health", get(health))
        .route("/query", post(run_query))
        .route("/performance-report", post(run_performance_report))
        .route("/tools", get(tools_catalog))
        .route("/tools/call", post(call_tool))
        .route("/mcp", get(event_stream))
        .layer(cors)
        .with_state(AppState { dispatcher })
}

async fn identity() -> Json<JsonValue> {
    Json(json!({
        "name": SERVER_NAME,
        "version": SERVER_VERSION,
        "status": "running",
        "endpoints": {
            "health": "/health",
            "query": "/query",
            "performanceReport": "/performance-report",
            "tools": "/tools",
            "toolCall": "/tools/call",
            "events": "/mcp"
        }
    }))
}

async fn health(State(state): State<AppState>) -> Json<JsonValue> {
    let manager = state.dispatcher.manager();
    Json(json!({
        "status": "healthy",
        "timestamp": now_iso8601(),
        "activeConnectionCount": manager.connection_count().await,
        "availableDrivers": manager.driver_names(),
    }))
}

async fn run_query(
    State(state): State<AppState>,
    Json(arguments): Json<serde_json::Map<String, JsonValue>>,
) -> Json<QueryResult> {
    Json(execute_tool(&state, "ask_dba", arguments).await)
}

async fn run_performance_report(
    State(state): State<AppState>,
    Json(arguments): Json<serde_json::Map<String, JsonValue>>,
) -> Json<QueryResult> {
    Json(execute_tool(&state, "generate_performance_report", arguments).await)
}

/// Dispatch with the failure folded into the response payload.
async fn execute_tool(
    state: &AppState,
    tool: &str,
    arguments: serde_json::Map<String, JsonValue>,
) -> QueryResult {
    let invocation = ToolInvocation::new(tool, arguments);
    match state.dispatcher.dispatch(&invocation).await {
        Ok(result) => result,
        Err(e) => QueryResult::failure(e.to_string()),
    }
}

async fn tools_catalog() -> Json<JsonValue> {
    Json(json!({ "tools": list_tools() }))
}

#[derive(Debug, Deserialize)]
struct ToolCallRequest {
    name: String,
    #[serde(default)]
    arguments: serde_json::Map<String, JsonValue>,
}

async fn call_tool(
    State(state): State<AppState>,
    Json(request): Json<ToolCallRequest>,
) -> (StatusCode, Json<JsonValue>) {
    let invocation = ToolInvocation::new(request.name, request.arguments);
    match state.dispatcher.dispatch(&invocation).await {
        Ok(result) => (StatusCode::OK, Json(json!({ "result": result }))),
        Err(error @ DbaError::UnknownTool { .. }) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": error.to_string() })),
        ),
        Err(error) => (
            StatusCode::OK,
            Json(json!({ "result": QueryResult::failure(error.to_string()) })),
        ),
    }
}

enum EventPhase {
    Connect,
    Beat(tokio::time::Interval),
    Done,
}

/// Liveness stream: one connected event, an immediate first heartbeat, then
/// one heartbeat per interval until the peer disconnects. An unserializable
/// payload ends the stream with a single error event.
async fn event_stream() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = stream::unfold(EventPhase::Connect, |phase| async move {
        let (payload, next) = match phase {
            EventPhase::Connect => (
                json!({ "type": "connection", "status": "connected" }),
                EventPhase::Beat(heartbeat_interval()),
            ),
            EventPhase::Beat(mut interval) => {
                interval.tick().await;
                (
                    json!({ "type": "heartbeat", "timestamp": now_iso8601() }),
                    EventPhase::Beat(interval),
                )
            }
            EventPhase::Done => return None,
        };

        match Event::default().json_data(&payload) {
            Ok(event) => Some((Ok(event), next)),
            Err(e) => {
                warn!(error = %e, "Event stream payload failed to serialize");
                let message = json!({ "type": "error", "message": e.to_string() });
                Some((Ok(Event::default().data(message.to_string())), EventPhase::Done))
            }
        }
    });

    Sse::new(stream)
}

fn heartbeat_interval() -> tokio::time::Interval {
    // The first tick completes at once, so the first heartbeat directly
    // follows the connected event.
    tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS))
}
