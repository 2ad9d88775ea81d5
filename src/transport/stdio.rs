//! Stdio transport.
//!
//! Serves one logical peer over standard input/output with line-delimited
//! JSON-RPC 2.0: one request per line in, one response per line out, handled
//! strictly in order. All logging goes to stderr; stdout carries only
//! protocol frames.

use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info};

use crate::config::{SERVER_NAME, SERVER_VERSION};
use crate::error::{DbaError, DbaResult};
use crate::models::QueryResult;
use crate::tools::{Dispatcher, ToolInvocation, list_tools};
use crate::transport::{Transport, wait_for_signal};

const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;
const NOT_INITIALIZED: i64 = -32002;

/// Stdio transport implementation.
pub struct StdioTransport {
    dispatcher: Dispatcher,
}

impl StdioTransport {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbaResult<()> {
        info!(
            server = SERVER_NAME,
            version = SERVER_VERSION,
            "Starting stdio transport"
        );

        let (serve_result, shutdown_requested) = tokio::select! {
            result = serve(&self.dispatcher) => {
                if result.is_ok() {
                    info!("Stdio peer disconnected");
                }
                (result, false)
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received");
                (Ok(()), true)
            }
        };

        // The cache drains on every exit path, including a broken stdio pipe.
        info!("Closing database connections");
        self.dispatcher.manager().close_all().await;

        if shutdown_requested {
            // Stdin reads run on a blocking thread that select! cannot
            // interrupt, so the process has to end explicitly.
            info!("Exiting process");
            std::process::exit(0);
        }

        serve_result
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

/// Inbound JSON-RPC request. A missing `id` marks a notification.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    id: Option<JsonValue>,
    method: String,
    #[serde(default)]
    params: JsonValue,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcResponse {
    fn success(id: JsonValue, result: JsonValue) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: JsonValue, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Per-peer protocol state: the capability handshake happens exactly once.
#[derive(Debug, Default)]
struct Session {
    initialized: bool,
}

/// Read requests line by line until stdin closes.
async fn serve(dispatcher: &Dispatcher) -> DbaResult<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = BufWriter::new(tokio::io::stdout());
    let mut lines = stdin.lines();
    let mut session = Session::default();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| DbaError::transport(format!("stdin read failed: {e}")))?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "Discarding unparseable request line");
                let response =
                    JsonRpcResponse::failure(JsonValue::Null, PARSE_ERROR, format!("Parse error: {e}"));
                write_response(&mut stdout, &response).await?;
                continue;
            }
        };

        // Notifications (notifications/initialized and friends) get no reply.
        let Some(id) = request.id else {
            debug!(method = request.method.as_str(), "Accepted notification");
            continue;
        };

        let response =
            handle_request(dispatcher, &mut session, id, &request.method, request.params).await;
        write_response(&mut stdout, &response).await?;
    }

    Ok(())
}

async fn handle_request(
    dispatcher: &Dispatcher,
    session: &mut Session,
    id: JsonValue,
    method: &str,
    params: JsonValue,
) -> JsonRpcResponse {
    match method {
        "initialize" => {
            if session.initialized {
                return JsonRpcResponse::failure(id, INVALID_REQUEST, "Server already initialized");
            }
            session.initialized = true;
            JsonRpcResponse::success(id, initialize_result())
        }
        "ping" => JsonRpcResponse::success(id, json!({})),
        _ if !session.initialized => {
            JsonRpcResponse::failure(id, NOT_INITIALIZED, "Server not initialized")
        }
        "tools/list" => JsonRpcResponse::success(id, json!({ "tools": list_tools() })),
        "tools/call" => handle_tool_call(dispatcher, id, params).await,
        _ => JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("Method not found: {method}")),
    }
}

async fn handle_tool_call(
    dispatcher: &Dispatcher,
    id: JsonValue,
    params: JsonValue,
) -> JsonRpcResponse {
    let Some(name) = params.get("name").and_then(JsonValue::as_str) else {
        return JsonRpcResponse::failure(id, INVALID_PARAMS, "Invalid params: missing tool name");
    };
    let arguments = match params.get("arguments") {
        None | Some(JsonValue::Null) => serde_json::Map::new(),
        Some(JsonValue::Object(map)) => map.clone(),
        Some(_) => {
            return JsonRpcResponse::failure(
                id,
                INVALID_PARAMS,
                "Invalid params: arguments must be an object",
            );
        }
    };

    let invocation = ToolInvocation::new(name, arguments);
    let (payload, is_error) = match dispatcher.dispatch(&invocation).await {
        Ok(result) => (result, false),
        Err(error @ DbaError::UnknownTool { .. }) => {
            return JsonRpcResponse::failure(id, INVALID_PARAMS, error.to_string());
        }
        // Caller-input and execution failures ride in-band as tool output.
        Err(error) => (QueryResult::failure(error.to_string()), true),
    };

    match serde_json::to_string_pretty(&payload) {
        Ok(text) => JsonRpcResponse::success(
            id,
            json!({
                "content": [{ "type": "text", "text": text }],
                "isError": is_error
            }),
        ),
        Err(e) => JsonRpcResponse::failure(
            id,
            INTERNAL_ERROR,
            format!("Failed to serialize tool result: {e}"),
        ),
    }
}

fn initialize_result() -> JsonValue {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION }
    })
}

async fn write_response<W>(writer: &mut W, response: &JsonRpcResponse) -> DbaResult<()>
where
    W: AsyncWrite + Unpin,
{
    let mut payload = serde_json::to_vec(response)
        .map_err(|e| DbaError::transport(format!("response serialization failed: {e}")))?;
    payload.push(b'\n');
    writer
        .write_all(&payload)
        .await
        .map_err(|e| DbaError::transport(format!("stdout write failed: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| DbaError::transport(format!("stdout flush failed: {e}")))
}
