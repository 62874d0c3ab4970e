//! mcpscan Fixture - an intentionally unauthenticated MCP-style service
//!
//! Serves the two dialects the scanner looks for: an event stream on
//! `GET /sse` that hands out a session id, and JSON-RPC on `POST /mcp` and
//! `POST /sse/messages`. Nothing is ever authenticated and `tools/call` never
//! executes anything.

use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream, StreamExt};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 3001;
pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "test-mcp-server";
pub const SERVER_VERSION: &str = "1.0.0";

/// Routes of the reference service
pub fn reference_router() -> Router {
    Router::new()
        .route("/sse", get(event_stream))
        .route("/sse/messages", post(handle_rpc))
        .route("/mcp", post(handle_rpc))
}

/// Serve `router` on an ephemeral loopback port and return its address
///
/// The server runs on a background task for the rest of the runtime.
pub async fn serve(router: Router) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            warn!("Fixture server on {} stopped: {}", addr, e);
        }
    });
    Ok(addr)
}

/// Serve the reference service on `addr` until the process exits
pub async fn listen(addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, reference_router()).await
}

async fn event_stream() -> impl IntoResponse {
    let session_id = format!("session_{}", chrono::Utc::now().timestamp_millis());
    info!(session = %session_id, "New event-stream connection");

    let connected = json!({ "type": "connected", "sessionId": session_id });
    let events = connected_then_idle(connected.to_string());

    (
        [("x-session-id", session_id)],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
}

// The stream stays open after the greeting, like a real session
fn connected_then_idle(data: String) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::once(async move { Ok(Event::default().data(data)) }).chain(stream::pending())
}

async fn handle_rpc(Json(request): Json<Value>) -> (StatusCode, Json<Value>) {
    let id = request.get("id").cloned().unwrap_or(Value::Null);

    if request.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return rpc_error(StatusCode::BAD_REQUEST, -32600, "Invalid Request", id);
    }

    let method = request
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default();
    info!(method, "RPC request");

    let result = match method {
        "initialize" => json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
        }),
        "tools/list" => json!({ "tools": tool_catalog() }),
        "tools/call" => {
            let name = request
                .pointer("/params/name")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            warn!(tool = name, "Tool invocation requested");
            json!({
                "content": [{
                    "type": "text",
                    "text": format!(
                        "This is a test server. A real server would now run \"{}\" without authentication.",
                        name
                    ),
                }]
            })
        }
        _ => return rpc_error(StatusCode::NOT_FOUND, -32601, "Method not found", id),
    };

    (
        StatusCode::OK,
        Json(json!({ "jsonrpc": "2.0", "result": result, "id": id })),
    )
}

fn rpc_error(status: StatusCode, code: i64, message: &str, id: Value) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "jsonrpc": "2.0",
            "error": { "code": code, "message": message },
            "id": id,
        })),
    )
}

fn tool_catalog() -> Value {
    json!([
        {
            "name": "read_file",
            "description": "Read file contents (no authentication)",
            "inputSchema": {
                "type": "object",
                "properties": { "path": { "type": "string", "description": "File path" } },
                "required": ["path"],
            },
        },
        {
            "name": "list_directory",
            "description": "List directory contents (no authentication)",
            "inputSchema": {
                "type": "object",
                "properties": { "path": { "type": "string", "description": "Directory path" } },
                "required": ["path"],
            },
        },
        {
            "name": "execute_command",
            "description": "Execute a system command (extremely dangerous, no authentication)",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Command to execute" }
                },
                "required": ["command"],
            },
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn rpc(addr: SocketAddr, path: &str, body: Value) -> (u16, Value) {
        let response = reqwest::Client::new()
            .post(format!("http://{}{}", addr, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_initialize() {
        let addr = serve(reference_router()).await.unwrap();
        let (status, body) = rpc(
            addr,
            "/mcp",
            json!({ "jsonrpc": "2.0", "method": "initialize", "params": {}, "id": 1 }),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(body["result"]["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_tools_list_on_both_paths() {
        let addr = serve(reference_router()).await.unwrap();
        for path in ["/mcp", "/sse/messages"] {
            let (status, body) = rpc(
                addr,
                path,
                json!({ "jsonrpc": "2.0", "method": "tools/list", "params": {}, "id": 2 }),
            )
            .await;
            assert_eq!(status, 200);
            let tools = body["result"]["tools"].as_array().unwrap();
            assert_eq!(tools.len(), 3);
            assert_eq!(tools[2]["name"], "execute_command");
            assert_eq!(tools[0]["inputSchema"]["required"][0], "path");
        }
    }

    #[tokio::test]
    async fn test_tools_call_does_not_execute() {
        let addr = serve(reference_router()).await.unwrap();
        let (status, body) = rpc(
            addr,
            "/mcp",
            json!({
                "jsonrpc": "2.0",
                "method": "tools/call",
                "params": { "name": "execute_command", "arguments": { "command": "id" } },
                "id": 3
            }),
        )
        .await;
        assert_eq!(status, 200);
        let text = body["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("execute_command"));
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let addr = serve(reference_router()).await.unwrap();

        let (status, body) =
            rpc(addr, "/mcp", json!({ "jsonrpc": "1.0", "method": "initialize", "id": 7 })).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"]["code"], -32600);
        assert_eq!(body["id"], 7);

        let (status, body) =
            rpc(addr, "/mcp", json!({ "jsonrpc": "2.0", "method": "resources/list", "id": 8 }))
                .await;
        assert_eq!(status, 404);
        assert_eq!(body["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_event_stream_greeting() {
        let addr = serve(reference_router()).await.unwrap();
        let mut response = reqwest::Client::new()
            .get(format!("http://{}/sse", addr))
            .header("accept", "text/event-stream")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.contains("text/event-stream"));
        let session = response.headers()["x-session-id"].to_str().unwrap().to_string();
        assert!(session.starts_with("session_"));

        let chunk = response.chunk().await.unwrap().unwrap();
        let text = String::from_utf8_lossy(&chunk);
        assert!(text.contains("\"type\":\"connected\""));
        assert!(text.contains(&session));
    }
}
