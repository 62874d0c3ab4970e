//! JSON-RPC 2.0 envelopes spoken to probed services

use mcpscan_core::{ServerInfo, ToolDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const JSONRPC_VERSION: &str = "2.0";

/// Request id of the `initialize` handshake
pub const INITIALIZE_ID: u64 = 1;

/// Request id of `tools/list`
pub const TOOLS_LIST_ID: u64 = 2;

/// An outgoing JSON-RPC request
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: Value,
    pub id: u64,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
            id,
        }
    }

    /// `initialize` with empty capabilities and the given client identity
    pub fn initialize(protocol_version: &str, client_name: &str, client_version: &str) -> Self {
        Self::new(
            "initialize",
            json!({
                "protocolVersion": protocol_version,
                "capabilities": {},
                "clientInfo": {
                    "name": client_name,
                    "version": client_version,
                },
            }),
            INITIALIZE_ID,
        )
    }

    pub fn tools_list() -> Self {
        Self::new("tools/list", json!({}), TOOLS_LIST_ID)
    }

    pub fn to_body(&self) -> String {
        // Serializing a struct of strings and a Value cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// An incoming JSON-RPC response envelope
///
/// Every field is optional so that any JSON object decodes; whether it is a
/// usable envelope is decided by [`RpcResponse::is_envelope`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

impl RpcResponse {
    /// Decode a response body, `None` if it is not a JSON object
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// A 2.0 envelope carrying a `result` or an `error`
    pub fn is_envelope(&self) -> bool {
        self.jsonrpc.as_deref() == Some(JSONRPC_VERSION)
            && (self.result.is_some() || self.error.is_some())
    }

    /// `serverInfo` of an `initialize` result
    pub fn server_info(&self) -> Option<ServerInfo> {
        let info = self.result.as_ref()?.get("serverInfo")?;
        serde_json::from_value(info.clone()).ok()
    }

    /// `result.tools`; `Ok(empty)` when absent, `Err` when present but malformed
    pub fn tools(&self) -> Result<Vec<ToolDescriptor>, serde_json::Error> {
        match self.result.as_ref().and_then(|r| r.get("tools")) {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(tools) => serde_json::from_value(tools.clone()),
        }
    }

    /// Error code, -32603 (internal error) when the error object has none
    pub fn error_code(&self) -> i64 {
        self.error
            .as_ref()
            .and_then(|e| e.get("code"))
            .and_then(Value::as_i64)
            .unwrap_or(-32603)
    }

    pub fn error_message(&self) -> String {
        match self.error.as_ref() {
            Some(e) => e
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| e.to_string()),
            None => String::new(),
        }
    }
}
