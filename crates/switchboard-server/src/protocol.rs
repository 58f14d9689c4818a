//! JSON-RPC framing and MCP payloads for the upstream side.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use switchboard_core::{SwitchboardError, TopLevelTool};

/// Protocol version offered when the client does not name one
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

pub const SERVER_NAME: &str = "mcp-switchboard";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// A request or notification from the upstream client
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub jsonrpc: String,
    /// Absent for notifications
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl IncomingMessage {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl OutgoingResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Input schema shared by every top-level tool
pub fn suite_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": ["introspect", "call"],
                "description": "introspect lists the suite's subtools; call invokes one of them"
            },
            "subtool": {
                "type": "string",
                "description": "Subtool to invoke, required when action is call"
            },
            "args": {
                "type": "object",
                "description": "Arguments passed to the subtool as is",
                "additionalProperties": true
            }
        },
        "required": ["action"]
    })
}

/// `tools/list` result advertising one tool per suite
pub fn tools_list_result(tools: &[TopLevelTool]) -> Value {
    let tools: Vec<Value> = tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": suite_input_schema(),
            })
        })
        .collect();
    json!({ "tools": tools })
}

/// Successful call: the suite's result as one pretty-printed text block
pub fn call_success(result: &Value) -> Result<Value, serde_json::Error> {
    Ok(json!({
        "content": [{"type": "text", "text": serde_json::to_string_pretty(result)?}],
        "isError": false
    }))
}

/// Failed call, carrying enough detail to diagnose without internals
pub fn call_failure(error: &SwitchboardError, action: Option<&str>) -> Result<Value, serde_json::Error> {
    let body = json!({
        "error": {
            "kind": error.kind(),
            "suite": error.suite(),
            "action": action,
            "message": error.to_string(),
        }
    });
    Ok(json!({
        "content": [{"type": "text", "text": serde_json::to_string_pretty(&body)?}],
        "isError": true
    }))
}
