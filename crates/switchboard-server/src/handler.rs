//! Maps upstream MCP requests onto the router.

use serde_json::{json, Map, Value};
use switchboard_mcp::Router;
use tracing::{debug, error, info, warn};

use crate::protocol::{
    self, IncomingMessage, OutgoingResponse, RpcError, DEFAULT_PROTOCOL_VERSION, INTERNAL_ERROR,
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, SERVER_NAME,
};

/// Stateless request handler; cheap to clone into per-request tasks
#[derive(Clone)]
pub struct RequestHandler {
    router: Router,
}

impl RequestHandler {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handle one line of input. Returns the response to write, if any.
    ///
    /// Bytes that are not valid UTF-8 JSON get a parse error like any other
    /// malformed line.
    pub async fn handle_line(&self, line: impl AsRef<[u8]>) -> Option<OutgoingResponse> {
        let value: Value = match serde_json::from_slice(line.as_ref()) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to parse JSON-RPC message");
                return Some(OutgoingResponse::error(
                    Value::Null,
                    RpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let message: IncomingMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Invalid JSON-RPC message");
                return Some(OutgoingResponse::error(
                    id,
                    RpcError::new(INVALID_REQUEST, format!("Invalid request: {}", e)),
                ));
            }
        };

        self.handle(message).await
    }

    pub async fn handle(&self, message: IncomingMessage) -> Option<OutgoingResponse> {
        let Some(id) = message.id.clone() else {
            debug!(method = %message.method, "Ignoring notification");
            return None;
        };

        if message.jsonrpc != "2.0" {
            return Some(OutgoingResponse::error(
                id,
                RpcError::new(INVALID_REQUEST, "Invalid JSON-RPC version, expected 2.0"),
            ));
        }

        let result = match message.method.as_str() {
            "initialize" => Ok(self.initialize(&message.params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(protocol::tools_list_result(&self.router.list_top_level_tools())),
            "tools/call" => self.tools_call(message.params).await,
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        };

        Some(match result {
            Ok(result) => OutgoingResponse::success(id, result),
            Err(error) => OutgoingResponse::error(id, error),
        })
    }

    fn initialize(&self, params: &Value) -> Value {
        let version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);
        info!("Upstream client initialized with protocol version {}", version);

        json!({
            "protocolVersion": version,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            }
        })
    }

    async fn tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let mut params = match params {
            Value::Object(params) => params,
            _ => return Err(RpcError::new(INVALID_PARAMS, "tools/call params must be an object")),
        };
        let name = match params.remove("name") {
            Some(Value::String(name)) => name,
            _ => return Err(RpcError::new(INVALID_PARAMS, "Missing 'name' parameter")),
        };
        let arguments = params
            .remove("arguments")
            .unwrap_or_else(|| Value::Object(Map::new()));
        let action = arguments
            .get("action")
            .and_then(Value::as_str)
            .map(str::to_string);

        info!(tool = %name, action = ?action, "Dispatching tool call");
        let body = match self.router.handle_tool_call(&name, arguments).await {
            Ok(result) => protocol::call_success(&result),
            Err(e) => {
                error!(tool = %name, kind = e.kind(), error = %e, "Tool call failed");
                protocol::call_failure(&e, action.as_deref())
            }
        };
        body.map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))
    }
}
