//! MCP client implementation

use serde_json::{json, Map, Value};
use switchboard_config::TransportConfig;
use switchboard_core::{Result, SwitchboardError, ToolDescriptor};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::transport::{create_transport, Transport};
use crate::types::{InitializeParams, InitializeResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Upper bound on `tools/list` pages followed for one introspection
const MAX_LIST_PAGES: usize = 64;

/// MCP client for communicating with one suite
pub struct McpClient {
    /// Suite name for identification
    name: String,

    /// Transport for communication
    transport: Box<dyn Transport>,

    /// Request ID counter
    request_id: u64,

    /// Timeout duration for requests (in milliseconds)
    timeout_ms: u64,
}

impl McpClient {
    /// Open the transport described by `config`. The handshake is a
    /// separate step, see [`McpClient::initialize`].
    pub async fn connect(name: &str, config: &TransportConfig) -> Result<Self> {
        let transport = create_transport(name, config).await?;
        Ok(Self::with_transport(name, transport, config.timeout()))
    }

    pub fn with_transport(name: &str, transport: Box<dyn Transport>, timeout_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            transport,
            request_id: 0,
            timeout_ms,
        }
    }

    fn next_request_id(&mut self) -> String {
        self.request_id += 1;
        self.request_id.to_string()
    }

    /// Run the MCP handshake: `initialize` followed by `notifications/initialized`
    pub async fn initialize(&mut self) -> Result<InitializeResult> {
        info!("Initializing MCP client for suite '{}'", self.name);

        let params = serde_json::to_value(InitializeParams::default())?;
        let result = self.send_request("initialize", Some(params)).await?;

        let result: InitializeResult = serde_json::from_value(result).map_err(|e| {
            SwitchboardError::protocol(&self.name, format!("invalid initialize result: {}", e))
        })?;

        info!(
            "Suite '{}' initialized with protocol version: {}",
            self.name, result.protocol_version
        );
        if let Some(ref server_info) = result.server_info {
            debug!(
                "Suite '{}' is served by {} v{}",
                self.name, server_info.name, server_info.version
            );
        }

        let notification =
            JsonRpcNotification::new("notifications/initialized".to_string(), Some(json!({})));
        self.transport.send_notification(notification).await?;

        Ok(result)
    }

    /// List the suite's tools, following pagination cursors
    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        debug!("Listing tools from suite '{}'", self.name);

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self.send_request("tools/list", params).await?;
            let (page, next) = parse_tool_page(&self.name, result)?;
            tools.extend(page);

            match next {
                Some(next) => cursor = Some(next),
                None => {
                    debug!("Suite '{}' reported {} tools", self.name, tools.len());
                    return Ok(tools);
                }
            }
        }

        Err(SwitchboardError::protocol(
            &self.name,
            format!("tools/list did not finish within {} pages", MAX_LIST_PAGES),
        ))
    }

    /// Call a tool and return the suite's raw result
    pub async fn call_tool(&mut self, name: &str, arguments: Map<String, Value>) -> Result<Value> {
        debug!("Calling tool '{}' on suite '{}'", name, self.name);

        let params = json!({
            "name": name,
            "arguments": arguments,
        });
        self.send_request("tools/call", Some(params)).await
    }

    /// Send a request and wait for its correlated response.
    ///
    /// Returns the `result` member; a JSON-RPC `error` becomes
    /// [`SwitchboardError::SuiteError`].
    async fn send_request(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        let request_id = self.next_request_id();
        let request = JsonRpcRequest::new(request_id.clone(), method.to_string(), params);

        self.transport.send_request(request).await?;

        let timeout_duration = Duration::from_millis(self.timeout_ms);
        let response = timeout(timeout_duration, self.wait_for_response(&request_id))
            .await
            .map_err(|_| {
                SwitchboardError::connection(
                    &self.name,
                    format!("{} request {} timed out after {}ms", method, request_id, self.timeout_ms),
                )
            })??;

        if let Some(error) = response.error {
            return Err(SwitchboardError::SuiteError {
                suite: self.name.clone(),
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        response.result.ok_or_else(|| {
            SwitchboardError::protocol(
                &self.name,
                format!("{} response has neither result nor error", method),
            )
        })
    }

    /// Wait for a specific response by ID
    async fn wait_for_response(&mut self, request_id: &str) -> Result<JsonRpcResponse> {
        loop {
            match self.transport.receive_response().await? {
                Some(response) if response.matches(request_id) => return Ok(response),
                Some(response) => {
                    // Late answer to a request that already timed out
                    warn!(
                        "Suite '{}' sent response for request {} (expected: {})",
                        self.name, response.id, request_id
                    );
                }
                None => {
                    return Err(SwitchboardError::connection(
                        &self.name,
                        "connection closed while waiting for a response",
                    ))
                }
            }
        }
    }

    /// Check if the client is connected
    pub async fn is_connected(&self) -> bool {
        self.transport.is_connected().await
    }

    /// Close the client connection
    pub async fn close(&mut self) -> Result<()> {
        debug!("Closing MCP client for suite '{}'", self.name);
        self.transport.close().await
    }
}

/// Validate one `tools/list` result page
fn parse_tool_page(suite: &str, result: Value) -> Result<(Vec<ToolDescriptor>, Option<String>)> {
    let mut object = match result {
        Value::Object(object) => object,
        _ => {
            return Err(SwitchboardError::protocol(
                suite,
                "tools/list result is not an object",
            ))
        }
    };

    let tools = match object.remove("tools") {
        Some(Value::Array(tools)) => tools,
        _ => {
            return Err(SwitchboardError::protocol(
                suite,
                "tools/list result is missing the `tools` array",
            ))
        }
    };

    let tools = tools
        .into_iter()
        .enumerate()
        .map(|(index, tool)| {
            serde_json::from_value::<ToolDescriptor>(tool).map_err(|e| {
                SwitchboardError::protocol(suite, format!("tool #{} is malformed: {}", index, e))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let next = match object.remove("nextCursor") {
        Some(Value::String(cursor)) if !cursor.is_empty() => Some(cursor),
        _ => None,
    };

    Ok((tools, next))
}
