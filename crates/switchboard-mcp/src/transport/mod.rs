//! Transport layer for MCP communication
//!
//! Provides transport abstractions for talking to a suite with support for:
//! - Stdio (process-based) transport
//! - SSE (Server-Sent Events) transport

use async_trait::async_trait;
use std::fmt::Debug;
use switchboard_config::TransportConfig;
use switchboard_core::Result;

use crate::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

pub mod sse;
pub mod stdio;

pub use sse::SseTransport;
pub use stdio::StdioTransport;

/// Transport trait for MCP communication
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Send a JSON-RPC request
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<()>;

    /// Send a JSON-RPC notification (no response expected)
    async fn send_notification(&mut self, notification: JsonRpcNotification) -> Result<()>;

    /// Wait for the next JSON-RPC response.
    ///
    /// Returns `Ok(None)` once the peer has gone away and no more responses
    /// can arrive.
    async fn receive_response(&mut self) -> Result<Option<JsonRpcResponse>>;

    /// Check if transport is connected
    async fn is_connected(&self) -> bool;

    /// Close the transport connection
    async fn close(&mut self) -> Result<()>;
}

/// Create a transport instance for a suite
pub async fn create_transport(suite: &str, config: &TransportConfig) -> Result<Box<dyn Transport>> {
    match config {
        TransportConfig::Stdio { command, args, env, .. } => {
            let transport = StdioTransport::spawn(suite, command, args, env).await?;
            Ok(Box::new(transport))
        }
        TransportConfig::Sse { url, headers, timeout } => {
            let transport = SseTransport::connect(suite, url, headers, *timeout).await?;
            Ok(Box::new(transport))
        }
    }
}
