//! The seam between the pool and a concrete protocol client.
//!
//! The pool only knows how to ask a [`SuiteConnector`] for a
//! [`SuiteSession`]; which transport sits behind it is the connector's
//! business.

use async_trait::async_trait;
use serde_json::{Map, Value};
use switchboard_core::{Result, SwitchboardError, ToolDescriptor};
use tracing::warn;

use crate::client::McpClient;
use crate::registry::SuiteDescriptor;

/// A live, stateful channel to one suite
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SuiteSession: Send + Sync {
    /// The suite's own subtool catalog
    async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke a subtool and return the suite's raw result
    async fn call_tool(&mut self, name: &str, arguments: Map<String, Value>) -> Result<Value>;

    async fn is_connected(&self) -> bool;

    async fn close(&mut self) -> Result<()>;
}

/// Establishes sessions. Any failure must surface as a connection error.
#[async_trait]
pub trait SuiteConnector: Send + Sync {
    async fn connect(&self, suite: &SuiteDescriptor) -> Result<Box<dyn SuiteSession>>;
}

#[async_trait]
impl SuiteSession for McpClient {
    async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        McpClient::list_tools(self).await
    }

    async fn call_tool(&mut self, name: &str, arguments: Map<String, Value>) -> Result<Value> {
        McpClient::call_tool(self, name, arguments).await
    }

    async fn is_connected(&self) -> bool {
        McpClient::is_connected(self).await
    }

    async fn close(&mut self) -> Result<()> {
        McpClient::close(self).await
    }
}

/// Connects to suites over the transport named in their configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct McpConnector;

#[async_trait]
impl SuiteConnector for McpConnector {
    async fn connect(&self, suite: &SuiteDescriptor) -> Result<Box<dyn SuiteSession>> {
        let mut client = McpClient::connect(&suite.name, &suite.transport).await?;

        if let Err(e) = client.initialize().await {
            if let Err(close_err) = client.close().await {
                warn!("Error closing suite '{}' after failed handshake: {}", suite.name, close_err);
            }
            return Err(match e {
                SwitchboardError::ConnectionError { .. } => e,
                other => SwitchboardError::connection(
                    &suite.name,
                    format!("handshake failed: {}", other),
                ),
            });
        }

        Ok(Box::new(client))
    }
}
