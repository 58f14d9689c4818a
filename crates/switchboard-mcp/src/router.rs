//! Router: the facade the upstream server talks to.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use switchboard_config::SwitchboardConfig;
use switchboard_core::{CallRequest, CallResult, Result, SwitchboardError, TopLevelTool};
use tracing::{debug, info, warn};

use crate::dispatcher;
use crate::pool::ConnectionPool;
use crate::registry::SuiteRegistry;
use crate::session::SuiteConnector;

/// Routes top-level tool calls to their suites
#[derive(Clone)]
pub struct Router {
    registry: Arc<SuiteRegistry>,
    pool: ConnectionPool,
}

impl Router {
    /// Build the registry and an empty pool. Configuration problems fail
    /// here, before any suite is contacted.
    pub fn new(config: &SwitchboardConfig, connector: Arc<dyn SuiteConnector>) -> Result<Self> {
        let registry = Arc::new(SuiteRegistry::from_config(config)?);
        let shutdown_timeout = Duration::from_millis(config.settings.shutdown_timeout_ms);
        let pool = ConnectionPool::with_shutdown_timeout(registry.clone(), connector, shutdown_timeout);

        if registry.is_empty() {
            warn!("No enabled suites configured, the tool list will be empty");
        } else {
            info!("Router ready with {} suites", registry.len());
        }
        Ok(Self { registry, pool })
    }

    pub fn list_top_level_tools(&self) -> Vec<TopLevelTool> {
        self.registry.list_top_level_tools()
    }

    /// Run one request against the suite behind `tool_name`.
    ///
    /// Unknown tools and malformed requests fail before the pool is touched.
    /// Errors from the pool and the suite propagate unchanged.
    pub async fn handle_suite_call(&self, tool_name: &str, request: CallRequest) -> Result<CallResult> {
        if !self.registry.contains(tool_name) {
            return Err(SwitchboardError::UnknownTool {
                name: tool_name.to_string(),
            });
        }
        let action = request.into_action()?;

        debug!("Routing {} to suite '{}'", action.action(), tool_name);
        let connection = self.pool.acquire(tool_name).await?;

        let result = dispatcher::dispatch(&connection, action).await;
        if let Err(SwitchboardError::ConnectionError { reason, .. }) = &result {
            if !connection.is_alive().await {
                warn!("Suite '{}' connection lost: {}", tool_name, reason);
                self.pool.invalidate(&connection).await;
            }
        }
        result
    }

    /// Like [`Router::handle_suite_call`], for arguments still in raw JSON form
    pub async fn handle_tool_call(&self, tool_name: &str, arguments: Value) -> Result<CallResult> {
        if !self.registry.contains(tool_name) {
            return Err(SwitchboardError::UnknownTool {
                name: tool_name.to_string(),
            });
        }
        let request = CallRequest::from_value(arguments)?;
        self.handle_suite_call(tool_name, request).await
    }

    /// Close every pooled connection. Safe to call more than once.
    pub async fn close_all_clients(&self) {
        self.pool.close_all().await;
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}
