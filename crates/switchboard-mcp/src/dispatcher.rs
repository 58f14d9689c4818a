//! Action dispatcher: runs `introspect` and `call` against a suite connection.
//!
//! Arguments and results pass through untouched. Schema enforcement is the
//! suite's own business.

use serde_json::{Map, Value};
use switchboard_core::request::is_valid_subtool_name;
use switchboard_core::{CallResult, Result, SuiteAction, SwitchboardError, ToolDescriptor};
use tracing::debug;

use crate::connection::SuiteConnection;

/// Ask the suite for its own subtool catalog, in the order it reports it
pub async fn introspect(connection: &SuiteConnection) -> Result<Vec<ToolDescriptor>> {
    debug!("Introspecting suite '{}'", connection.suite());
    connection.list_tools().await
}

/// Invoke `subtool` with `args` and return the suite's raw result
pub async fn call(
    connection: &SuiteConnection,
    subtool: &str,
    args: Map<String, Value>,
) -> Result<CallResult> {
    if !is_valid_subtool_name(subtool) {
        return Err(SwitchboardError::InvalidRequest(format!(
            "invalid subtool name '{}'",
            subtool
        )));
    }

    debug!("Calling '{}' on suite '{}'", subtool, connection.suite());
    connection.call_tool(subtool, args).await
}

/// Run a validated action. The catalog from `introspect` is returned as a
/// JSON array of descriptors.
pub async fn dispatch(connection: &SuiteConnection, action: SuiteAction) -> Result<CallResult> {
    match action {
        SuiteAction::Introspect => {
            let tools = introspect(connection).await?;
            Ok(serde_json::to_value(tools)?)
        }
        SuiteAction::Call { subtool, args } => call(connection, &subtool, args).await,
    }
}
