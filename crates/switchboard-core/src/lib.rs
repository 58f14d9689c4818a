//! Core types shared by every switchboard crate.
//!
//! Holds the error taxonomy, the `{action, subtool?, args?}` request model
//! and the descriptors exchanged between the router and the outer server.

use serde_json::Value;
use thiserror::Error;

pub mod request;
pub mod types;

pub use request::{Action, CallRequest, SuiteAction};
pub use types::{ConnectionStatus, ToolDescriptor, TopLevelTool};

/// Opaque JSON value returned by a suite for an action.
pub type CallResult = Value;

#[derive(Error, Debug)]
pub enum SwitchboardError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown tool: '{name}'")]
    UnknownTool { name: String },

    #[error("Connection to suite '{suite}' failed: {reason}")]
    ConnectionError { suite: String, reason: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Suite '{suite}' sent a malformed response: {reason}")]
    UpstreamProtocolError { suite: String, reason: String },

    #[error("Suite '{suite}' returned error [{code}]: {message}")]
    SuiteError {
        suite: String,
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("Connection pool is closed, suite '{suite}' is no longer reachable")]
    PoolClosed { suite: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl SwitchboardError {
    /// Stable machine-readable tag for this error class.
    pub fn kind(&self) -> &'static str {
        match self {
            SwitchboardError::ConfigError(_) => "config_error",
            SwitchboardError::UnknownTool { .. } => "unknown_tool",
            SwitchboardError::ConnectionError { .. } => "connection_error",
            SwitchboardError::InvalidRequest(_) => "invalid_request",
            SwitchboardError::UpstreamProtocolError { .. } => "upstream_protocol_error",
            SwitchboardError::SuiteError { .. } => "suite_error",
            SwitchboardError::PoolClosed { .. } => "pool_closed",
            SwitchboardError::IoError(_) => "io_error",
            SwitchboardError::SerializationError(_) => "serialization_error",
        }
    }

    /// Suite the error is attributed to, if any.
    pub fn suite(&self) -> Option<&str> {
        match self {
            SwitchboardError::ConnectionError { suite, .. }
            | SwitchboardError::UpstreamProtocolError { suite, .. }
            | SwitchboardError::SuiteError { suite, .. }
            | SwitchboardError::PoolClosed { suite } => Some(suite),
            SwitchboardError::UnknownTool { name } => Some(name),
            _ => None,
        }
    }

    /// Connection failures are not cached, so the same call may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SwitchboardError::ConnectionError { .. })
    }

    pub fn connection(suite: impl Into<String>, reason: impl Into<String>) -> Self {
        SwitchboardError::ConnectionError {
            suite: suite.into(),
            reason: reason.into(),
        }
    }

    pub fn protocol(suite: impl Into<String>, reason: impl Into<String>) -> Self {
        SwitchboardError::UpstreamProtocolError {
            suite: suite.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SwitchboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = SwitchboardError::connection("weather", "spawn failed");
        assert_eq!(err.kind(), "connection_error");
        assert_eq!(err.suite(), Some("weather"));
        assert!(err.is_retryable());

        let err = SwitchboardError::InvalidRequest("missing action".into());
        assert_eq!(err.kind(), "invalid_request");
        assert_eq!(err.suite(), None);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_messages_name_the_suite() {
        let err = SwitchboardError::SuiteError {
            suite: "github".to_string(),
            code: -32602,
            message: "Unknown tool: nope".to_string(),
            data: None,
        };
        assert_eq!(
            err.to_string(),
            "Suite 'github' returned error [-32602]: Unknown tool: nope"
        );

        let err = SwitchboardError::protocol("github", "missing `tools` array");
        assert!(err.to_string().contains("github"));
        assert_eq!(err.kind(), "upstream_protocol_error");
    }
}
