//! Descriptors exchanged between the router and its callers

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One entry of the top-level tool catalog: a whole suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopLevelTool {
    pub name: String,
    pub description: String,
}

/// A subtool as reported by a suite's own `tools/list`.
///
/// Everything except the name stays in `fields` exactly as the suite sent
/// it, explicit nulls included, so introspection passes the catalog through
/// unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ToolDescriptor {
    pub fn description(&self) -> Option<&str> {
        self.fields.get("description").and_then(Value::as_str)
    }

    pub fn input_schema(&self) -> Option<&Value> {
        self.fields.get("inputSchema").filter(|schema| !schema.is_null())
    }
}

/// Lifecycle of a single suite connection.
///
/// Transitions only move forward: `Connecting -> Ready | Failed` and
/// `Ready -> Closed`. A closed connection can also be reached straight from
/// `Connecting` when the pool shuts down mid-connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Ready,
    Closed,
    Failed,
}

impl ConnectionStatus {
    pub fn can_advance_to(self, next: ConnectionStatus) -> bool {
        use ConnectionStatus::*;
        matches!(
            (self, next),
            (Connecting, Ready) | (Connecting, Failed) | (Connecting, Closed) | (Ready, Closed)
        )
    }

}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Ready => "ready",
            ConnectionStatus::Closed => "closed",
            ConnectionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_descriptor_keeps_unknown_fields() {
        let raw = json!({
            "name": "forecast",
            "description": "Daily forecast",
            "inputSchema": {"type": "object", "properties": {"city": {"type": "string"}}},
            "annotations": {"readOnlyHint": true}
        });

        let tool: ToolDescriptor = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(tool.name, "forecast");
        assert_eq!(tool.description(), Some("Daily forecast"));
        assert_eq!(tool.input_schema().unwrap()["type"], "object");
        assert!(tool.fields.contains_key("annotations"));

        assert_eq!(serde_json::to_value(&tool).unwrap(), raw);
    }

    #[test]
    fn test_tool_descriptor_keeps_explicit_nulls() {
        let raw = json!({"name": "ping", "description": null, "inputSchema": null});

        let tool: ToolDescriptor = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(tool.description(), None);
        assert_eq!(tool.input_schema(), None);
        assert_eq!(serde_json::to_value(&tool).unwrap(), raw);

        let bare: ToolDescriptor = serde_json::from_value(json!({"name": "ping"})).unwrap();
        assert_eq!(serde_json::to_value(&bare).unwrap(), json!({"name": "ping"}));
    }

    #[test]
    fn test_status_only_moves_forward() {
        use ConnectionStatus::*;
        assert!(Connecting.can_advance_to(Ready));
        assert!(Connecting.can_advance_to(Failed));
        assert!(Ready.can_advance_to(Closed));

        assert!(!Ready.can_advance_to(Connecting));
        assert!(!Closed.can_advance_to(Ready));
        assert!(!Failed.can_advance_to(Ready));
        assert!(!Ready.can_advance_to(Ready));
    }
}
