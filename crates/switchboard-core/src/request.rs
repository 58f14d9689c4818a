//! The `{action, subtool?, args?}` payload accepted by every top-level tool.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::{Result, SwitchboardError};

/// Action requested against a suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Introspect,
    Call,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Introspect => "introspect",
            Action::Call => "call",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "introspect" => Some(Action::Introspect),
            "call" => Some(Action::Call),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw request as received from the upstream client.
///
/// `subtool` and `args` are only meaningful for [`Action::Call`] and are
/// ignored for [`Action::Introspect`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Map<String, Value>>,
}

impl CallRequest {
    pub fn introspect() -> Self {
        Self {
            action: Action::Introspect,
            subtool: None,
            args: None,
        }
    }

    pub fn call(subtool: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            action: Action::Call,
            subtool: Some(subtool.into()),
            args: Some(args),
        }
    }

    /// Parse tool-call arguments coming straight off the wire.
    ///
    /// Hand-rolled instead of `serde_json::from_value` so every rejection
    /// names the offending field.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut object = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(SwitchboardError::InvalidRequest(format!(
                    "arguments must be an object, got {}",
                    json_type_name(&other)
                )))
            }
        };

        let action = match object.remove("action") {
            Some(Value::String(action)) => Action::parse(&action).ok_or_else(|| {
                SwitchboardError::InvalidRequest(format!(
                    "unknown action '{}', expected 'introspect' or 'call'",
                    action
                ))
            })?,
            Some(Value::Null) | None => {
                return Err(SwitchboardError::InvalidRequest(
                    "missing required field `action`".into(),
                ))
            }
            Some(other) => {
                return Err(SwitchboardError::InvalidRequest(format!(
                    "`action` must be a string, got {}",
                    json_type_name(&other)
                )))
            }
        };

        let subtool = match object.remove("subtool") {
            Some(Value::String(name)) => Some(name),
            Some(Value::Null) | None => None,
            Some(other) => {
                return Err(SwitchboardError::InvalidRequest(format!(
                    "`subtool` must be a string, got {}",
                    json_type_name(&other)
                )))
            }
        };

        let args = match object.remove("args") {
            Some(Value::Object(map)) => Some(map),
            Some(Value::Null) | None => None,
            Some(other) => {
                return Err(SwitchboardError::InvalidRequest(format!(
                    "`args` must be an object, got {}",
                    json_type_name(&other)
                )))
            }
        };

        Ok(Self {
            action,
            subtool,
            args,
        })
    }

    /// Resolve into a dispatchable action, enforcing the per-action fields.
    pub fn into_action(self) -> Result<SuiteAction> {
        match self.action {
            Action::Introspect => Ok(SuiteAction::Introspect),
            Action::Call => {
                let subtool = self.subtool.ok_or_else(|| {
                    SwitchboardError::InvalidRequest(
                        "action 'call' requires a `subtool`".into(),
                    )
                })?;
                if !is_valid_subtool_name(&subtool) {
                    return Err(SwitchboardError::InvalidRequest(format!(
                        "invalid subtool name '{}'",
                        subtool
                    )));
                }
                Ok(SuiteAction::Call {
                    subtool,
                    args: self.args.unwrap_or_default(),
                })
            }
        }
    }
}

/// A validated request, ready to run against a suite connection
#[derive(Debug, Clone, PartialEq)]
pub enum SuiteAction {
    Introspect,
    Call {
        subtool: String,
        args: Map<String, Value>,
    },
}

impl SuiteAction {
    pub fn action(&self) -> Action {
        match self {
            SuiteAction::Introspect => Action::Introspect,
            SuiteAction::Call { .. } => Action::Call,
        }
    }

    pub fn subtool(&self) -> Option<&str> {
        match self {
            SuiteAction::Introspect => None,
            SuiteAction::Call { subtool, .. } => Some(subtool),
        }
    }
}

/// Subtool names are opaque to us, but must be non-empty and free of
/// whitespace and control characters.
pub fn is_valid_subtool_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c.is_whitespace() || c.is_control())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
