//! Suite configuration for the switchboard.
//!
//! Configuration is YAML: an ordered list of suites plus a few global
//! settings. Files are expanded with `${VAR}` / `${VAR:-default}` before
//! deserialisation and validated structurally before anything connects.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use switchboard_core::{Result, SwitchboardError};
use tracing::{debug, info};

pub mod env_substitution;
pub mod scaffold;

pub use env_substitution::substitute_env_vars;
pub use scaffold::{init, CONFIG_FILE_NAME};

/// Files checked, in order, when loading from a working directory
const CONFIG_CANDIDATES: &[&str] = &[
    "switchboard.yaml",
    "switchboard.yml",
    ".switchboard/switchboard.yaml",
];

/// Directory whose YAML files each contribute extra suites
const SUITES_DIR: &str = ".switchboard/suites";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchboardConfig {
    #[serde(default)]
    pub settings: Settings,

    /// Suites in declaration order; this order is the top-level tool order.
    #[serde(default)]
    pub suites: Vec<SuiteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Upper bound for closing one suite during shutdown, in milliseconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shutdown_timeout_ms: default_shutdown_timeout(),
        }
    }
}

/// One downstream suite.
///
/// Exactly one of `command` (stdio) or `url` (SSE) must be given; the
/// remaining fields only apply to the matching transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Suite name, also the name of its top-level tool
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Command to execute (e.g., "npx", "node", "/path/to/binary")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Base URL of an SSE endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Per-request timeout in milliseconds (default: 30000)
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub disabled: bool,
}

impl SuiteConfig {
    /// Declared description, or a generic one naming the suite
    pub fn description(&self) -> String {
        match self.description.as_deref().map(str::trim) {
            Some(description) if !description.is_empty() => description.to_string(),
            _ => format!("Tools from the {} suite", self.name),
        }
    }

    /// Resolve the connection parameters, rejecting incomplete ones
    pub fn transport(&self) -> Result<TransportConfig> {
        let invalid = |reason: &str| {
            SwitchboardError::ConfigError(format!("suite '{}': {}", self.name, reason))
        };

        if self.timeout == 0 {
            return Err(invalid("`timeout` must be greater than zero"));
        }

        match (&self.command, &self.url) {
            (Some(_), Some(_)) => Err(invalid("set either `command` or `url`, not both")),
            (None, None) => Err(invalid("missing connection parameters, set `command` or `url`")),
            (Some(command), None) => {
                if command.trim().is_empty() {
                    return Err(invalid("`command` must not be empty"));
                }
                Ok(TransportConfig::Stdio {
                    command: command.clone(),
                    args: self.args.clone(),
                    env: self.env.clone(),
                    timeout: self.timeout,
                })
            }
            (None, Some(url)) => {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(invalid("`url` must start with http:// or https://"));
                }
                Ok(TransportConfig::Sse {
                    url: url.clone(),
                    headers: self.headers.clone(),
                    timeout: self.timeout,
                })
            }
        }
    }
}

/// How to reach a suite's MCP endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Stdio-based transport (process communication)
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
        timeout: u64,
    },

    /// SSE-based transport (HTTP Server-Sent Events)
    Sse {
        url: String,
        headers: HashMap<String, String>,
        timeout: u64,
    },
}

impl TransportConfig {
    /// Request timeout in milliseconds
    pub fn timeout(&self) -> u64 {
        match self {
            TransportConfig::Stdio { timeout, .. } => *timeout,
            TransportConfig::Sse { timeout, .. } => *timeout,
        }
    }

    pub fn transport_type(&self) -> &str {
        match self {
            TransportConfig::Stdio { .. } => "stdio",
            TransportConfig::Sse { .. } => "sse",
        }
    }
}

fn default_timeout() -> u64 { 30000 }
fn default_shutdown_timeout() -> u64 { 3000 }

impl SwitchboardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config = Self::parse(yaml, "<inline>")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a single configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration for a working directory.
    ///
    /// The first of `switchboard.yaml`, `switchboard.yml` and
    /// `.switchboard/switchboard.yaml` is the main file; every YAML file in
    /// `.switchboard/suites/` then appends its suites, in file name order.
    pub fn load(working_dir: impl AsRef<Path>) -> Result<Self> {
        let working_dir = working_dir.as_ref();

        let main = CONFIG_CANDIDATES
            .iter()
            .map(|candidate| working_dir.join(candidate))
            .find(|path| path.is_file());

        let fragments = suite_fragments(&working_dir.join(SUITES_DIR))?;

        if main.is_none() && fragments.is_empty() {
            return Err(SwitchboardError::ConfigError(format!(
                "No switchboard configuration found in {}. Run `switchboard init` to create one.",
                working_dir.display()
            )));
        }

        let mut config = match &main {
            Some(path) => Self::read(path)?,
            None => Self::new(),
        };

        for path in fragments {
            let fragment = Self::read(&path)?;
            debug!(
                "Loaded {} suites from {}",
                fragment.suites.len(),
                path.display()
            );
            config.merge(fragment);
        }

        config.validate()?;
        info!(
            "Loaded switchboard configuration with {} suites from {}",
            config.suites.len(),
            working_dir.display()
        );
        Ok(config)
    }

    /// Append the suites of another configuration. Settings are kept from `self`.
    pub fn merge(&mut self, other: SwitchboardConfig) {
        self.suites.extend(other.suites);
    }

    /// Suites that are not disabled, in declaration order
    pub fn enabled_suites(&self) -> impl Iterator<Item = &SuiteConfig> {
        self.suites.iter().filter(|suite| !suite.disabled)
    }

    /// Structural validation; must pass before any connection is attempted
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for suite in &self.suites {
            if suite.name.trim().is_empty() {
                return Err(SwitchboardError::ConfigError(
                    "suite name cannot be empty".into(),
                ));
            }
            if suite.name.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(SwitchboardError::ConfigError(format!(
                    "suite name '{}' must not contain whitespace",
                    suite.name
                )));
            }
            if !seen.insert(suite.name.as_str()) {
                return Err(SwitchboardError::ConfigError(format!(
                    "duplicate suite name '{}'",
                    suite.name
                )));
            }
            suite.transport()?;
        }

        if self.settings.shutdown_timeout_ms == 0 {
            return Err(SwitchboardError::ConfigError(
                "settings.shutdown_timeout_ms must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SwitchboardError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    fn parse(content: &str, origin: &str) -> Result<Self> {
        let mut value: Value = serde_yaml::from_str(content).map_err(|e| {
            SwitchboardError::ConfigError(format!("Failed to parse YAML from {}: {}", origin, e))
        })?;

        if value.is_null() {
            return Ok(Self::new());
        }

        substitute_env_vars(&mut value)?;

        serde_json::from_value(value).map_err(|e| {
            SwitchboardError::ConfigError(format!("Invalid configuration in {}: {}", origin, e))
        })
    }
}

/// Collaborator entry point: load and validate the configuration for a
/// working directory.
pub fn get_config(working_dir: impl AsRef<Path>) -> Result<SwitchboardConfig> {
    SwitchboardConfig::load(working_dir)
}

fn suite_fragments(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .map(|ext| ext == "yaml" || ext == "yml")
            .unwrap_or(false);
        if is_yaml && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_error(yaml: &str) -> String {
        match SwitchboardConfig::from_yaml_str(yaml) {
            Err(SwitchboardError::ConfigError(message)) => message,
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
settings:
  shutdown_timeout_ms: 1500
suites:
  - name: weather
    description: Weather tools
    command: npx
    args: ["-y", "weather-mcp"]
    env:
      UNITS: metric
  - name: github
    url: http://localhost:8080
    headers:
      Authorization: Bearer token123
    timeout: 60000
"#;

        let config = SwitchboardConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.settings.shutdown_timeout_ms, 1500);
        assert_eq!(config.suites.len(), 2);
        assert_eq!(config.suites[0].name, "weather");
        assert_eq!(config.suites[0].description(), "Weather tools");
        assert_eq!(config.suites[1].description(), "Tools from the github suite");

        match config.suites[0].transport().unwrap() {
            TransportConfig::Stdio { command, args, env, timeout } => {
                assert_eq!(command, "npx");
                assert_eq!(args, vec!["-y", "weather-mcp"]);
                assert_eq!(env["UNITS"], "metric");
                assert_eq!(timeout, 30000);
            }
            other => panic!("expected stdio transport, got {:?}", other),
        }

        let sse = config.suites[1].transport().unwrap();
        assert_eq!(sse.transport_type(), "sse");
        assert_eq!(sse.timeout(), 60000);
    }

    #[test]
    fn test_validation() {
        let duplicate = r#"
suites:
  - name: weather
    command: a
  - name: weather
    command: b
"#;
        assert!(config_error(duplicate).contains("duplicate suite name 'weather'"));

        let missing = r#"
suites:
  - name: weather
"#;
        assert!(config_error(missing).contains("missing connection parameters"));

        let both = r#"
suites:
  - name: weather
    command: a
    url: http://localhost
"#;
        assert!(config_error(both).contains("not both"));

        let bad_url = r#"
suites:
  - name: weather
    url: localhost:8080
"#;
        assert!(config_error(bad_url).contains("http://"));

        let empty_name = r#"
suites:
  - name: ""
    command: a
"#;
        assert!(config_error(empty_name).contains("empty"));

        assert!(config_error("suites: 3").contains("Invalid configuration"));
    }

    #[test]
    fn test_disabled_suites_are_skipped_but_validated() {
        let yaml = r#"
suites:
  - name: a
    command: a
  - name: b
    command: b
    disabled: true
  - name: c
    command: c
"#;
        let config = SwitchboardConfig::from_yaml_str(yaml).unwrap();
        let names: Vec<&str> = config.enabled_suites().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_empty_document_is_an_empty_config() {
        let config = SwitchboardConfig::from_yaml_str("").unwrap();
        assert!(config.suites.is_empty());
        assert_eq!(config.settings.shutdown_timeout_ms, 3000);
    }

    #[test]
    fn test_env_substitution_applies_to_suites() {
        std::env::set_var("SWITCHBOARD_CFG_TOKEN", "secret");
        let yaml = r#"
suites:
  - name: github
    url: "${SWITCHBOARD_CFG_URL:-http://localhost:9000}"
    headers:
      Authorization: "Bearer ${SWITCHBOARD_CFG_TOKEN}"
"#;
        let config = SwitchboardConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.suites[0].url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.suites[0].headers["Authorization"], "Bearer secret");
        std::env::remove_var("SWITCHBOARD_CFG_TOKEN");
    }

    #[test]
    fn test_load_from_working_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("switchboard.yaml"),
            "suites:\n  - name: main\n    command: main-mcp\n",
        )
        .unwrap();

        let suites_dir = dir.path().join(".switchboard/suites");
        fs::create_dir_all(&suites_dir).unwrap();
        fs::write(
            suites_dir.join("20-second.yaml"),
            "suites:\n  - name: second\n    command: second-mcp\n",
        )
        .unwrap();
        fs::write(
            suites_dir.join("10-first.yml"),
            "suites:\n  - name: first\n    command: first-mcp\n",
        )
        .unwrap();
        fs::write(suites_dir.join("notes.txt"), "ignored").unwrap();

        let config = get_config(dir.path()).unwrap();
        let names: Vec<&str> = config.suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["main", "first", "second"]);
    }

    #[test]
    fn test_load_rejects_duplicates_across_files() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("switchboard.yaml"),
            "suites:\n  - name: main\n    command: main-mcp\n",
        )
        .unwrap();
        let suites_dir = dir.path().join(".switchboard/suites");
        fs::create_dir_all(&suites_dir).unwrap();
        fs::write(
            suites_dir.join("dup.yaml"),
            "suites:\n  - name: main\n    command: other\n",
        )
        .unwrap();

        assert!(matches!(
            get_config(dir.path()),
            Err(SwitchboardError::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_without_configuration_fails() {
        let dir = TempDir::new().unwrap();
        let err = get_config(dir.path()).unwrap_err();
        assert!(err.to_string().contains("switchboard init"));
    }
}
