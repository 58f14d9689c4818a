//! `switchboard init`: writes a starter configuration file

use std::path::{Path, PathBuf};
use switchboard_core::{Result, SwitchboardError};
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "switchboard.yaml";

const TEMPLATE: &str = r#"# MCP Switchboard configuration
#
# Every suite below becomes one top-level tool. Clients call it with
#   {"action": "introspect"}                                  to list its subtools
#   {"action": "call", "subtool": "<name>", "args": {...}}    to run one
#
# Values may reference environment variables as ${VAR} or ${VAR:-default}.

settings:
  # Upper bound for closing each suite on shutdown (ms)
  shutdown_timeout_ms: 3000

suites:
  # Process-spawned suite speaking MCP over stdio
  - name: everything
    description: Reference MCP server exposing sample tools
    command: npx
    args: ["-y", "@modelcontextprotocol/server-everything"]
    env: {}
    timeout: 30000

  # HTTP suite speaking MCP over SSE
  # - name: remote
  #   description: Remote tools
  #   url: http://localhost:8080
  #   headers:
  #     Authorization: "Bearer ${REMOTE_TOKEN}"
  #   disabled: true
"#;

/// Write the starter configuration into `dir`.
///
/// Refuses to replace an existing file unless `force` is set.
pub fn init(dir: impl AsRef<Path>, force: bool) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let path = dir.join(CONFIG_FILE_NAME);

    if path.exists() && !force {
        return Err(SwitchboardError::ConfigError(format!(
            "{} already exists, pass --force to overwrite it",
            path.display()
        )));
    }

    std::fs::create_dir_all(dir)?;
    std::fs::write(&path, TEMPLATE)?;
    info!("Wrote switchboard configuration template to {}", path.display());

    Ok(path)
}
