//! Stdio transport implementation for process-based MCP suites

use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use switchboard_core::{Result, SwitchboardError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

use super::Transport;
use crate::types::{decode_response, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// How long a suite gets to exit on its own after stdin closes
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Stdio transport for process-based MCP suites
pub struct StdioTransport {
    suite: String,

    /// Child process handle
    process: Option<Child>,

    /// Process stdin for sending data
    stdin: Option<ChildStdin>,

    /// Responses decoded by the stdout reader task
    response_rx: mpsc::Receiver<JsonRpcResponse>,

    command: String,
    args: Vec<String>,

    connected: Arc<AtomicBool>,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("suite", &self.suite)
            .field("command", &self.command)
            .field("args", &self.args)
            .finish()
    }
}

impl StdioTransport {
    /// Spawn the suite process and start reading its output
    pub async fn spawn(
        suite: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Self> {
        info!("Starting suite '{}' via stdio: {} {:?}", suite, command, args);

        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            SwitchboardError::connection(suite, format!("failed to spawn '{}': {}", command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SwitchboardError::connection(suite, "process stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SwitchboardError::connection(suite, "process stdout unavailable"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SwitchboardError::connection(suite, "process stderr unavailable"))?;

        let (response_tx, response_rx) = mpsc::channel::<JsonRpcResponse>(100);
        let connected = Arc::new(AtomicBool::new(true));

        let connected_clone = connected.clone();
        let suite_name = suite.to_string();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = Vec::new();

            // Read raw bytes so a line of invalid UTF-8 is skipped, not fatal
            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line).await {
                    Ok(0) => {
                        info!("Suite '{}' closed its stdout", suite_name);
                        break;
                    }
                    Ok(_) => {
                        let text = String::from_utf8_lossy(&line);
                        let trimmed = text.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        debug!("Received from suite '{}': {}", suite_name, trimmed);

                        match decode_response(&line) {
                            Ok(Some(response)) => {
                                if response_tx.send(response).await.is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {
                                debug!("Ignoring server-initiated message from '{}'", suite_name);
                            }
                            Err(e) => {
                                debug!("Non-JSON-RPC output from '{}': {} - {}", suite_name, trimmed, e);
                            }
                        }
                    }
                    Err(e) => {
                        error!("Error reading stdout of suite '{}': {}", suite_name, e);
                        break;
                    }
                }
            }

            connected_clone.store(false, Ordering::SeqCst);
        });

        let suite_name = suite.to_string();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut line = Vec::new();

            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let text = String::from_utf8_lossy(&line);
                        let trimmed = text.trim();
                        if !trimmed.is_empty() {
                            debug!("Suite '{}' stderr: {}", suite_name, trimmed);
                        }
                    }
                    Err(e) => {
                        warn!("Error reading stderr of suite '{}': {}", suite_name, e);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            suite: suite.to_string(),
            process: Some(child),
            stdin: Some(stdin),
            response_rx,
            command: command.to_string(),
            args: args.to_vec(),
            connected,
        })
    }

    async fn write_line(&mut self, json: String) -> Result<()> {
        let suite = self.suite.clone();
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SwitchboardError::connection(&suite, "process stdin not available"))?;

        debug!("Sending to suite '{}': {}", suite, json);
        let write = async {
            stdin.write_all(json.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };

        write.await.map_err(|e| {
            self.connected.store(false, Ordering::SeqCst);
            SwitchboardError::connection(&suite, format!("failed to write to stdin: {}", e))
        })
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<()> {
        let json = serde_json::to_string(&request)?;
        self.write_line(json).await
    }

    async fn send_notification(&mut self, notification: JsonRpcNotification) -> Result<()> {
        let json = serde_json::to_string(&notification)?;
        self.write_line(json).await
    }

    async fn receive_response(&mut self) -> Result<Option<JsonRpcResponse>> {
        Ok(self.response_rx.recv().await)
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<()> {
        debug!("Closing stdio transport for suite '{}'", self.suite);

        // Closing stdin is the polite shutdown signal for stdio servers
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }

        if let Some(mut child) = self.process.take() {
            match timeout(EXIT_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!("Suite '{}' exited with {}", self.suite, status),
                _ => match child.kill().await {
                    Ok(()) => info!("Suite '{}' process terminated", self.suite),
                    Err(e) => error!("Failed to kill suite '{}' process: {}", self.suite, e),
                },
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
