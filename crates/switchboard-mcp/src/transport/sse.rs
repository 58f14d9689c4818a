//! SSE (Server-Sent Events) transport implementation for HTTP-based MCP suites

use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use switchboard_core::{Result, SwitchboardError};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::Transport;
use crate::types::{decode_response, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// SSE transport for HTTP-based MCP suites
pub struct SseTransport {
    suite: String,

    /// Base URL of the suite
    url: String,

    /// HTTP client for sending requests; carries the configured headers
    client: reqwest::Client,

    response_rx: mpsc::Receiver<JsonRpcResponse>,

    connected: Arc<AtomicBool>,

    /// Messages URL announced by the `endpoint` event
    messages_url: Arc<RwLock<Option<String>>>,

    listener: JoinHandle<()>,
}

impl std::fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseTransport")
            .field("suite", &self.suite)
            .field("url", &self.url)
            .field("connected", &self.connected)
            .finish()
    }
}

impl SseTransport {
    /// Open the event stream of an SSE suite
    pub async fn connect(
        suite: &str,
        url: &str,
        headers: &HashMap<String, String>,
        timeout_ms: u64,
    ) -> Result<Self> {
        info!("Connecting to suite '{}' via SSE: {}", suite, url);

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SwitchboardError::connection(
                suite,
                "SSE URL must start with http:// or https://",
            ));
        }

        let mut default_headers = reqwest::header::HeaderMap::new();
        for (key, value) in headers {
            let header_name = reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                SwitchboardError::connection(suite, format!("invalid header name '{}': {}", key, e))
            })?;
            let header_value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
                SwitchboardError::connection(suite, format!("invalid header value for '{}': {}", key, e))
            })?;
            default_headers.insert(header_name, header_value);
        }

        // No overall timeout on the client: the event stream is long-lived.
        // Request timeouts are enforced per call by the MCP client.
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_millis(timeout_ms))
            .default_headers(default_headers)
            .build()
            .map_err(|e| {
                SwitchboardError::connection(suite, format!("failed to build HTTP client: {}", e))
            })?;

        let base_url = url.trim_end_matches('/').to_string();
        let sse_url = if base_url.ends_with("/sse") {
            base_url.clone()
        } else {
            format!("{}/sse", base_url)
        };

        let event_source = EventSource::new(client.get(&sse_url)).map_err(|e| {
            SwitchboardError::connection(suite, format!("failed to open event stream: {}", e))
        })?;

        let (response_tx, response_rx) = mpsc::channel::<JsonRpcResponse>(100);
        let connected = Arc::new(AtomicBool::new(false));
        let messages_url = Arc::new(RwLock::new(None::<String>));

        let listener = tokio::spawn(listen(
            suite.to_string(),
            base_url.clone(),
            event_source,
            response_tx,
            connected.clone(),
            messages_url.clone(),
        ));

        // Wait briefly for connection to establish
        tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

        if listener.is_finished() {
            return Err(SwitchboardError::connection(
                suite,
                format!("event stream at {} closed during connect", sse_url),
            ));
        }

        Ok(Self {
            suite: suite.to_string(),
            url: base_url,
            client,
            response_rx,
            connected,
            messages_url,
            listener,
        })
    }

    /// Send a message via HTTP POST to the messages endpoint
    async fn send_message(&self, json: String) -> Result<()> {
        let messages_url = match self.messages_url.read().await.as_ref() {
            Some(url) => url.clone(),
            None => format!("{}/messages", self.url),
        };

        debug!("Sending message to {}: {}", messages_url, json);

        let response = self
            .client
            .post(&messages_url)
            .header("Content-Type", "application/json")
            .body(json)
            .send()
            .await
            .map_err(|e| {
                SwitchboardError::connection(&self.suite, format!("failed to send HTTP request: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SwitchboardError::connection(
                &self.suite,
                format!("HTTP request failed with status {}: {}", status, body),
            ));
        }

        Ok(())
    }
}

async fn listen(
    suite: String,
    base_url: String,
    mut stream: EventSource,
    response_tx: mpsc::Sender<JsonRpcResponse>,
    connected: Arc<AtomicBool>,
    messages_url: Arc<RwLock<Option<String>>>,
) {
    while let Some(event) = stream.next().await {
        match event {
            Ok(Event::Open) => {
                info!("SSE connection to suite '{}' opened", suite);
                connected.store(true, Ordering::SeqCst);
            }
            Ok(Event::Message(msg)) => {
                let preview: String = msg.data.chars().take(100).collect();
                debug!("SSE event from '{}' - Type: '{}', Data: {}", suite, msg.event, preview);

                if msg.event == "endpoint" {
                    let endpoint_url = resolve_endpoint(&base_url, &msg.data);
                    info!("Suite '{}' announced messages endpoint: {}", suite, endpoint_url);
                    *messages_url.write().await = Some(endpoint_url);
                } else if msg.event == "message" || msg.event.is_empty() {
                    match decode_response(msg.data.as_bytes()) {
                        Ok(Some(response)) => {
                            if response_tx.send(response).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => debug!("Ignoring server-initiated message from '{}'", suite),
                        Err(e) => debug!("Unparseable SSE message from '{}': {}", suite, e),
                    }
                }
            }
            Err(e) => {
                error!("SSE stream error for suite '{}': {:?}", suite, e);
                break;
            }
        }
    }

    stream.close();
    connected.store(false, Ordering::SeqCst);
    info!("SSE event listener for suite '{}' ended", suite);
}

/// The endpoint event carries either an absolute URL or a path on the suite's origin
fn resolve_endpoint(base_url: &str, data: &str) -> String {
    let data = data.trim();
    if data.starts_with("http://") || data.starts_with("https://") {
        return data.to_string();
    }

    let origin_end = base_url
        .find("://")
        .and_then(|scheme| base_url[scheme + 3..].find('/').map(|i| scheme + 3 + i))
        .unwrap_or(base_url.len());
    format!("{}/{}", &base_url[..origin_end], data.trim_start_matches('/'))
}

#[async_trait]
impl Transport for SseTransport {
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<()> {
        let json = serde_json::to_string(&request)?;
        self.send_message(json).await
    }

    async fn send_notification(&mut self, notification: JsonRpcNotification) -> Result<()> {
        let json = serde_json::to_string(&notification)?;
        self.send_message(json).await
    }

    async fn receive_response(&mut self) -> Result<Option<JsonRpcResponse>> {
        Ok(self.response_rx.recv().await)
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<()> {
        debug!("Closing SSE transport for suite '{}'", self.suite);
        self.listener.abort();
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
