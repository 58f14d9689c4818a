//! Newline-delimited JSON-RPC server loop.

use std::time::Duration;
use switchboard_core::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::handler::RequestHandler;
use crate::protocol::OutgoingResponse;

/// How long requests still in flight at EOF may take to finish
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Serve requests from `reader` until it reaches EOF.
///
/// Each request runs on its own task, so a slow suite does not hold up
/// calls to the others. Responses go through one writer task and are
/// written whole, one per line, in completion order. At EOF, requests
/// already read get up to [`DRAIN_TIMEOUT`] to answer before they are
/// abandoned.
pub async fn run<R, W>(handler: RequestHandler, mut reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<OutgoingResponse>();
    let mut writer_task = tokio::spawn(write_responses(writer, rx));
    let mut requests = JoinSet::new();

    // Lines are raw bytes; invalid UTF-8 is a parse error for that line only
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        while requests.try_join_next().is_some() {}

        let line = trim_line(&buf);
        if line.is_empty() {
            continue;
        }
        debug!(raw = %String::from_utf8_lossy(line), "Received message");

        let handler = handler.clone();
        let tx = tx.clone();
        let line = line.to_vec();
        requests.spawn(async move {
            if let Some(response) = handler.handle_line(&line).await {
                // The writer only goes away during shutdown
                let _ = tx.send(response);
            }
        });
    }

    info!("Upstream input closed");
    drop(tx);

    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while requests.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(
            "Abandoning {} requests still running after {:?}",
            requests.len(),
            DRAIN_TIMEOUT
        );
        requests.abort_all();
    }
    drop(requests);

    // Aborted requests drop their senders, so the writer sees the channel close
    if tokio::time::timeout(DRAIN_TIMEOUT, &mut writer_task).await.is_err() {
        warn!("Response writer did not finish, dropping pending output");
        writer_task.abort();
    }
    Ok(())
}

fn trim_line(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &line[start..end]
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<OutgoingResponse>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize response: {}", e);
                continue;
            }
        };
        json.push('\n');

        if let Err(e) = writer.write_all(json.as_bytes()).await {
            error!("Failed to write response: {}", e);
            return;
        }
        if let Err(e) = writer.flush().await {
            error!("Failed to flush response: {}", e);
            return;
        }
    }
}
