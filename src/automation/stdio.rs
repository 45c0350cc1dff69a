//! Stdin/stdout JSON bridge to the automation process.
//!
//! Writes one [`AutomationRequest`](super::AutomationRequest) per line to
//! stdout and reads [`AutomationReply`] lines from stdin, matching them by id.
//! Stdout is reserved for the protocol; diagnostics go to stderr.

use super::{AutomationReply, PendingAutomation};
use crate::error::{DispatchError, Result};
use std::collections::HashMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};

/// Serve automation requests over this process's stdin/stdout.
pub async fn run_stdio_automation(requests: mpsc::Receiver<PendingAutomation>) -> Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();
    serve(requests, reader, writer).await
}

/// Serve requests over any line-oriented duplex.
///
/// Returns when the request channel closes or the reader reaches EOF.
/// Callers still waiting on a reply see their reply channel close.
pub async fn serve<R, W>(
    mut requests: mpsc::Receiver<PendingAutomation>,
    reader: R,
    mut writer: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut waiting: HashMap<String, oneshot::Sender<AutomationReply>> = HashMap::new();
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            request = requests.recv() => {
                let Some(pending) = request else {
                    tracing::info!("automation request channel closed; stopping bridge");
                    break;
                };
                let (request, respond_to) = pending.into_parts();
                let json = serde_json::to_string(&request).map_err(|e| {
                    DispatchError::Channel(format!("failed to serialize automation request: {e}"))
                })?;
                write_line(&mut writer, &json).await?;
                tracing::debug!(
                    id = %request.id,
                    intent = %request.intent,
                    "automation request sent"
                );
                waiting.insert(request.id, respond_to);
            }
            line = lines.next_line() => {
                let line = line.map_err(|e| {
                    DispatchError::Channel(format!("failed to read automation reply: {e}"))
                })?;
                let Some(line) = line else {
                    tracing::info!("automation process closed its output; stopping bridge");
                    break;
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str::<AutomationReply>(trimmed) {
                    Ok(reply) => match waiting.remove(&reply.id) {
                        Some(respond_to) => {
                            let _ = respond_to.send(reply);
                        }
                        None => tracing::warn!(
                            id = %reply.id,
                            "automation reply for unknown or expired request"
                        ),
                    },
                    Err(e) => tracing::warn!(
                        error = %e,
                        raw_line = %trimmed,
                        "failed to parse automation reply"
                    ),
                }
            }
        }
        // Callers that timed out have dropped their receivers.
        waiting.retain(|_, respond_to| !respond_to.is_closed());
    }

    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> Result<()> {
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| DispatchError::Channel(format!("failed to write automation request: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| DispatchError::Channel(format!("failed to write newline: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| DispatchError::Channel(format!("failed to flush automation output: {e}")))?;
    Ok(())
}
