//! Best-effort spoken feedback.
//!
//! The dispatcher enqueues text without waiting; a worker task encodes each
//! message and hands it to a [`FeedbackTransport`]. Delivery failures are
//! logged and dropped.

pub mod messages;
mod ws;

pub use ws::WebSocketTransport;

use crate::config::{FeedbackConfig, FeedbackFormat};
use crate::protocol::outbound;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Why a message is being spoken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Greeting,
    /// Capability reported success.
    Success,
    /// Confirmation question.
    Prompt,
    /// Capability failure or missing context.
    Failure,
    /// Neutral reply (cancelled, nothing to confirm).
    Notice,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackMessage {
    pub kind: FeedbackKind,
    pub text: String,
}

/// Delivers encoded feedback to the audio-output peer.
#[async_trait]
pub trait FeedbackTransport: Send + Sync {
    async fn deliver(&self, payload: &str) -> anyhow::Result<()>;
}

/// Cheap handle for enqueueing feedback. Never blocks.
#[derive(Debug, Clone)]
pub struct FeedbackEmitter {
    tx: Option<mpsc::Sender<FeedbackMessage>>,
}

impl FeedbackEmitter {
    /// Emitter plus the receiving end of its queue.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<FeedbackMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// Emitter that discards everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn speak(&self, kind: FeedbackKind, text: impl Into<String>) {
        let Some(tx) = &self.tx else {
            return;
        };
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        match tx.try_send(FeedbackMessage { kind, text }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(message)) => {
                tracing::warn!(kind = ?message.kind, "feedback queue full; dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("feedback worker stopped; dropping message");
            }
        }
    }
}

/// Spawn the delivery worker. It ends when every emitter is dropped.
pub fn spawn_worker(
    mut rx: mpsc::Receiver<FeedbackMessage>,
    transport: Arc<dyn FeedbackTransport>,
    format: FeedbackFormat,
    language: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let payload = outbound::encode(format, &message.text, &language);
            match transport.deliver(&payload).await {
                Ok(()) => tracing::debug!(
                    kind = ?message.kind,
                    text = %message.text,
                    "feedback delivered"
                ),
                Err(err) => tracing::warn!(kind = ?message.kind, "feedback delivery failed: {err}"),
            }
        }
        tracing::debug!("feedback worker stopped");
    })
}

/// Build the emitter and, when enabled, the WebSocket delivery worker.
#[must_use]
pub fn start(config: &FeedbackConfig) -> (FeedbackEmitter, Option<JoinHandle<()>>) {
    if !config.enabled {
        return (FeedbackEmitter::disabled(), None);
    }
    let (emitter, rx) = FeedbackEmitter::channel(config.queue_size);
    let transport: Arc<dyn FeedbackTransport> = Arc::new(WebSocketTransport::new(&config.url));
    let worker = spawn_worker(rx, transport, config.format, config.language.clone());
    (emitter, Some(worker))
}
