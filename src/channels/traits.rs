use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Inbound recognizer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Speech,
    Gesture,
}

impl ChannelKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Speech => "speech",
            Self::Gesture => "gesture",
        }
    }
}

/// Raw message received from a recognizer channel.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub channel: ChannelKind,
    pub raw: String,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    #[must_use]
    pub fn new(channel: ChannelKind, raw: impl Into<String>) -> Self {
        Self {
            channel,
            raw: raw.into(),
            received_at: Utc::now(),
        }
    }
}

/// Set by an adapter once its transport is up. The supervisor reads and
/// clears it after every run to decide whether to reset its backoff.
#[derive(Debug, Default)]
pub struct ConnectionFlag(AtomicBool);

impl ConnectionFlag {
    pub fn mark_connected(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the last run connected; clears the flag.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Channel adapter contract. New transports only need to implement this trait.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Stable identifier used in logs.
    fn id(&self) -> &str;

    /// Channel whose queue this adapter feeds.
    fn kind(&self) -> ChannelKind;

    /// Receive messages and forward them in arrival order until the transport closes.
    /// Marks `connection` as soon as the transport is established.
    async fn run(
        &self,
        inbound_tx: mpsc::Sender<InboundMessage>,
        connection: &ConnectionFlag,
    ) -> anyhow::Result<()>;

    /// Best-effort health probe.
    async fn health_check(&self) -> anyhow::Result<bool>;
}
