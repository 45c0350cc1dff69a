use crate::channels::traits::{ChannelAdapter, ChannelKind, ConnectionFlag, InboundMessage};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Listens to the interaction manager's WebSocket for one recognizer channel.
pub struct MmiWebSocketAdapter {
    id: String,
    kind: ChannelKind,
    url: String,
}

impl MmiWebSocketAdapter {
    #[must_use]
    pub fn new(kind: ChannelKind, url: impl Into<String>) -> Self {
        Self {
            id: format!("mmi-{}", kind.as_str()),
            kind,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ChannelAdapter for MmiWebSocketAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn run(
        &self,
        inbound_tx: mpsc::Sender<InboundMessage>,
        connection: &ConnectionFlag,
    ) -> anyhow::Result<()> {
        let (stream, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        connection.mark_connected();
        tracing::info!(channel = %self.id, url = %self.url, "connected to interaction manager");
        let (mut write, mut read) = stream.split();

        loop {
            let raw = match read.next().await {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        tracing::warn!(channel = %self.id, "dropping non UTF-8 binary frame");
                        continue;
                    }
                },
                Some(Ok(Message::Ping(payload))) => {
                    write.send(Message::Pong(payload)).await?;
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => {
                    anyhow::bail!("interaction manager closed the {} channel", self.kind.as_str());
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(err.into()),
            };

            if inbound_tx
                .send(InboundMessage::new(self.kind, raw))
                .await
                .is_err()
            {
                tracing::info!(channel = %self.id, "inbound queue closed; stopping adapter");
                return Ok(());
            }
        }
    }

    async fn health_check(&self) -> anyhow::Result<bool> {
        let (mut stream, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        let _ = stream.close(None).await;
        Ok(true)
    }
}
