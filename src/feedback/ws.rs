use super::FeedbackTransport;
use async_trait::async_trait;
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connection to the speech synthesis peer.
///
/// Connects lazily; a failed send drops the connection so the next message
/// reconnects.
pub struct WebSocketTransport {
    url: String,
    socket: Mutex<Option<Socket>>,
}

impl WebSocketTransport {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            socket: Mutex::new(None),
        }
    }
}

#[async_trait]
impl FeedbackTransport for WebSocketTransport {
    async fn deliver(&self, payload: &str) -> anyhow::Result<()> {
        let mut guard = self.socket.lock().await;
        if guard.is_none() {
            let (stream, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
            tracing::debug!(url = %self.url, "connected to speech output");
            *guard = Some(stream);
        }
        let Some(socket) = guard.as_mut() else {
            anyhow::bail!("speech output socket unavailable");
        };
        if let Err(err) = socket.send(Message::Text(payload.to_owned())).await {
            *guard = None;
            return Err(err.into());
        }
        Ok(())
    }
}
