use crate::channels::traits::{ChannelKind, InboundMessage};
use crate::config::GatewayConfig;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Queues the gateway forwards posted envelopes into.
#[derive(Clone)]
pub struct GatewayQueues {
    pub speech: mpsc::Sender<InboundMessage>,
    pub gesture: mpsc::Sender<InboundMessage>,
}

#[derive(Clone)]
struct GatewayState {
    queues: GatewayQueues,
    bearer_token: Option<String>,
}

/// Bind the configured address and serve until `cancel` fires.
pub async fn run_gateway(
    config: GatewayConfig,
    queues: GatewayQueues,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    serve_gateway(listener, config.bearer_token, queues, cancel).await
}

/// Serve the gateway routes on an already-bound listener.
pub async fn serve_gateway(
    listener: TcpListener,
    bearer_token: Option<String>,
    queues: GatewayQueues,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    let bearer_token = bearer_token
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty());
    let state = GatewayState {
        queues,
        bearer_token,
    };

    let app = Router::new()
        .route("/health", get(gateway_health))
        .route("/mmi/speech", post(speech_inbound))
        .route("/mmi/gesture", post(gesture_inbound))
        .with_state(state);

    tracing::info!("envelope gateway listening on http://{local_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;
    Ok(())
}

async fn gateway_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

fn bearer_is_valid(headers: &HeaderMap, expected: &Option<String>) -> bool {
    let Some(expected_token) = expected else {
        return true;
    };
    let header_value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let candidate = header_value
        .strip_prefix("Bearer ")
        .unwrap_or_default()
        .trim();
    !expected_token.is_empty() && candidate == expected_token
}

async fn speech_inbound(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    enqueue(&state, &headers, ChannelKind::Speech, body).await
}

async fn gesture_inbound(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    enqueue(&state, &headers, ChannelKind::Gesture, body).await
}

async fn enqueue(
    state: &GatewayState,
    headers: &HeaderMap,
    kind: ChannelKind,
    body: String,
) -> (StatusCode, Json<serde_json::Value>) {
    if !bearer_is_valid(headers, &state.bearer_token) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "unauthorized"})),
        );
    }
    if body.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "envelope body is required"})),
        );
    }

    let queue = match kind {
        ChannelKind::Speech => &state.queues.speech,
        ChannelKind::Gesture => &state.queues.gesture,
    };
    if queue.send(InboundMessage::new(kind, body)).await.is_err() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "dispatcher unavailable"})),
        );
    }

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "queued": true,
            "channel": kind.as_str(),
        })),
    )
}
