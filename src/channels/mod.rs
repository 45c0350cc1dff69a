//! Inbound recognizer channels and the runtime that drives the dispatcher.
//!
//! Each channel (speech, gesture) owns one queue drained by one consumer, so
//! events from the same channel are dispatched in arrival order. WebSocket
//! adapters restart with exponential backoff; the optional HTTP gateway feeds
//! the same queues.

pub mod gateway;
pub mod mmi_ws;
pub mod traits;

use crate::config::DispatchConfig;
use crate::dispatcher::Dispatcher;
use crate::feedback::FeedbackKind;
use crate::idle::IdleMonitor;
use gateway::{GatewayQueues, run_gateway};
use mmi_ws::MmiWebSocketAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use traits::{ChannelAdapter, ChannelKind, ConnectionFlag, InboundMessage};

/// Configuration validation issue for channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelValidationSeverity {
    Warning,
    Error,
}

/// Validation issue surfaced at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelValidationIssue {
    pub id: String,
    pub title: String,
    pub severity: ChannelValidationSeverity,
    pub summary: String,
}

impl ChannelValidationIssue {
    fn error(id: impl Into<String>, title: &str, summary: String) -> Self {
        Self {
            id: id.into(),
            title: title.to_owned(),
            severity: ChannelValidationSeverity::Error,
            summary,
        }
    }

    fn warning(id: impl Into<String>, title: &str, summary: String) -> Self {
        Self {
            id: id.into(),
            title: title.to_owned(),
            severity: ChannelValidationSeverity::Warning,
            summary,
        }
    }
}

fn configured_adapters(config: &DispatchConfig) -> Vec<Arc<dyn ChannelAdapter>> {
    let mut adapters: Vec<Arc<dyn ChannelAdapter>> = Vec::new();
    for (kind, url) in [
        (ChannelKind::Speech, &config.channels.speech_url),
        (ChannelKind::Gesture, &config.channels.gesture_url),
    ] {
        if let Some(url) = url.as_deref().map(str::trim)
            && !url.is_empty()
        {
            adapters.push(Arc::new(MmiWebSocketAdapter::new(kind, url)));
        }
    }
    adapters
}

fn check_ws_url(issues: &mut Vec<ChannelValidationIssue>, id: &str, label: &str, raw: &str) {
    match url::Url::parse(raw.trim()) {
        Ok(parsed) if parsed.scheme() == "ws" => {}
        Ok(parsed) if parsed.scheme() == "wss" => issues.push(ChannelValidationIssue::error(
            format!("{id}-tls-unsupported"),
            "Secure WebSocket not supported",
            format!("{label} `{raw}` uses wss://; this build only connects over ws://."),
        )),
        Ok(parsed) => issues.push(ChannelValidationIssue::error(
            format!("{id}-bad-scheme"),
            "Unsupported URL scheme",
            format!(
                "{label} `{raw}` uses `{}`; expected ws://.",
                parsed.scheme()
            ),
        )),
        Err(e) => issues.push(ChannelValidationIssue::error(
            format!("{id}-invalid-url"),
            "Invalid URL",
            format!("{label} `{raw}` is not a valid URL: {e}"),
        )),
    }
}

/// Validate channel configuration without network calls.
#[must_use]
pub fn validate_config(config: &DispatchConfig) -> Vec<ChannelValidationIssue> {
    let mut issues = Vec::new();

    if let Err(err) = config.validate() {
        issues.push(ChannelValidationIssue::error(
            "config-invalid",
            "Configuration invalid",
            err.to_string(),
        ));
    }

    let speech = config.channels.speech_url.as_deref().map(str::trim);
    let gesture = config.channels.gesture_url.as_deref().map(str::trim);
    let speech = speech.filter(|s| !s.is_empty());
    let gesture = gesture.filter(|s| !s.is_empty());

    if speech.is_none() && gesture.is_none() && !config.channels.gateway.enabled {
        issues.push(ChannelValidationIssue::error(
            "channels-none-configured",
            "No inbound channels",
            "Configure a speech or gesture URL, or enable the HTTP gateway.".to_owned(),
        ));
    }
    if let Some(url) = speech {
        check_ws_url(&mut issues, "speech-url", "Speech channel URL", url);
    }
    if let Some(url) = gesture {
        check_ws_url(&mut issues, "gesture-url", "Gesture channel URL", url);
    }
    if speech.is_some() && speech == gesture {
        issues.push(ChannelValidationIssue::warning(
            "channels-shared-url",
            "Speech and gesture share a URL",
            "Both channels open their own connection to the same endpoint; every message will be received twice.".to_owned(),
        ));
    }

    if config.feedback.enabled {
        check_ws_url(
            &mut issues,
            "feedback-url",
            "Feedback URL",
            &config.feedback.url,
        );
    }

    if config.channels.gateway.enabled {
        let host = config.channels.gateway.host.trim();
        let bearer_missing = config
            .channels
            .gateway
            .bearer_token
            .as_ref()
            .is_none_or(|token| token.trim().is_empty());
        if host == "0.0.0.0" && bearer_missing {
            issues.push(ChannelValidationIssue::warning(
                "gateway-public-without-auth",
                "Gateway is public without bearer auth",
                "Binding to 0.0.0.0 without a bearer token lets anyone inject intents.".to_owned(),
            ));
        }
    }

    issues
}

/// Best-effort health checks for configured adapters.
pub async fn check_health(config: &DispatchConfig) -> HashMap<String, bool> {
    let mut health = HashMap::new();
    for adapter in configured_adapters(config) {
        let id = adapter.id().to_owned();
        match adapter.health_check().await {
            Ok(ok) => {
                health.insert(id, ok);
            }
            Err(err) => {
                tracing::warn!("channel health check failed for {id}: {err}");
                health.insert(id, false);
            }
        }
    }
    health
}

/// Drain one channel queue through the dispatcher, strictly in order.
async fn consume(
    kind: ChannelKind,
    mut inbound_rx: mpsc::Receiver<InboundMessage>,
    dispatcher: Dispatcher,
) {
    while let Some(message) = inbound_rx.recv().await {
        let outcome = dispatcher.handle_raw(&message.raw).await;
        tracing::debug!(
            channel = kind.as_str(),
            received_at = %message.received_at,
            ?outcome,
            "inbound message handled"
        );
    }
    tracing::debug!(channel = kind.as_str(), "channel queue closed");
}

/// Reconnect delay: doubles per failed attempt, back to the start after any
/// attempt that connected.
#[derive(Debug)]
struct Backoff {
    next_secs: u64,
}

impl Backoff {
    const INITIAL_SECS: u64 = 2;
    const MAX_SECS: u64 = 60;

    fn new() -> Self {
        Self {
            next_secs: Self::INITIAL_SECS,
        }
    }

    fn after_attempt(&mut self, connected: bool) -> Duration {
        if connected {
            self.next_secs = Self::INITIAL_SECS;
        }
        let delay = self.next_secs;
        self.next_secs = delay.saturating_mul(2).min(Self::MAX_SECS);
        Duration::from_secs(delay)
    }
}

async fn supervise(adapter: Arc<dyn ChannelAdapter>, tx: mpsc::Sender<InboundMessage>) {
    let connection = ConnectionFlag::default();
    let mut backoff = Backoff::new();
    loop {
        let result = adapter.run(tx.clone(), &connection).await;
        let delay = backoff.after_attempt(connection.take());
        match result {
            Ok(()) if tx.is_closed() => return,
            Ok(()) => {
                tracing::warn!("channel {} stopped; restarting", adapter.id());
            }
            Err(err) => {
                tracing::warn!(
                    "channel {} failed: {err}; retrying in {}s",
                    adapter.id(),
                    delay.as_secs()
                );
            }
        }
        tokio::time::sleep(delay).await;
    }
}

/// Cancel `cancel` once `interrupt` resolves. A handler that could not be
/// installed is logged and leaves the runtime running.
pub async fn cancel_on_interrupt<F>(interrupt: F, cancel: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    match interrupt.await {
        Ok(()) => {
            tracing::info!("interrupt received; shutting down");
            cancel.cancel();
        }
        Err(err) => {
            tracing::error!("failed to install interrupt handler: {err}");
        }
    }
}

/// Run channels, greeting and idle monitor until `cancel` fires.
///
/// # Errors
///
/// Fails when the configuration has blocking validation errors.
pub async fn run_runtime(
    config: DispatchConfig,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let validation = validate_config(&config);
    let has_error = validation
        .iter()
        .any(|issue| issue.severity == ChannelValidationSeverity::Error);
    for issue in validation {
        let message = format!("{}: {}", issue.title, issue.summary);
        match issue.severity {
            ChannelValidationSeverity::Warning => tracing::warn!(id = %issue.id, "{message}"),
            ChannelValidationSeverity::Error => tracing::error!(id = %issue.id, "{message}"),
        }
    }
    if has_error {
        anyhow::bail!("channel configuration has blocking errors");
    }

    let queue_size = config.channels.inbound_queue_size.max(8);
    let (speech_tx, speech_rx) = mpsc::channel::<InboundMessage>(queue_size);
    let (gesture_tx, gesture_rx) = mpsc::channel::<InboundMessage>(queue_size);

    let mut workers = JoinSet::new();
    workers.spawn(consume(ChannelKind::Speech, speech_rx, dispatcher.clone()));
    workers.spawn(consume(ChannelKind::Gesture, gesture_rx, dispatcher.clone()));

    let adapters = configured_adapters(&config);
    let active: Vec<&str> = adapters.iter().map(|a| a.id()).collect();
    tracing::info!(
        gateway = config.channels.gateway.enabled,
        "channels runtime started with [{}]",
        active.join(", ")
    );
    for adapter in &adapters {
        let tx = match adapter.kind() {
            ChannelKind::Speech => speech_tx.clone(),
            ChannelKind::Gesture => gesture_tx.clone(),
        };
        workers.spawn(supervise(Arc::clone(adapter), tx));
    }

    if config.channels.gateway.enabled {
        let gateway_cfg = config.channels.gateway.clone();
        let queues = GatewayQueues {
            speech: speech_tx.clone(),
            gesture: gesture_tx.clone(),
        };
        let gateway_cancel = cancel.clone();
        workers.spawn(async move {
            if let Err(err) = run_gateway(gateway_cfg, queues, gateway_cancel).await {
                tracing::error!("envelope gateway stopped: {err}");
            }
        });
    }
    drop(speech_tx);
    drop(gesture_tx);

    if config.idle.enabled {
        let monitor = IdleMonitor::new(
            &config.idle,
            dispatcher.activity(),
            dispatcher.feedback().clone(),
        );
        workers.spawn(monitor.run(cancel.clone()));
    }

    dispatcher
        .feedback()
        .speak(FeedbackKind::Greeting, config.feedback.greeting.as_str());

    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::info!("channels runtime stopping");
        }
        _ = async { while workers.join_next().await.is_some() {} } => {
            tracing::info!("all channel workers finished");
        }
    }
    workers.shutdown().await;
    Ok(())
}
