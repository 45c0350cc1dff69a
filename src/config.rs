//! Configuration types for the dispatch engine.
//!
//! Read once at startup; nothing here is re-read while dispatching.

use crate::registry::ConfirmPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Confidence band thresholds.
    pub confidence: ConfidenceConfig,
    /// Confirmation timeout, vocabulary and per-intent policy overrides.
    pub confirmation: ConfirmationConfig,
    /// Spoken feedback delivery.
    pub feedback: FeedbackConfig,
    /// Inbound recognizer channels.
    pub channels: ChannelsConfig,
    /// Session id resolution.
    pub session: SessionConfig,
    /// Idle prompt settings.
    pub idle: IdleConfig,
    /// External automation bridge settings.
    pub automation: AutomationConfig,
}

/// Thresholds splitting confidence into HIGH / MEDIUM / LOW bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// At or above: execute immediately.
    pub high: f32,
    /// At or above (and below `high`): confirm.
    pub medium: f32,
    /// At or above (and below `medium`): confirm, flagged lower-certainty.
    /// Below: discard silently.
    pub low: f32,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            high: 0.80,
            medium: 0.60,
            low: 0.45,
        }
    }
}

/// Confirmation state machine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// How long a pending confirmation waits for a follow-up, in milliseconds.
    pub timeout_ms: u64,
    /// Canonical intents treated as "yes".
    pub affirm_intents: Vec<String>,
    /// Canonical intents treated as "no".
    pub deny_intents: Vec<String>,
    /// Per-intent policy overrides applied on top of registration defaults.
    pub overrides: BTreeMap<String, ConfirmPolicy>,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            affirm_intents: vec!["affirm".to_owned()],
            deny_intents: vec!["deny".to_owned()],
            overrides: BTreeMap::new(),
        }
    }
}

impl ConfirmationConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Wire shape of outbound feedback messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackFormat {
    /// `{"text": ..., "language": ...}`
    #[default]
    Json,
    /// MMI `startRequest` envelope carrying an SSML document.
    Mmi,
}

/// Spoken feedback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Whether feedback is delivered at all.
    pub enabled: bool,
    /// Locale tag attached to every message.
    pub language: String,
    /// WebSocket URL of the speech synthesis peer.
    pub url: String,
    /// Outbound message shape.
    pub format: FeedbackFormat,
    /// Bounded queue between the dispatcher and the delivery worker.
    pub queue_size: usize,
    /// Spoken once when the runtime starts (empty = none).
    pub greeting: String,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "pt-PT".to_owned(),
            url: "ws://127.0.0.1:8083".to_owned(),
            format: FeedbackFormat::Json,
            queue_size: 32,
            greeting: "Boas! Eu sou a Assistente de Google Maps. Como te posso ajudar?".to_owned(),
        }
    }
}

/// Inbound recognizer channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// WebSocket URL delivering speech NLU envelopes (None = disabled).
    pub speech_url: Option<String>,
    /// WebSocket URL delivering gesture envelopes (None = disabled).
    pub gesture_url: Option<String>,
    /// Per-channel inbound queue capacity.
    pub inbound_queue_size: usize,
    /// Optional HTTP ingress.
    pub gateway: GatewayConfig,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            speech_url: Some("ws://127.0.0.1:8005/IM/USER1/APP".to_owned()),
            gesture_url: None,
            inbound_queue_size: 64,
            gateway: GatewayConfig::default(),
        }
    }
}

/// HTTP gateway accepting raw envelopes by POST.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Required `Authorization: Bearer` token (None = open).
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_owned(),
            port: 8090,
            bearer_token: None,
        }
    }
}

/// Where the session id of an inbound event comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionIdSource {
    /// Every event belongs to `default_id`.
    #[default]
    Fixed,
    /// Use the MMI `Context` attribute, falling back to `default_id`.
    MmiContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub id_source: SessionIdSource,
    pub default_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id_source: SessionIdSource::Fixed,
            default_id: "default".to_owned(),
        }
    }
}

/// Idle prompt settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    pub enabled: bool,
    /// Inactivity before the first prompt, in seconds.
    pub threshold_secs: u64,
    /// How often inactivity is checked, in seconds.
    pub check_interval_secs: u64,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_secs: 120,
            check_interval_secs: 10,
        }
    }
}

/// External automation process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Maximum wait for one capability reply, in milliseconds.
    pub timeout_ms: u64,
    /// Capacity of the request queue towards the automation process.
    pub queue_size: usize,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            queue_size: 16,
        }
    }
}

impl AutomationConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl DispatchConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::DispatchError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::DispatchError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/mmi-dispatch/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config)
                .join("mmi-dispatch")
                .join("config.toml")
        } else if let Some(config) = dirs::config_dir() {
            config.join("mmi-dispatch").join("config.toml")
        } else {
            PathBuf::from("/tmp/mmi-dispatch/config.toml")
        }
    }

    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DispatchError::Config`] naming the first violation.
    pub fn validate(&self) -> crate::error::Result<()> {
        let ConfidenceConfig { high, medium, low } = self.confidence;
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !(in_unit(high) && in_unit(medium) && in_unit(low)) {
            return Err(crate::error::DispatchError::Config(format!(
                "confidence thresholds must lie in [0, 1] (high={high}, medium={medium}, low={low})"
            )));
        }
        if !(low <= medium && medium <= high) {
            return Err(crate::error::DispatchError::Config(format!(
                "confidence thresholds must satisfy low <= medium <= high (high={high}, medium={medium}, low={low})"
            )));
        }
        if self.confirmation.timeout_ms == 0 {
            return Err(crate::error::DispatchError::Config(
                "confirmation.timeout_ms must be positive".to_owned(),
            ));
        }
        let has_word = |list: &[String]| list.iter().any(|s| !s.trim().is_empty());
        if !has_word(&self.confirmation.affirm_intents)
            || !has_word(&self.confirmation.deny_intents)
        {
            return Err(crate::error::DispatchError::Config(
                "confirmation vocabularies must each name at least one intent".to_owned(),
            ));
        }
        if let Some(word) = self
            .confirmation
            .affirm_intents
            .iter()
            .find(|w| self.confirmation.deny_intents.contains(w))
        {
            return Err(crate::error::DispatchError::Config(format!(
                "`{word}` is both an affirmative and a negative intent"
            )));
        }
        if self.feedback.language.trim().is_empty() {
            return Err(crate::error::DispatchError::Config(
                "feedback.language must not be empty".to_owned(),
            ));
        }
        if self.session.default_id.trim().is_empty() {
            return Err(crate::error::DispatchError::Config(
                "session.default_id must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}
