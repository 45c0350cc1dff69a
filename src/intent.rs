//! Canonical intent events passed through the dispatch pipeline.

use crate::entities::EntityValue;
use bytes::Bytes;
use serde::Serialize;

/// Recognizer that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    Speech,
    Gesture,
    /// Already fused by the interaction manager.
    Fusion,
}

impl IntentSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Speech => "speech",
            Self::Gesture => "gesture",
            Self::Fusion => "fusion",
        }
    }
}

/// One named entity extracted by a recognizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub name: String,
    pub value: EntityValue,
    /// Text exactly as the recognizer supplied it.
    pub raw_text: String,
}

impl Entity {
    /// Build an entity, typing the value from its name where possible.
    #[must_use]
    pub fn new(name: impl Into<String>, raw_text: impl Into<String>) -> Self {
        let name = name.into();
        let raw_text = raw_text.into();
        let value = EntityValue::from_named(&name, &raw_text);
        Self {
            name,
            value,
            raw_text,
        }
    }
}

/// A recognizer event mapped into the canonical intent space.
///
/// `intent` is never empty: events that cannot be mapped are rejected by the
/// normalizer before an `IntentEvent` exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentEvent {
    pub intent: String,
    /// Clamped to `[0, 1]`.
    pub confidence: f32,
    /// Ordered; duplicate names allowed.
    pub entities: Vec<Entity>,
    pub source: IntentSource,
    /// Recognized utterance, when the recognizer supplied one.
    pub utterance: Option<String>,
    /// Original wire text, kept for diagnostics.
    #[serde(skip)]
    pub raw_payload: Bytes,
}

impl IntentEvent {
    #[must_use]
    pub fn new(intent: impl Into<String>, confidence: f32, source: IntentSource) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            intent: intent.into(),
            confidence,
            entities: Vec::new(),
            source,
            utterance: None,
            raw_payload: Bytes::new(),
        }
    }

    #[must_use]
    pub fn with_entity(mut self, name: impl Into<String>, raw_text: impl Into<String>) -> Self {
        self.entities.push(Entity::new(name, raw_text));
        self
    }

    #[must_use]
    pub fn with_utterance(mut self, utterance: impl Into<String>) -> Self {
        self.utterance = Some(utterance.into());
        self
    }

    #[must_use]
    pub fn with_raw_payload(mut self, raw: impl Into<Bytes>) -> Self {
        self.raw_payload = raw.into();
        self
    }

    /// First entity with the given name.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }
}
