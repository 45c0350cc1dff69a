//! Capability registry: canonical intent name to the one handler serving it.
//!
//! Built once through [`RegistryBuilder`] and frozen into an immutable
//! [`CapabilityRegistry`] before any event is dispatched.

use crate::error::{DispatchError, Result};
use crate::intent::Entity;
use crate::normalizer;
use crate::session::{ContextHandle, ContextRequirement};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Result of a capability invocation as reported by the capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityOutcome {
    pub success: bool,
    /// Spoken to the user when non-empty.
    pub message: String,
}

impl CapabilityOutcome {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Errors a capability may raise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("no active context: {0}")]
    NoActiveContext(ContextRequirement),
    #[error("{0}")]
    Failed(String),
}

impl From<CapabilityError> for DispatchError {
    fn from(err: CapabilityError) -> Self {
        match err {
            CapabilityError::NoActiveContext(req) => {
                DispatchError::NoActiveContext(req.to_string())
            }
            CapabilityError::Failed(msg) => DispatchError::CapabilityFailure(msg),
        }
    }
}

/// Effect-performing unit registered against one canonical intent.
///
/// Capabilities never see the wire message, only normalized entities and a
/// staged view of the session context.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn execute(
        &self,
        entities: &[Entity],
        context: &mut ContextHandle,
    ) -> std::result::Result<CapabilityOutcome, CapabilityError>;
}

/// How the confirmation gate treats an intent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmPolicy {
    /// Confidence bands decide.
    #[default]
    Thresholds,
    /// Always ask, even at high confidence.
    Always,
    /// Execute in the medium band without asking.
    Direct,
}

impl fmt::Display for ConfirmPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Thresholds => "thresholds",
            Self::Always => "always",
            Self::Direct => "direct",
        })
    }
}

/// One registry entry.
#[derive(Clone)]
pub struct CapabilityRegistration {
    pub intent: String,
    pub handler: Arc<dyn Capability>,
    pub policy: ConfirmPolicy,
    /// Per-intent HIGH threshold; `None` uses the global one.
    pub min_confidence: Option<f32>,
    pub requires_context: Option<ContextRequirement>,
}

impl CapabilityRegistration {
    #[must_use]
    pub fn new(intent: impl Into<String>, handler: Arc<dyn Capability>) -> Self {
        Self {
            intent: intent.into(),
            handler,
            policy: ConfirmPolicy::Thresholds,
            min_confidence: None,
            requires_context: None,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ConfirmPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = Some(min_confidence);
        self
    }

    #[must_use]
    pub fn with_requirement(mut self, requirement: ContextRequirement) -> Self {
        self.requires_context = Some(requirement);
        self
    }

    #[must_use]
    pub fn requires_confirmation(&self) -> bool {
        self.policy == ConfirmPolicy::Always
    }
}

impl fmt::Debug for CapabilityRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistration")
            .field("intent", &self.intent)
            .field("policy", &self.policy)
            .field("min_confidence", &self.min_confidence)
            .field("requires_context", &self.requires_context)
            .finish_non_exhaustive()
    }
}

/// Mutable registry used during startup only.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: HashMap<String, CapabilityRegistration>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registration.
    ///
    /// # Errors
    ///
    /// [`DispatchError::DuplicateRegistration`] if the intent is already
    /// registered, [`DispatchError::Config`] for an empty intent name or an
    /// out-of-range `min_confidence`.
    pub fn register(&mut self, registration: CapabilityRegistration) -> Result<&mut Self> {
        let intent = registration.intent.trim();
        if intent.is_empty() {
            return Err(DispatchError::Config(
                "capability registered with an empty intent name".to_owned(),
            ));
        }
        if let Some(min) = registration.min_confidence
            && !(0.0..=1.0).contains(&min)
        {
            return Err(DispatchError::Config(format!(
                "min_confidence {min} for `{intent}` is outside [0, 1]"
            )));
        }
        if self.entries.contains_key(intent) {
            return Err(DispatchError::DuplicateRegistration(intent.to_owned()));
        }
        let intent = intent.to_owned();
        self.entries.insert(
            intent.clone(),
            CapabilityRegistration {
                intent,
                ..registration
            },
        );
        Ok(self)
    }

    /// Apply per-intent policy overrides from configuration.
    ///
    /// Returns the override keys that name no registered intent.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, ConfirmPolicy>) -> Vec<String> {
        let mut unknown = Vec::new();
        for (intent, policy) in overrides {
            match self.entries.get_mut(intent) {
                Some(entry) => {
                    tracing::debug!(
                        intent = %intent,
                        policy = %policy,
                        "confirmation policy override"
                    );
                    entry.policy = *policy;
                }
                None => unknown.push(intent.clone()),
            }
        }
        unknown
    }

    #[must_use]
    pub fn build(self) -> CapabilityRegistry {
        CapabilityRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable intent-to-capability table.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    entries: HashMap<String, CapabilityRegistration>,
}

impl CapabilityRegistry {
    /// # Errors
    ///
    /// [`DispatchError::UnknownIntent`] when nothing serves `intent`.
    pub fn lookup(&self, intent: &str) -> Result<&CapabilityRegistration> {
        self.entries
            .get(intent)
            .ok_or_else(|| DispatchError::UnknownIntent(intent.to_owned()))
    }

    #[must_use]
    pub fn contains(&self, intent: &str) -> bool {
        self.entries.contains_key(intent)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered intents, sorted.
    #[must_use]
    pub fn intents(&self) -> Vec<&str> {
        let mut intents: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        intents.sort_unstable();
        intents
    }

    /// Every gesture command intent must have a capability.
    ///
    /// # Errors
    ///
    /// [`DispatchError::MissingCapability`] naming the first uncovered intent.
    pub fn check_gesture_coverage(&self) -> Result<()> {
        for intent in normalizer::gesture_command_intents() {
            if !self.contains(intent) {
                return Err(DispatchError::MissingCapability(intent.to_owned()));
            }
        }
        Ok(())
    }
}
