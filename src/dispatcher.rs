//! Dispatcher: receive, normalize, gate, invoke, speak.
//!
//! Owns every session's pending confirmation and context. Capability
//! invocation for one session runs under that session's execution lock, so at
//! most one invocation per session is in flight; sessions are independent.

use crate::config::{ConfidenceConfig, DispatchConfig, SessionConfig, SessionIdSource};
use crate::confirmation::{self, Band, GateDecision, PendingConfirmation, SessionGate};
use crate::error::DispatchError;
use crate::feedback::{FeedbackEmitter, FeedbackKind, messages};
use crate::intent::IntentEvent;
use crate::normalizer;
use crate::protocol::{self, ControlFrame, Envelope};
use crate::registry::{CapabilityError, CapabilityRegistration, CapabilityRegistry};
use crate::session::{ContextHandle, ContextRequirement, SessionStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Why an inbound message never became a dispatchable event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MalformedEnvelope,
    UnmappedGesture,
    /// Empty or unregistered intent name.
    UnknownIntent,
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Transport control frame.
    Ignored(ControlFrame),
    Dropped(DropReason),
    /// Below the LOW threshold.
    Discarded { intent: String },
    AwaitingConfirmation {
        intent: String,
        lower_certainty: bool,
    },
    Executed { intent: String, confirmed: bool },
    /// Capability ran and failed; context unchanged.
    Failed { intent: String },
    NoActiveContext {
        intent: String,
        requirement: ContextRequirement,
    },
    /// Pending confirmation rejected.
    Cancelled { intent: String },
    /// Yes/no with nothing pending.
    NothingPending,
}

/// Confirmation answers recognised by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Affirm,
    Deny,
}

struct Inner {
    registry: Arc<CapabilityRegistry>,
    sessions: SessionStore,
    gates: Mutex<HashMap<String, SessionGate>>,
    feedback: FeedbackEmitter,
    thresholds: ConfidenceConfig,
    timeout: Duration,
    affirm_intents: Vec<String>,
    deny_intents: Vec<String>,
    session: SessionConfig,
    activity: watch::Sender<tokio::time::Instant>,
}

/// Shared handle to the dispatch pipeline. Cloning is cheap.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        config: &DispatchConfig,
        feedback: FeedbackEmitter,
    ) -> Self {
        let (activity, _) = watch::channel(tokio::time::Instant::now());
        let clean = |list: &[String]| -> Vec<String> {
            list.iter()
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            inner: Arc::new(Inner {
                registry,
                sessions: SessionStore::new(),
                gates: Mutex::new(HashMap::new()),
                feedback,
                thresholds: config.confidence,
                timeout: config.confirmation.timeout(),
                affirm_intents: clean(&config.confirmation.affirm_intents),
                deny_intents: clean(&config.confirmation.deny_intents),
                session: config.session.clone(),
                activity,
            }),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.inner.registry
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    #[must_use]
    pub fn feedback(&self) -> &FeedbackEmitter {
        &self.inner.feedback
    }

    /// Receives the time of the most recent accepted event.
    #[must_use]
    pub fn activity(&self) -> watch::Receiver<tokio::time::Instant> {
        self.inner.activity.subscribe()
    }

    /// Snapshot of a session's pending confirmation.
    #[must_use]
    pub fn pending(&self, session_id: &str) -> Option<PendingConfirmation> {
        let gates = self.inner.gates.lock().unwrap_or_else(|e| e.into_inner());
        gates.get(session_id).and_then(|g| g.pending().cloned())
    }

    /// Handle one raw message from a recognizer channel.
    pub async fn handle_raw(&self, raw: &str) -> DispatchOutcome {
        let record = match protocol::parse_envelope(raw) {
            Ok(Envelope::Control(frame)) => {
                tracing::trace!(?frame, "control frame");
                return DispatchOutcome::Ignored(frame);
            }
            Ok(Envelope::Record(record)) => record,
            Err(err) => {
                tracing::warn!("dropping inbound message: {err}");
                return DispatchOutcome::Dropped(DropReason::MalformedEnvelope);
            }
        };

        let session_id = self.resolve_session(record.context_id.as_deref());
        let source = record.source;
        let event = match normalizer::normalize(record) {
            Ok(event) => event,
            Err(DispatchError::UnmappedGesture(code)) => {
                tracing::warn!(
                    code = %code,
                    "gesture code is not in the gesture table; add a row to GESTURE_TABLE to handle it"
                );
                return DispatchOutcome::Dropped(DropReason::UnmappedGesture);
            }
            Err(err) => {
                tracing::warn!(source = source.as_str(), "dropping inbound event: {err}");
                return DispatchOutcome::Dropped(DropReason::UnknownIntent);
            }
        };
        self.dispatch(&session_id, event).await
    }

    /// Run an already-normalized event through the gate.
    pub async fn dispatch(&self, session_id: &str, event: IntentEvent) -> DispatchOutcome {
        self.inner.activity.send_replace(tokio::time::Instant::now());
        tracing::info!(
            session = %session_id,
            intent = %event.intent,
            confidence = event.confidence,
            source = event.source.as_str(),
            "intent received"
        );

        if let Some(answer) = self.answer_kind(&event.intent) {
            // A yes or no heard below LOW never settles a pending confirmation.
            if confirmation::classify(event.confidence, &self.inner.thresholds, None)
                == Band::BelowLow
            {
                tracing::debug!(
                    session = %session_id,
                    ?answer,
                    confidence = event.confidence,
                    "answer below LOW threshold; discarded"
                );
                return DispatchOutcome::Discarded {
                    intent: event.intent,
                };
            }
            return self.answer(session_id, answer).await;
        }

        let registration = match self.inner.registry.lookup(&event.intent) {
            Ok(registration) => registration.clone(),
            Err(err) => {
                tracing::error!(session = %session_id, "no capability for event: {err}");
                return DispatchOutcome::Dropped(DropReason::UnknownIntent);
            }
        };

        let lower_certainty = match confirmation::decide(
            event.confidence,
            &registration,
            &self.inner.thresholds,
        ) {
            GateDecision::Discard => {
                tracing::debug!(
                    intent = %event.intent,
                    confidence = event.confidence,
                    "below LOW threshold; discarded"
                );
                return DispatchOutcome::Discarded {
                    intent: event.intent,
                };
            }
            GateDecision::Execute => None,
            GateDecision::Confirm { lower_certainty } => Some(lower_certainty),
        };

        // Impossible commands are answered now instead of after a prompt.
        if let Some(requirement) = registration.requires_context
            && !self
                .inner
                .sessions
                .get(session_id)
                .await
                .satisfies(requirement)
        {
            self.cancel_pending(session_id, &event.intent);
            return self.report_no_context(&event.intent, requirement);
        }

        match lower_certainty {
            Some(lower_certainty) => self.await_confirmation(session_id, event, lower_certainty),
            None => {
                self.cancel_pending(session_id, &event.intent);
                self.execute(session_id, event, &registration, false).await
            }
        }
    }

    fn resolve_session(&self, context_id: Option<&str>) -> String {
        match (self.inner.session.id_source, context_id) {
            (SessionIdSource::MmiContext, Some(id)) => id.to_owned(),
            _ => self.inner.session.default_id.clone(),
        }
    }

    fn answer_kind(&self, intent: &str) -> Option<Answer> {
        if self.inner.affirm_intents.iter().any(|i| i == intent) {
            Some(Answer::Affirm)
        } else if self.inner.deny_intents.iter().any(|i| i == intent) {
            Some(Answer::Deny)
        } else {
            None
        }
    }

    async fn answer(&self, session_id: &str, answer: Answer) -> DispatchOutcome {
        let pending = {
            let mut gates = self.inner.gates.lock().unwrap_or_else(|e| e.into_inner());
            gates.get_mut(session_id).and_then(SessionGate::take)
        };

        let Some(pending) = pending else {
            tracing::debug!(session = %session_id, ?answer, "answer with nothing pending");
            let text = match answer {
                Answer::Affirm => messages::NOTHING_TO_CONFIRM,
                Answer::Deny => messages::NOTHING_TO_CANCEL,
            };
            self.inner.feedback.speak(FeedbackKind::Notice, text);
            return DispatchOutcome::NothingPending;
        };

        let intent = pending.event.intent.clone();
        match answer {
            Answer::Deny => {
                tracing::info!(session = %session_id, intent = %intent, "confirmation declined");
                self.inner
                    .feedback
                    .speak(FeedbackKind::Notice, messages::CANCELLED);
                DispatchOutcome::Cancelled { intent }
            }
            Answer::Affirm => {
                tracing::info!(session = %session_id, intent = %intent, "confirmation accepted");
                match self.inner.registry.lookup(&intent) {
                    Ok(registration) => {
                        let registration = registration.clone();
                        self.execute(session_id, pending.event, &registration, true)
                            .await
                    }
                    Err(err) => {
                        tracing::error!("confirmed intent lost its capability: {err}");
                        DispatchOutcome::Dropped(DropReason::UnknownIntent)
                    }
                }
            }
        }
    }

    fn await_confirmation(
        &self,
        session_id: &str,
        event: IntentEvent,
        lower_certainty: bool,
    ) -> DispatchOutcome {
        let prompt = messages::confirmation_prompt(&event, lower_certainty);
        let intent = event.intent.clone();
        {
            let mut gates = self.inner.gates.lock().unwrap_or_else(|e| e.into_inner());
            let gate = gates.entry(session_id.to_owned()).or_default();
            let (ticket, replaced) =
                gate.arm(session_id, event, lower_certainty, self.inner.timeout);
            if let Some(old) = replaced {
                tracing::info!(
                    session = %session_id,
                    replaced = %old.event.intent,
                    by = %intent,
                    "pending confirmation replaced"
                );
            }
            let inner = Arc::clone(&self.inner);
            let session = session_id.to_owned();
            let timeout = self.inner.timeout;
            gate.set_timer(tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                expire(&inner, &session, ticket);
            }));
        }
        tracing::info!(
            session = %session_id,
            intent = %intent,
            lower_certainty,
            "awaiting confirmation"
        );
        self.inner.feedback.speak(FeedbackKind::Prompt, prompt);
        DispatchOutcome::AwaitingConfirmation {
            intent,
            lower_certainty,
        }
    }

    fn cancel_pending(&self, session_id: &str, superseded_by: &str) {
        let mut gates = self.inner.gates.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = gates.get_mut(session_id).and_then(SessionGate::take) {
            tracing::info!(
                session = %session_id,
                cancelled = %old.event.intent,
                by = %superseded_by,
                "pending confirmation superseded"
            );
        }
    }

    fn report_no_context(&self, intent: &str, requirement: ContextRequirement) -> DispatchOutcome {
        tracing::info!(intent = %intent, "{requirement}");
        self.inner
            .feedback
            .speak(FeedbackKind::Failure, messages::no_active_context(requirement));
        DispatchOutcome::NoActiveContext {
            intent: intent.to_owned(),
            requirement,
        }
    }

    async fn execute(
        &self,
        session_id: &str,
        event: IntentEvent,
        registration: &CapabilityRegistration,
        confirmed: bool,
    ) -> DispatchOutcome {
        let slot = self.inner.sessions.slot(session_id);
        let mut context = slot.lock().await;

        if let Some(requirement) = registration.requires_context
            && !context.satisfies(requirement)
        {
            return self.report_no_context(&event.intent, requirement);
        }

        let mut handle = ContextHandle::new(session_id, context.clone());
        let result = registration
            .handler
            .execute(&event.entities, &mut handle)
            .await;
        let intent = event.intent;

        match result {
            Ok(outcome) if outcome.success => {
                if let Some(updated) = handle.into_changes() {
                    *context = updated;
                }
                tracing::info!(
                    session = %session_id,
                    intent = %intent,
                    confirmed,
                    "capability succeeded"
                );
                self.inner
                    .feedback
                    .speak(FeedbackKind::Success, outcome.message);
                DispatchOutcome::Executed { intent, confirmed }
            }
            Ok(outcome) => {
                tracing::warn!(
                    session = %session_id,
                    intent = %intent,
                    message = %outcome.message,
                    "capability reported failure"
                );
                let text = if outcome.message.trim().is_empty() {
                    messages::GENERIC_FAILURE.to_owned()
                } else {
                    outcome.message
                };
                self.inner.feedback.speak(FeedbackKind::Failure, text);
                DispatchOutcome::Failed { intent }
            }
            Err(CapabilityError::NoActiveContext(requirement)) => {
                drop(context);
                self.report_no_context(&intent, requirement)
            }
            Err(CapabilityError::Failed(reason)) => {
                tracing::warn!(
                    session = %session_id,
                    intent = %intent,
                    "capability failed: {reason}"
                );
                self.inner
                    .feedback
                    .speak(FeedbackKind::Failure, messages::GENERIC_FAILURE);
                DispatchOutcome::Failed { intent }
            }
        }
    }
}

fn expire(inner: &Inner, session_id: &str, ticket: u64) {
    let expired = {
        let mut gates = inner.gates.lock().unwrap_or_else(|e| e.into_inner());
        gates.get_mut(session_id).and_then(|g| g.expire(ticket))
    };
    if let Some(pending) = expired {
        tracing::info!(
            session = %session_id,
            intent = %pending.event.intent,
            "confirmation expired; discarded"
        );
    }
}
