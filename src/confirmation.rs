//! Confidence-gated confirmation state machine.
//!
//! [`decide`] maps one event's confidence and its registration policy to an
//! action. [`SessionGate`] holds the at-most-one pending confirmation of a
//! session together with the timer that expires it.

use crate::config::ConfidenceConfig;
use crate::intent::IntentEvent;
use crate::registry::{CapabilityRegistration, ConfirmPolicy};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Confidence band of an event relative to its effective thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    High,
    Medium,
    Low,
    BelowLow,
}

/// Classify `confidence`. The effective HIGH threshold is the registration's
/// `min_confidence` (global `high` when unset), never below `medium`.
#[must_use]
pub fn classify(
    confidence: f32,
    thresholds: &ConfidenceConfig,
    min_confidence: Option<f32>,
) -> Band {
    let high = min_confidence
        .unwrap_or(thresholds.high)
        .max(thresholds.medium);
    if confidence >= high {
        Band::High
    } else if confidence >= thresholds.medium {
        Band::Medium
    } else if confidence >= thresholds.low {
        Band::Low
    } else {
        Band::BelowLow
    }
}

/// What the gate does with an accepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Execute,
    Confirm { lower_certainty: bool },
    Discard,
}

/// Decide for one event. Registration policy wins over the generic bands.
#[must_use]
pub fn decide(
    confidence: f32,
    registration: &CapabilityRegistration,
    thresholds: &ConfidenceConfig,
) -> GateDecision {
    match (
        classify(confidence, thresholds, registration.min_confidence),
        registration.policy,
    ) {
        (Band::BelowLow, _) => GateDecision::Discard,
        (Band::High, ConfirmPolicy::Always) => GateDecision::Confirm {
            lower_certainty: false,
        },
        (Band::High, _) | (Band::Medium, ConfirmPolicy::Direct) => GateDecision::Execute,
        (Band::Medium, _) => GateDecision::Confirm {
            lower_certainty: false,
        },
        (Band::Low, _) => GateDecision::Confirm {
            lower_certainty: true,
        },
    }
}

/// A proposed action waiting for a yes/no.
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub session_id: String,
    pub event: IntentEvent,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub lower_certainty: bool,
    /// Identifies this pending entry; later entries get larger tickets.
    pub ticket: u64,
}

#[derive(Debug, Default)]
pub enum GateState {
    #[default]
    Idle,
    AwaitingConfirmation(PendingConfirmation),
}

/// Per-session confirmation state.
#[derive(Debug, Default)]
pub struct SessionGate {
    state: GateState,
    last_ticket: u64,
    timer: Option<JoinHandle<()>>,
}

impl SessionGate {
    #[must_use]
    pub fn state(&self) -> &GateState {
        &self.state
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingConfirmation> {
        match &self.state {
            GateState::AwaitingConfirmation(pending) => Some(pending),
            GateState::Idle => None,
        }
    }

    /// Store a new pending confirmation, replacing and disarming any previous one.
    ///
    /// Returns the new entry's ticket; the caller arms the expiry timer with
    /// [`Self::set_timer`].
    pub fn arm(
        &mut self,
        session_id: &str,
        event: IntentEvent,
        lower_certainty: bool,
        timeout: Duration,
    ) -> (u64, Option<PendingConfirmation>) {
        let replaced = self.take();
        self.last_ticket += 1;
        let created_at = Utc::now();
        let expires_at = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|d| created_at.checked_add_signed(d))
            .unwrap_or(created_at);
        self.state = GateState::AwaitingConfirmation(PendingConfirmation {
            session_id: session_id.to_owned(),
            event,
            created_at,
            expires_at,
            lower_certainty,
            ticket: self.last_ticket,
        });
        (self.last_ticket, replaced)
    }

    /// Attach the expiry timer of the current pending entry.
    pub fn set_timer(&mut self, timer: JoinHandle<()>) {
        if let Some(old) = self.timer.replace(timer) {
            old.abort();
        }
    }

    /// Leave `AwaitingConfirmation` (answer, cancellation or replacement).
    pub fn take(&mut self) -> Option<PendingConfirmation> {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        match std::mem::take(&mut self.state) {
            GateState::AwaitingConfirmation(pending) => Some(pending),
            GateState::Idle => None,
        }
    }

    /// Expire the entry with `ticket`; no-op if it was already answered or replaced.
    pub fn expire(&mut self, ticket: u64) -> Option<PendingConfirmation> {
        match &self.state {
            GateState::AwaitingConfirmation(pending) if pending.ticket == ticket => {
                // The timer task is the caller; dropping its handle does not cancel it.
                self.timer = None;
                match std::mem::take(&mut self.state) {
                    GateState::AwaitingConfirmation(pending) => Some(pending),
                    GateState::Idle => None,
                }
            }
            _ => None,
        }
    }
}
