//! Canonical intents served by the map assistant and their gate policy.

use crate::error::Result;
use crate::normalizer;
use crate::registry::{Capability, CapabilityRegistration, ConfirmPolicy, RegistryBuilder};
use crate::session::ContextRequirement;
use std::sync::Arc;

/// Default registration data for one canonical intent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntentSpec {
    pub intent: &'static str,
    pub policy: ConfirmPolicy,
    pub min_confidence: Option<f32>,
    pub requires_context: Option<ContextRequirement>,
}

const fn command(intent: &'static str, min_confidence: f32) -> IntentSpec {
    IntentSpec {
        intent,
        policy: ConfirmPolicy::Thresholds,
        min_confidence: Some(min_confidence),
        requires_context: None,
    }
}

const fn read_query(intent: &'static str, min_confidence: f32) -> IntentSpec {
    IntentSpec {
        policy: ConfirmPolicy::Direct,
        ..command(intent, min_confidence)
    }
}

const fn needs(mut entry: IntentSpec, requirement: ContextRequirement) -> IntentSpec {
    entry.requires_context = Some(requirement);
    entry
}

/// Speech intents. Gesture intents come from the gesture table.
pub const SPEECH_INTENTS: &[IntentSpec] = &[
    command("search_location", 0.70),
    command("find_place", 0.70),
    command("get_directions", 0.75),
    IntentSpec {
        policy: ConfirmPolicy::Always,
        ..needs(command("start_navigation", 0.80), ContextRequirement::ActiveRoute)
    },
    needs(command("stop_navigation", 0.70), ContextRequirement::ActiveRoute),
    command("zoom_in", 0.70),
    command("zoom_out", 0.70),
    command("recenter_map", 0.70),
    command("center_location", 0.70),
    command("change_map_type", 0.75),
    command("show_traffic", 0.70),
    command("hide_traffic", 0.70),
    needs(command("select_place", 0.75), ContextRequirement::ResultSet),
    needs(
        command("select_alternative_route", 0.70),
        ContextRequirement::ActiveRoute,
    ),
    command("show_place_details", 0.70),
    command("show_reviews", 0.70),
    command("show_photos", 0.70),
    read_query("get_opening_hours", 0.70),
    needs(
        read_query("get_trip_duration", 0.70),
        ContextRequirement::ActiveRoute,
    ),
    needs(
        read_query("get_trip_distance", 0.70),
        ContextRequirement::ActiveRoute,
    ),
    command("change_transport_mode", 0.70),
    needs(command("swap_route", 0.70), ContextRequirement::ActiveRoute),
    command("help", 0.60),
    command("cancel", 0.60),
    command("greet", 0.60),
    command("goodbye", 0.60),
    command("thanks", 0.60),
];

/// Every canonical intent: speech intents, then gesture commands.
pub fn canonical_intents() -> impl Iterator<Item = IntentSpec> {
    SPEECH_INTENTS
        .iter()
        .copied()
        .chain(normalizer::gesture_command_intents().map(|intent| IntentSpec {
            intent,
            policy: ConfirmPolicy::Thresholds,
            min_confidence: None,
            requires_context: None,
        }))
}

/// Register one capability per canonical intent, built by `factory`.
///
/// # Errors
///
/// Propagates registration errors (e.g. a duplicate already in `builder`).
pub fn register_catalog<F>(builder: &mut RegistryBuilder, mut factory: F) -> Result<()>
where
    F: FnMut(&'static str) -> Arc<dyn Capability>,
{
    for entry in canonical_intents() {
        let mut registration = CapabilityRegistration::new(entry.intent, factory(entry.intent))
            .with_policy(entry.policy);
        if let Some(min) = entry.min_confidence {
            registration = registration.with_min_confidence(min);
        }
        if let Some(requirement) = entry.requires_context {
            registration = registration.with_requirement(requirement);
        }
        builder.register(registration)?;
    }
    Ok(())
}
