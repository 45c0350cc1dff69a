//! Recognizer-specific codes to canonical intents.
//!
//! Gesture codes go through [`GESTURE_TABLE`] and nothing else. A code that is
//! not in the table is rejected; no name is ever derived from the code text.

use crate::error::{DispatchError, Result};
use crate::intent::{Entity, IntentEvent, IntentSource};
use crate::protocol::WireRecord;

/// Role of a gesture in the dispatch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    /// Maps to a canonical intent served by a capability.
    Command,
    /// Answers a pending confirmation (`affirm` / `deny`).
    Control,
}

/// One row of the gesture table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureMapping {
    /// Semantic code emitted by the gesture recognizer (matched case-insensitively).
    pub code: &'static str,
    pub intent: &'static str,
    pub kind: GestureKind,
}

const fn command(code: &'static str, intent: &'static str) -> GestureMapping {
    GestureMapping {
        code,
        intent,
        kind: GestureKind::Command,
    }
}

const fn control(code: &'static str, intent: &'static str) -> GestureMapping {
    GestureMapping {
        code,
        intent,
        kind: GestureKind::Control,
    }
}

/// Every gesture code the recognizer grammar can emit.
pub const GESTURE_TABLE: &[GestureMapping] = &[
    command("CAMERA", "gesture_camera"),
    command("DOWNOL", "gesture_down_option"),
    command("ENTERS", "gesture_enter_street"),
    command("EXITS", "gesture_exit_street"),
    command("HOTELS", "gesture_hotels"),
    command("RESTAURANTS", "gesture_restaurants"),
    command("SELECT", "gesture_select"),
    command("SWIPED", "gesture_swipe_down"),
    command("SWIPELL", "gesture_swipe_left"),
    command("SWIPERR", "gesture_swipe_right"),
    command("SWIPEU", "gesture_swipe_up"),
    command("TRANSPORTS", "gesture_transports"),
    command("UPOR", "gesture_up_option"),
    command("ZOOMI", "gesture_zoom_in"),
    command("ZOOMO", "gesture_zoom_out"),
    control("THUMBSUP", "affirm"),
    control("THUMBS_UP", "affirm"),
    control("THUMBUP", "affirm"),
    control("YES", "affirm"),
    control("OK", "affirm"),
    control("THUMBSDOWN", "deny"),
    control("THUMBS_DOWN", "deny"),
    control("THUMBDOWN", "deny"),
    control("NO", "deny"),
    control("CANCEL", "deny"),
];

/// Look up a gesture code.
#[must_use]
pub fn lookup_gesture(code: &str) -> Option<&'static GestureMapping> {
    let code = code.trim();
    GESTURE_TABLE
        .iter()
        .find(|m| m.code.eq_ignore_ascii_case(code))
}

/// Canonical intents reachable from gesture commands, in table order.
pub fn gesture_command_intents() -> impl Iterator<Item = &'static str> {
    GESTURE_TABLE
        .iter()
        .filter(|m| m.kind == GestureKind::Command)
        .map(|m| m.intent)
}

/// Map a wire record to a canonical event.
///
/// # Errors
///
/// [`DispatchError::UnmappedGesture`] for gesture codes missing from the
/// table and [`DispatchError::UnknownIntent`] for empty intent names.
pub fn normalize(record: WireRecord) -> Result<IntentEvent> {
    let intent = match record.source {
        IntentSource::Gesture => lookup_gesture(&record.code)
            .map(|m| m.intent.to_owned())
            .ok_or_else(|| DispatchError::UnmappedGesture(record.code.clone()))?,
        IntentSource::Speech | IntentSource::Fusion => {
            let name = record.code.trim();
            if name.is_empty() {
                return Err(DispatchError::UnknownIntent(String::new()));
            }
            name.to_owned()
        }
    };

    let mut event = IntentEvent::new(intent, record.confidence, record.source)
        .with_raw_payload(record.raw);
    event.entities = record
        .entities
        .into_iter()
        .map(|(name, value)| Entity::new(name, value))
        .collect();
    event.utterance = record.utterance;
    Ok(event)
}
