//! Multimodal intent dispatch and confirmation for a voice and gesture map assistant.
//!
//! Speech and gesture recognizers publish results through an MMI interaction
//! manager. This crate turns those messages into canonical intents and runs
//! them through a confidence gate:
//!
//! Recognizer → **Envelope parser** → **Normalizer** → **Gate** → Capability → Feedback
//!
//! # Architecture
//!
//! - **Protocol**: parses MMI XML envelopes, JSON command payloads and bracket
//!   gesture strings; encodes outbound speech requests
//! - **Normalizer**: maps recognizer output to a canonical [`IntentEvent`]
//! - **Registry**: one capability per intent, with its confirmation policy
//! - **Dispatcher**: confidence bands, pending confirmation per session,
//!   affirm/deny handling and the confirmation timeout
//! - **Session**: per-session map context shared by capabilities
//! - **Feedback**: spoken results delivered to the audio-output peer
//! - **Channels**: WebSocket listeners and an optional HTTP gateway

pub mod automation;
pub mod catalog;
pub mod channels;
pub mod config;
pub mod confirmation;
pub mod dispatcher;
pub mod entities;
pub mod error;
pub mod feedback;
pub mod idle;
pub mod intent;
pub mod normalizer;
pub mod protocol;
pub mod registry;
pub mod session;

pub use config::DispatchConfig;
pub use dispatcher::{DispatchOutcome, Dispatcher, DropReason};
pub use error::{DispatchError, Result};
pub use feedback::{FeedbackEmitter, FeedbackKind, FeedbackMessage};
pub use intent::{Entity, IntentEvent, IntentSource};
pub use registry::{
    Capability, CapabilityError, CapabilityOutcome, CapabilityRegistration, CapabilityRegistry,
    ConfirmPolicy, RegistryBuilder,
};
pub use session::{ContextHandle, ContextRequirement, SessionContext};
