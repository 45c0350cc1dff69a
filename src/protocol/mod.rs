//! Wire formats exchanged with the interaction manager and its peers.

pub mod mmi;
pub mod outbound;

pub use mmi::{ControlFrame, Envelope, WireRecord, parse_envelope};
