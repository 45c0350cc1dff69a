//! Error types for the dispatch pipeline.

/// Top-level error type for the multimodal dispatch engine.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Inbound envelope could not be parsed into a wire record.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Gesture code missing from the gesture table.
    #[error("unmapped gesture code `{0}`")]
    UnmappedGesture(String),

    /// Intent name is empty or has no registered capability.
    #[error("unknown intent `{0}`")]
    UnknownIntent(String),

    /// A contextual command arrived with no prior context to resolve against.
    #[error("no active context: {0}")]
    NoActiveContext(String),

    /// Capability reported an internal failure.
    #[error("capability failure: {0}")]
    CapabilityFailure(String),

    /// Two capabilities were registered for the same intent.
    #[error("duplicate registration for intent `{0}`")]
    DuplicateRegistration(String),

    /// A canonical intent that must be served has no capability.
    #[error("no capability registered for intent `{0}`")]
    MissingCapability(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, DispatchError>;
