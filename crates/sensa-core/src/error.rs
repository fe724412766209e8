//! Error types for Sensa

use thiserror::Error;

/// Core Sensa errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensaError {
    // Lifecycle preconditions
    #[error("Agent already set up")]
    AlreadySetUp,

    #[error("Agent not set up")]
    NotSetUp,

    #[error("Agent already running")]
    AlreadyRunning,

    #[error("Configuration locked after setup: cannot change {0}")]
    ConfigLocked(&'static str),

    #[error("Sample source cannot be reset while the agent is running")]
    SourceBusy,

    // Scheduler invariants
    #[error("Invariant violation: {0}")]
    InvariantViolation(&'static str),

    // Configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Compressor contract
    #[error("Compressor not configured")]
    CompressorNotConfigured,

    #[error("Compressor already in use, cannot reconfigure")]
    CompressorInUse,

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // Sample source
    #[error("Insufficient samples: requested {requested}, remaining {remaining}")]
    InsufficientSamples { requested: usize, remaining: usize },

    // Wire errors
    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    #[error("Packet too large: {size} > {max}")]
    PacketTooLarge { size: usize, max: usize },

    #[error("Sequence counter exhausted")]
    SequenceExhausted,

    // Transport errors
    #[error("Transport error: {0}")]
    TransportError(String),
}

impl SensaError {
    /// Caller errors that abort the offending call and leave the agent in
    /// a state that must not be used further without a fresh setup.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SensaError::AlreadySetUp
                | SensaError::NotSetUp
                | SensaError::AlreadyRunning
                | SensaError::ConfigLocked(_)
                | SensaError::SourceBusy
                | SensaError::InvariantViolation(_)
        )
    }
}

/// Result type for Sensa operations
pub type SensaResult<T> = Result<T, SensaError>;
