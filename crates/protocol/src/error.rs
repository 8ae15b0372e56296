//! Protocol error types
//!
//! Errors that can occur when decoding quote messages or STOMP frames.

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Outer JSON envelope failed to decode
    #[error("malformed quote envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// Inner price payload string failed to decode
    #[error("malformed price payload: {0}")]
    Payload(#[source] serde_json::Error),

    /// Envelope decoded but carries no security identifier
    #[error("envelope has empty securityId")]
    EmptySecurityId,

    /// STOMP frame could not be parsed
    #[error("malformed stomp frame: {0}")]
    Frame(String),

    /// STOMP heart-beat header was not `<cx>,<cy>`
    #[error("invalid heart-beat header '{0}'")]
    HeartBeat(String),
}

impl ProtocolError {
    /// Create a malformed-frame error
    #[inline]
    pub fn frame(msg: impl Into<String>) -> Self {
        Self::Frame(msg.into())
    }

    /// True when the error is a per-record decode failure that should be
    /// dead-lettered rather than treated as a session fault.
    pub fn is_dead_letter(&self) -> bool {
        matches!(
            self,
            Self::Envelope(_) | Self::Payload(_) | Self::EmptySecurityId
        )
    }
}
