//! Gateway error types
//!
//! Three kinds matter to the supervisor: authentication failures (likely to
//! repeat until credentials change), transport failures (socket-level, worth
//! retrying), and protocol failures (STOMP-level disagreements). All of them
//! end the session and travel over the event channel.

use thiserror::Error;

/// Errors that can occur while establishing or running a gateway session
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Login was rejected or the login exchange failed
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Socket-level failure: dial, TLS, read/write, missed heart-beats
    #[error("transport error: {0}")]
    Transport(String),

    /// STOMP-level failure: bad CONNECTED/RECEIPT, ERROR frame, bad frame
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The crypto envelope could not be sealed or opened
    #[error("crypto envelope error: {0}")]
    Crypto(#[from] bondfeed_crypto::CryptoError),
}

impl GatewayError {
    /// Create an authentication error
    #[inline]
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a transport error
    #[inline]
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol error
    #[inline]
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

impl From<bondfeed_protocol::ProtocolError> for GatewayError {
    fn from(err: bondfeed_protocol::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}
