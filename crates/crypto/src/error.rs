//! Crypto envelope error types

use thiserror::Error;

/// Errors that can occur while sealing or opening gateway envelopes
#[derive(Debug, Error)]
pub enum CryptoError {
    /// PKCS#7 or PKCS#1 v1.5 padding was malformed
    #[error("padding error: {0}")]
    Padding(&'static str),

    /// RSA public key could not be parsed, or the AES key had a bad length
    #[error("key parse error: {0}")]
    KeyParse(String),

    /// Base64 or ciphertext framing was malformed
    #[error("decode error: {0}")]
    Decode(String),

    /// RSA encryption of the session key failed
    #[error("rsa encrypt error: {0}")]
    RsaEncrypt(String),
}

impl CryptoError {
    /// Create a key parse error
    #[inline]
    pub fn key_parse(msg: impl Into<String>) -> Self {
        Self::KeyParse(msg.into())
    }

    /// Create a decode error
    #[inline]
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}
