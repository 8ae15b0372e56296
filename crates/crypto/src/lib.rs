//! Bondfeed Crypto - the gateway's hybrid request/response envelope
//!
//! The upstream trading gateway wraps every authenticated HTTP exchange in a
//! hybrid scheme: a fresh AES-128 key protects the payload (ECB with PKCS#7
//! padding), and the server's RSA public key protects the *base64 encoding*
//! of that AES key (PKCS#1 v1.5).
//!
//! Responses invert the scheme: the server encrypts the response AES key
//! with its RSA *private* key, so the client recovers it with a raw
//! public-key operation (`c^e mod n`) followed by PKCS#1 v1.5 unpadding.
//! That operation is interop-critical and mirrors the upstream byte checks
//! exactly; it is not a standard signature verify and must not be replaced
//! with one.

mod aes_ecb;
mod envelope;
mod error;
mod rsa_pub;

pub use envelope::{decrypt_response, encrypt_request, EncryptedRequest, EncryptedResponse};
pub use error::CryptoError;

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;

/// AES key length in bytes (AES-128)
pub const AES_KEY_LEN: usize = 16;
