//! The sealed request/response envelope
//!
//! `encrypt_request` seals an outbound body: fresh AES key, AES-ECB over the
//! plaintext, RSA over the base64 key string. `decrypt_response` opens the
//! server's reply: raw public-key RSA to recover the base64 key string, then
//! AES-ECB to recover the body. Note the RSA layer protects the *base64
//! encoding* of the AES key on both legs - that quirk is part of the wire
//! contract.

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::{aes_ecb, rsa_pub, Result, AES_KEY_LEN};

/// Sealed request body, POSTed as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedRequest {
    /// AES-ECB ciphertext of the request body, base64
    #[serde(rename = "reqMsg")]
    pub req_msg: String,

    /// RSA ciphertext of the base64 AES key, base64
    #[serde(rename = "reqKey")]
    pub req_key: String,

    /// Caller identifier, passed through in clear
    #[serde(rename = "clientId")]
    pub client_id: String,
}

/// Sealed response body, as returned by the gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncryptedResponse {
    /// AES-ECB ciphertext of the response body, base64
    #[serde(rename = "resMsg", default)]
    pub res_msg: String,

    /// Private-key-RSA ciphertext of the base64 AES key, base64
    #[serde(rename = "resKey", default)]
    pub res_key: String,
}

/// Seal `plaintext` for the gateway.
///
/// Generates a fresh 16-byte AES key per call (see
/// [`aes_ecb::generate_key`] for the degraded RNG fallback), encrypts the
/// plaintext with AES-128-ECB/PKCS#7, and protects the base64-encoded key
/// string with RSA-PKCS1v1.5 under `public_key` (base64 DER or PEM).
pub fn encrypt_request(
    plaintext: &str,
    public_key: &str,
    client_id: &str,
) -> Result<EncryptedRequest> {
    let rsa_key = rsa_pub::parse_public_key(public_key)?;

    let aes_key = aes_ecb::generate_key();
    let aes_key_b64 = BASE64_STANDARD.encode(aes_key);

    let ciphertext = aes_ecb::encrypt(plaintext.as_bytes(), &aes_key)?;
    let sealed_key = rsa_pub::encrypt(&rsa_key, aes_key_b64.as_bytes())?;

    Ok(EncryptedRequest {
        req_msg: BASE64_STANDARD.encode(ciphertext),
        req_key: BASE64_STANDARD.encode(sealed_key),
        client_id: client_id.to_string(),
    })
}

/// Open a gateway response.
///
/// Recovers the base64 AES key string from `res_key` via the raw public-key
/// operation, decodes it, and AES-decrypts `res_msg`. Returns the plaintext
/// body bytes.
pub fn decrypt_response(response: &EncryptedResponse, public_key: &str) -> Result<Vec<u8>> {
    let rsa_key = rsa_pub::parse_public_key(public_key)?;

    let sealed_key = BASE64_STANDARD
        .decode(&response.res_key)
        .map_err(|e| CryptoError::decode(format!("resKey base64: {e}")))?;
    let aes_key_b64 = rsa_pub::decrypt_with_public(&rsa_key, &sealed_key)?;

    let aes_key_b64 = String::from_utf8(aes_key_b64)
        .map_err(|_| CryptoError::decode("recovered aes key is not utf-8".to_string()))?;
    let aes_key = BASE64_STANDARD
        .decode(aes_key_b64.trim())
        .map_err(|e| CryptoError::decode(format!("aes key base64: {e}")))?;
    if aes_key.len() != AES_KEY_LEN {
        return Err(CryptoError::key_parse(format!(
            "recovered aes key has length {}, want {AES_KEY_LEN}",
            aes_key.len()
        )));
    }

    let ciphertext = BASE64_STANDARD
        .decode(&response.res_msg)
        .map_err(|e| CryptoError::decode(format!("resMsg base64: {e}")))?;
    aes_ecb::decrypt(&ciphertext, &aes_key)
}
