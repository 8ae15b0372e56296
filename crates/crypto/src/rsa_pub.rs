//! RSA operations against the gateway's public key
//!
//! Two operations live here: the standard PKCS#1 v1.5 encryption used to
//! protect the outbound AES key, and the unusual "decrypt with public key"
//! used to open responses. The server encrypts the response key with its
//! private key, so the client recovers it with a raw `c^e mod n` followed by
//! v1.5 unpadding. The unpadding checks (leading `00 01`, `00` separator at
//! offset >= 8) match the upstream client byte for byte.

use base64::prelude::*;
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Encrypt, RsaPublicKey};

use crate::error::CryptoError;
use crate::Result;

/// Parse the configured public key.
///
/// The gateway distributes its key as base64-encoded DER (PKIX
/// `SubjectPublicKeyInfo`); PKCS#1 DER and PEM wrappings of either are also
/// accepted for operator convenience.
pub fn parse_public_key(key: &str) -> Result<RsaPublicKey> {
    let trimmed = key.trim();

    if trimmed.starts_with("-----BEGIN") {
        return RsaPublicKey::from_public_key_pem(trimmed)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(trimmed))
            .map_err(|e| CryptoError::key_parse(format!("pem public key: {e}")));
    }

    let der = BASE64_STANDARD
        .decode(trimmed)
        .map_err(|e| CryptoError::key_parse(format!("public key base64: {e}")))?;
    RsaPublicKey::from_public_key_der(&der)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(&der))
        .map_err(|e| CryptoError::key_parse(format!("der public key: {e}")))
}

/// PKCS#1 v1.5 encrypt `data` with the public key.
pub fn encrypt(public_key: &RsaPublicKey, data: &[u8]) -> Result<Vec<u8>> {
    public_key
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, data)
        .map_err(|e| CryptoError::RsaEncrypt(e.to_string()))
}

/// Recover a plaintext the server sealed with its *private* key.
///
/// Computes `m = c^e mod n`, left-pads to the modulus size, and strips the
/// v1.5 padding block `00 01 FF.. 00 <data>`.
pub fn decrypt_with_public(public_key: &RsaPublicKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let k = public_key.size();
    if ciphertext.is_empty() || ciphertext.len() > k {
        return Err(CryptoError::decode(format!(
            "rsa ciphertext length {} exceeds modulus size {k}",
            ciphertext.len()
        )));
    }

    let c = BigUint::from_bytes_be(ciphertext);
    let m = c.modpow(public_key.e(), public_key.n());
    let mut out = m.to_bytes_be();

    // Leading zero bytes are dropped by the big-integer conversion.
    if out.len() < k {
        let mut padded = vec![0u8; k - out.len()];
        padded.append(&mut out);
        out = padded;
    }

    if out.len() < 11 || out[0] != 0x00 || out[1] != 0x01 {
        return Err(CryptoError::Padding("bad pkcs1 v1.5 block header"));
    }
    let sep = out[2..]
        .iter()
        .position(|&b| b == 0x00)
        .ok_or(CryptoError::Padding("missing pkcs1 v1.5 separator"))?;
    if sep < 8 {
        return Err(CryptoError::Padding("pkcs1 v1.5 padding too short"));
    }

    Ok(out[2 + sep + 1..].to_vec())
}
