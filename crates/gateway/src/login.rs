//! Encrypted login exchange
//!
//! POSTs the credentials through the hybrid crypto envelope and extracts the
//! bearer token from the decrypted response. The decoded body is
//! `{code, msg, data}` and anything but `code == 200` is an authentication
//! failure.

use serde::{Deserialize, Serialize};

use bondfeed_config::GatewayConfig;
use bondfeed_crypto::{decrypt_response, encrypt_request, EncryptedResponse};

use crate::{GatewayError, Result, LOGIN_PATH};

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(rename = "code")]
    sms_code: &'a str,
}

/// Decrypted login response body
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    /// Status code; 200 is success
    pub code: i64,

    /// Human-readable status
    #[serde(default)]
    pub msg: String,

    /// Bearer token on success
    #[serde(default)]
    pub data: String,
}

/// Perform the login exchange and return the bearer token.
pub async fn login(client: &reqwest::Client, config: &GatewayConfig) -> Result<String> {
    let request = LoginRequest {
        username: &config.username,
        password: &config.password,
        sms_code: &config.sms_code,
    };
    let plaintext = serde_json::to_string(&request)
        .map_err(|e| GatewayError::auth(format!("serialize login body: {e}")))?;

    let sealed = encrypt_request(&plaintext, &config.public_key, &config.client_id)?;

    let url = format!("{}{}", config.base_url, LOGIN_PATH);
    tracing::debug!(url = %url, username = %config.username, "sending login request");

    let response = client
        .post(&url)
        .json(&sealed)
        .send()
        .await
        .map_err(|e| GatewayError::auth(format!("login request: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(GatewayError::auth(format!("login returned {status}")));
    }

    let encrypted: EncryptedResponse = response
        .json()
        .await
        .map_err(|e| GatewayError::auth(format!("login response body: {e}")))?;

    let body = decrypt_response(&encrypted, &config.public_key)?;
    let parsed: LoginResponse = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::auth(format!("decode login response: {e}")))?;

    if parsed.code != 200 {
        return Err(GatewayError::auth(format!(
            "login rejected (code {}): {}",
            parsed.code, parsed.msg
        )));
    }
    if parsed.data.is_empty() {
        return Err(GatewayError::auth("login succeeded but token is empty"));
    }

    tracing::info!(username = %config.username, "login succeeded");
    Ok(parsed.data)
}
