//! Object-store upload client
//!
//! `POST <oss_url>/oss/v1/Upload/<category>` with a multipart form: the
//! `file` part carries the bytes, optional `md5` and `filename` fields ride
//! alongside. The response is a JSON-RPC envelope; `result.url` is the
//! public download link.

use md5::{Digest, Md5};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::{ExportError, Result};

/// Successful upload: object id and public URL
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResult {
    /// Object-store identifier
    #[serde(default)]
    pub ossid: String,

    /// Public download URL
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<UploadResult>,
    error: Option<RpcError>,
}

/// Client for the object-store upload endpoint
#[derive(Debug, Clone)]
pub struct OssClient {
    base_url: String,
    client: reqwest::Client,
}

impl OssClient {
    /// Build a client for the given service base URL
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExportError::upload(format!("build http client: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    /// Upload `bytes` under `file_name` into `category`.
    ///
    /// `headers` are the caller's custom headers (`x-request-id`,
    /// `x-origin-service`, `x-uin`). The file's MD5 rides along as a form
    /// field for server-side integrity checks.
    pub async fn upload(
        &self,
        category: &str,
        file_name: &str,
        bytes: Vec<u8>,
        headers: &[(&str, String)],
    ) -> Result<UploadResult> {
        let md5_hex = format!("{:x}", Md5::digest(&bytes));

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| ExportError::upload(format!("form part: {e}")))?;
        let form = Form::new()
            .part("file", part)
            .text("md5", md5_hex)
            .text("filename", file_name.to_string());

        let url = format!(
            "{}/oss/v1/Upload/{category}",
            self.base_url.trim_end_matches('/')
        );
        let mut request = self.client.post(&url).multipart(form);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExportError::upload(format!("send: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::upload(format!("endpoint returned {status}")));
        }

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| ExportError::upload(format!("decode response: {e}")))?;

        if let Some(error) = envelope.error {
            return Err(ExportError::upload(format!(
                "server error {}: {}",
                error.code, error.message
            )));
        }
        let result = envelope
            .result
            .ok_or_else(|| ExportError::upload("response has neither result nor error"))?;
        if result.url.is_empty() {
            return Err(ExportError::upload("response result has no url"));
        }
        Ok(result)
    }
}
