//! Chat webhook notifier
//!
//! Posts text or markdown messages to the operations robot. Each request is
//! signed: the query carries `access_token`, the millisecond `timestamp`,
//! and `sign` = base64(HMAC-SHA256(secret, "<timestamp>\n<secret>")).

use base64::prelude::*;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use bondfeed_config::NotifyConfig;

use crate::{ExportError, Result};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MarkdownMessage<'a> {
    title: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct WebhookBody<'a> {
    msgtype: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    markdown: Option<MarkdownMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct WebhookReply {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// Webhook client for the operations channel
#[derive(Debug, Clone)]
pub struct Notifier {
    config: NotifyConfig,
    client: reqwest::Client,
}

impl Notifier {
    /// Build a notifier; `config.is_configured()` gates whether sends are
    /// attempted at all.
    pub fn new(config: NotifyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ExportError::notify(format!("build http client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Send a plain text message
    pub async fn send_text(&self, content: &str) -> Result<()> {
        self.send(WebhookBody {
            msgtype: "text",
            text: Some(TextMessage { content }),
            markdown: None,
        })
        .await
    }

    /// Send a markdown message
    pub async fn send_markdown(&self, title: &str, text: &str) -> Result<()> {
        self.send(WebhookBody {
            msgtype: "markdown",
            text: None,
            markdown: Some(MarkdownMessage { title, text }),
        })
        .await
    }

    async fn send(&self, body: WebhookBody<'_>) -> Result<()> {
        if !self.config.is_configured() {
            return Err(ExportError::notify("webhook is not configured"));
        }

        let timestamp = Utc::now().timestamp_millis();
        let sign = sign(&self.config.secret, timestamp);
        let url = format!("{}/robot/send", self.config.server.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .query(&[
                ("access_token", self.config.access_token.as_str()),
                ("timestamp", timestamp.to_string().as_str()),
                ("sign", sign.as_str()),
            ])
            .json(&body)
            .send()
            .await
            .map_err(|e| ExportError::notify(format!("send: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::notify(format!("endpoint returned {status}")));
        }
        let reply: WebhookReply = response
            .json()
            .await
            .map_err(|e| ExportError::notify(format!("decode reply: {e}")))?;
        if reply.errcode != 0 {
            return Err(ExportError::notify(format!(
                "robot error {}: {}",
                reply.errcode, reply.errmsg
            )));
        }
        Ok(())
    }
}

/// Robot signature: HMAC-SHA256 over `"<timestamp>\n<secret>"`, keyed with
/// the secret, base64 encoded. URL encoding happens at the query layer.
pub(crate) fn sign(secret: &str, timestamp_ms: i64) -> String {
    let message = format!("{timestamp_ms}\n{secret}");
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(message.as_bytes());
    BASE64_STANDARD.encode(mac.finalize().into_bytes())
}
