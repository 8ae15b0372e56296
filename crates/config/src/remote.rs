//! Remote configuration source
//!
//! Fetches the configuration document from a centralized key-value service
//! (Nacos-style open API: `GET <url>/v1/cs/configs?dataId=..&group=..`).
//! The caller falls back to the local TOML file when the fetch fails for any
//! reason, so a dead config service never blocks startup.

use std::time::Duration;

use serde::Deserialize;

use crate::{Config, ConfigError, Result};

/// Remote source connection parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteSourceConfig {
    /// Endpoint base URL; empty disables the remote source
    pub url: String,

    /// Document identifier
    pub data_id: String,

    /// Document group
    pub group: String,

    /// Tenant / namespace identifier
    pub namespace: String,

    /// Access key sent as a bearer-style header
    pub access_key: String,

    /// Fetch timeout, seconds
    pub timeout_secs: u64,
}

impl Default for RemoteSourceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            data_id: "bondfeed".into(),
            group: "DEFAULT_GROUP".into(),
            namespace: String::new(),
            access_key: String::new(),
            timeout_secs: 5,
        }
    }
}

impl RemoteSourceConfig {
    /// True when a remote endpoint is configured
    pub fn is_enabled(&self) -> bool {
        !self.url.is_empty()
    }
}

/// Client for the remote configuration endpoint
#[derive(Debug, Clone)]
pub struct RemoteSource {
    config: RemoteSourceConfig,
    client: reqwest::Client,
}

impl RemoteSource {
    /// Build a client for the given endpoint
    pub fn new(config: RemoteSourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| ConfigError::Remote(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Fetch the raw configuration document
    pub async fn fetch(&self) -> Result<String> {
        let url = format!("{}/v1/cs/configs", self.config.url.trim_end_matches('/'));

        let mut request = self.client.get(&url).query(&[
            ("dataId", self.config.data_id.as_str()),
            ("group", self.config.group.as_str()),
            ("tenant", self.config.namespace.as_str()),
        ]);
        if !self.config.access_key.is_empty() {
            request = request.header("accessKey", &self.config.access_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ConfigError::Remote(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ConfigError::Remote(format!(
                "endpoint returned {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| ConfigError::Remote(e.to_string()))
    }

    /// Fetch and parse the remote document into a [`Config`]
    pub async fn load(&self) -> Result<Config> {
        let document = self.fetch().await?;
        document.parse()
    }
}
