//! Bondfeed Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Minimal config should just work - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use bondfeed_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[gateway]\nusername = \"ATSTEST10001\"").unwrap();
//! ```
//!
//! # Sources
//!
//! Configuration normally comes from a remote key-value endpoint (see
//! [`remote::RemoteSource`]) with the local TOML file as fallback; the
//! binary decides which path applies at startup.

mod error;
mod remote;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

pub use error::{ConfigError, Result};
pub use remote::{RemoteSource, RemoteSourceConfig};

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream trading-gateway connection and credentials
    pub gateway: GatewayConfig,

    /// Pipeline buffers, worker counts and batching
    pub process: ProcessConfig,

    /// MySQL connection parameters
    pub database: DatabaseConfig,

    /// Snapshot export and object-store upload
    pub export: ExportConfig,

    /// Chat webhook notifications
    pub notify: NotifyConfig,

    /// Remote configuration source (optional)
    pub remote: RemoteSourceConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Upstream gateway configuration (login, WebSocket, STOMP)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL for the HTTP login endpoint
    pub base_url: String,

    /// WebSocket URL of the message gateway
    pub wss_url: String,

    /// Account name
    pub username: String,

    /// Account password
    pub password: String,

    /// SMS challenge code
    pub sms_code: String,

    /// Client identifier sent alongside the sealed login body
    pub client_id: String,

    /// Server RSA public key, base64 DER (or PEM)
    pub public_key: String,

    /// Login request timeout, seconds
    pub timeout_secs: u64,

    /// Client heart-beat offer: interval at which we send, milliseconds
    pub heartbeat_send_ms: u64,

    /// Client heart-beat offer: window within which the server must show
    /// activity, milliseconds
    pub heartbeat_recv_ms: u64,

    /// Delay between reconnect attempts, milliseconds
    pub reconnect_interval_ms: u64,

    /// Reconnect attempts before giving up (0 = unbounded)
    pub max_reconnect_attempts: u32,

    /// Skip TLS certificate verification (test endpoints only)
    pub insecure_skip_verify: bool,

    /// Device identifier reported in the STOMP CONNECT headers
    pub device_imei: String,

    /// Operating system reported in the STOMP CONNECT headers
    pub device_os: String,

    /// Application version reported in the STOMP CONNECT headers
    pub app_version: String,

    /// Free-form device description reported in the STOMP CONNECT headers
    pub device_info: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            wss_url: String::new(),
            username: String::new(),
            password: String::new(),
            sms_code: String::new(),
            client_id: String::new(),
            public_key: String::new(),
            timeout_secs: 30,
            heartbeat_send_ms: 30_000,
            heartbeat_recv_ms: 120_000,
            reconnect_interval_ms: 5_000,
            max_reconnect_attempts: 10,
            insecure_skip_verify: false,
            device_imei: "bondfeed-device-001".into(),
            device_os: "linux".into(),
            app_version: "1.0.0".into(),
            device_info: "bondfeed-client".into(),
        }
    }
}

impl GatewayConfig {
    /// Login request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reconnect backoff as a [`Duration`]
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// Heart-beat offer as the `(cx, cy)` millisecond pair of the CONNECT
    /// frame
    pub fn heartbeat_offer(&self) -> (u64, u64) {
        (self.heartbeat_send_ms, self.heartbeat_recv_ms)
    }
}

/// Pipeline processing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Raw frame channel capacity
    pub raw_buffer_size: usize,

    /// Parsed quote channel capacity
    pub parsed_buffer_size: usize,

    /// Dead-letter channel capacity
    pub dead_buffer_size: usize,

    /// Number of parser workers
    pub parser_workers: usize,

    /// Number of database writer workers
    pub db_workers: usize,

    /// Records per write batch
    pub batch_size: usize,

    /// Writer flush interval, milliseconds
    pub flush_delay_ms: u64,

    /// Days of detail data to keep (recorded, not enforced by the pipeline)
    pub data_retention_days: u32,

    /// Cleanup cadence in hours (recorded, not enforced by the pipeline)
    pub cleanup_interval_hours: u32,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            raw_buffer_size: 20_000,
            parsed_buffer_size: 4_000,
            dead_buffer_size: 1_000,
            parser_workers: 8,
            db_workers: 2,
            batch_size: 300,
            flush_delay_ms: 100,
            data_retention_days: 30,
            cleanup_interval_hours: 24,
        }
    }
}

impl ProcessConfig {
    /// Writer flush interval as a [`Duration`]
    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }
}

/// MySQL connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Login user
    pub user: String,

    /// Login password
    pub password: String,

    /// Schema name
    pub schema: String,

    /// Connection pool ceiling
    pub max_connections: u32,

    /// Idle connections kept warm
    pub min_connections: u32,

    /// Connection lifetime, seconds
    pub conn_max_lifetime_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3306,
            user: "bondfeed".into(),
            password: String::new(),
            schema: "bondfeed".into(),
            max_connections: 10,
            min_connections: 2,
            conn_max_lifetime_secs: 1800,
        }
    }
}

impl DatabaseConfig {
    /// Connection URL for the pool builder
    pub fn url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.schema
        )
    }

    /// Connection lifetime as a [`Duration`]
    pub fn conn_max_lifetime(&self) -> Duration {
        Duration::from_secs(self.conn_max_lifetime_secs)
    }
}

/// Snapshot export configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Local directory for spreadsheet staging
    pub path: String,

    /// Object-store service base URL
    pub oss_url: String,

    /// Upload timeout, seconds
    pub timeout_secs: u64,

    /// Minutes between snapshots
    pub interval_minutes: u64,

    /// Days exported files are kept server-side (recorded, not enforced)
    pub retention_days: u32,

    /// `x-origin-service` header value on uploads
    pub origin_service: String,

    /// `x-uin` header value on uploads
    pub uin: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: "/data/export/bond_quote".into(),
            oss_url: String::new(),
            timeout_secs: 30,
            interval_minutes: 60,
            retention_days: 7,
            origin_service: "bondfeed".into(),
            uin: "0".into(),
        }
    }
}

impl ExportConfig {
    /// Snapshot cadence as a [`Duration`]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    /// Upload timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Chat webhook configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Webhook server base URL (the `/robot/send` path is appended)
    pub server: String,

    /// Robot access token
    pub access_token: String,

    /// HMAC signing secret
    pub secret: String,

    /// Send timeout, seconds
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            access_token: String::new(),
            secret: String::new(),
            timeout_secs: 30,
        }
    }
}

impl NotifyConfig {
    /// True when all webhook parameters are present
    pub fn is_configured(&self) -> bool {
        !self.server.is_empty() && !self.access_token.is_empty() && !self.secret.is_empty()
    }

    /// Send timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
