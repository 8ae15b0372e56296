//! Bondfeed Gateway - the upstream session that feeds the pipeline
//!
//! One session walks the state machine
//!
//! ```text
//! Disconnected -> Authenticating -> WebSocketOpen -> StompConnected -> Subscribed
//! ```
//!
//! and then acts as the ingest adapter: every non-empty MESSAGE body is a
//! blocking send onto the raw channel, which is the pipeline's designed
//! backpressure. Any failure publishes a [`SessionEvent::Failed`] and ends
//! the session; restart policy belongs to the supervisor, which keeps the
//! worker pools running across reconnects.

mod error;
mod login;
mod session;
mod tls;

pub use error::GatewayError;
pub use login::{login, LoginResponse};
pub use session::{GatewaySession, SessionEvent, SessionState};
pub use tls::connector;

use std::sync::Once;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// STOMP subscription destination for the per-user quote queue
pub const QUOTE_DESTINATION: &str = "/user/queue/v1/apiatsbondquote/messages";

/// Login endpoint path under the gateway base URL
pub const LOGIN_PATH: &str = "/cust-gateway/cust-auth/account/outApi/doLogin";

/// WebSocket subprotocols offered during the upgrade, newest first
pub const STOMP_SUBPROTOCOLS: &str = "v12.stomp, v11.stomp, v10.stomp";

static TLS_PROVIDER_ONCE: Once = Once::new();

/// Install the process-wide rustls crypto provider exactly once.
pub(crate) fn ensure_tls_provider() {
    TLS_PROVIDER_ONCE.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
