//! Gateway session - state machine, STOMP handshake, ingest adapter
//!
//! The session owns the socket end to end: it logs in, dials the WebSocket,
//! performs the STOMP CONNECT and SUBSCRIBE, and then pumps MESSAGE bodies
//! onto the raw channel with blocking sends. Nothing else writes to the
//! socket.

use std::fmt;
use std::time::Duration;

use crossfire::MAsyncTx;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use bondfeed_config::GatewayConfig;
use bondfeed_protocol::stomp_command as command;
use bondfeed_protocol::{negotiate_heart_beat, Frame, HeartBeat};

use crate::login::login;
use crate::{tls, GatewayError, Result, QUOTE_DESTINATION, STOMP_SUBPROTOCOLS};

/// The established WebSocket stream type
pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection
    Disconnected,
    /// Login exchange in flight
    Authenticating,
    /// WebSocket upgraded, STOMP not yet connected
    WebSocketOpen,
    /// STOMP CONNECTED received
    StompConnected,
    /// Subscription acknowledged, streaming
    Subscribed,
    /// Terminal failure published to the supervisor
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Authenticating => "authenticating",
            Self::WebSocketOpen => "websocket-open",
            Self::StompConnected => "stomp-connected",
            Self::Subscribed => "subscribed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Events published to the supervisor's session channel
#[derive(Debug)]
pub enum SessionEvent {
    /// The subscription is live; reconnect attempts reset
    Subscribed,
    /// The session ended with an error; the supervisor decides on restart
    Failed(GatewayError),
}

/// One gateway session: login through subscription streaming
pub struct GatewaySession {
    config: GatewayConfig,
    raw_tx: MAsyncTx<Vec<u8>>,
    events: mpsc::Sender<SessionEvent>,
    shutdown: CancellationToken,
    state: SessionState,
}

impl GatewaySession {
    /// Create a session; nothing happens until [`GatewaySession::spawn`]
    pub fn new(
        config: GatewayConfig,
        raw_tx: MAsyncTx<Vec<u8>>,
        events: mpsc::Sender<SessionEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            raw_tx,
            events,
            shutdown,
            state: SessionState::Disconnected,
        }
    }

    /// Run the session on its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(mut self) {
        match self.connect_and_stream().await {
            Ok(()) => tracing::info!("gateway session ended"),
            Err(e) => {
                self.transition(SessionState::Failed);
                if self.shutdown.is_cancelled() {
                    tracing::debug!(error = %e, "session error during shutdown, not publishing");
                    return;
                }
                tracing::error!(error = %e, "gateway session failed");
                let _ = self.events.send(SessionEvent::Failed(e)).await;
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = %self.state, to = %next, "session state change");
        self.state = next;
    }

    async fn connect_and_stream(&mut self) -> Result<()> {
        self.transition(SessionState::Authenticating);
        let http = reqwest::Client::builder()
            .timeout(self.config.timeout())
            .danger_accept_invalid_certs(self.config.insecure_skip_verify)
            .build()
            .map_err(|e| GatewayError::transport(format!("build http client: {e}")))?;
        let token = login(&http, &self.config).await?;

        let ws = self.dial(&token).await?;
        self.transition(SessionState::WebSocketOpen);

        self.drive(ws, &token).await
    }

    /// STOMP handshake, subscription, then the streaming loop.
    ///
    /// Split from the dial so tests can hand in a plain-TCP stream.
    pub(crate) async fn drive(&mut self, mut ws: WsStream, token: &str) -> Result<()> {
        let heart_beat = self.stomp_connect(&mut ws, token).await?;
        self.transition(SessionState::StompConnected);

        self.subscribe(&mut ws).await?;
        self.transition(SessionState::Subscribed);
        let _ = self.events.send(SessionEvent::Subscribed).await;

        self.stream_messages(ws, heart_beat).await
    }

    async fn dial(&self, token: &str) -> Result<WsStream> {
        let url = url_with_token(&self.config.wss_url, token);
        tracing::info!(url = %self.config.wss_url, "dialing websocket");

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| GatewayError::transport(format!("build ws request: {e}")))?;
        let headers = request.headers_mut();
        headers.insert(
            "token",
            header_value(token).ok_or_else(|| GatewayError::transport("token is not a valid header value"))?,
        );
        headers.insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(STOMP_SUBPROTOCOLS),
        );
        headers.insert(
            "User-Agent",
            HeaderValue::from_static("bondfeed-websocket-client/1.0"),
        );

        let connector = tls::connector(self.config.insecure_skip_verify);
        let (ws, response) = connect_async_tls_with_config(request, None, false, Some(connector))
            .await
            .map_err(|e| GatewayError::transport(format!("websocket dial: {e}")))?;

        let negotiated = response
            .headers()
            .get("Sec-WebSocket-Protocol")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("<none>");
        tracing::info!(subprotocol = negotiated, "websocket open");
        Ok(ws)
    }

    async fn stomp_connect(&self, ws: &mut WsStream, token: &str) -> Result<HeartBeat> {
        let offer = self.config.heartbeat_offer();
        let connect = Frame::new(command::CONNECT)
            .header("accept-version", "1.0,1.1,1.2")
            .header("host", "localhost")
            .header("heart-beat", format!("{},{}", offer.0, offer.1))
            .header("login", "")
            .header("passcode", "")
            .header("token", token)
            .header("imei", self.config.device_imei.as_str())
            .header("appOs", self.config.device_os.as_str())
            .header("appVersion", self.config.app_version.as_str())
            .header("deviceInfo", self.config.device_info.as_str());
        send_frame(ws, &connect).await?;

        let reply = self.next_frame(ws, self.config.timeout()).await?;
        match reply.command.as_str() {
            command::CONNECTED => {}
            command::ERROR => {
                return Err(GatewayError::protocol(format!(
                    "server rejected CONNECT: {}",
                    error_detail(&reply)
                )))
            }
            other => {
                return Err(GatewayError::protocol(format!(
                    "expected CONNECTED, got {other}"
                )))
            }
        }

        let version = reply.get("version").unwrap_or("1.0");
        let heart_beat = negotiate_heart_beat(offer, reply.get("heart-beat").unwrap_or("0,0"))?;
        tracing::info!(
            version,
            send_ms = heart_beat.send_interval.as_millis() as u64,
            recv_ms = heart_beat.recv_timeout.as_millis() as u64,
            "stomp connected"
        );
        Ok(heart_beat)
    }

    async fn subscribe(&self, ws: &mut WsStream) -> Result<()> {
        let id = Uuid::new_v4().to_string();
        let receipt = format!("receipt-{id}");
        let frame = Frame::new(command::SUBSCRIBE)
            .header("destination", QUOTE_DESTINATION)
            .header("ack", "auto")
            .header("id", id.as_str())
            .header("uuid", id.as_str())
            .header("receipt", receipt.as_str());
        send_frame(ws, &frame).await?;
        tracing::info!(destination = QUOTE_DESTINATION, id = %id, "subscribing");

        // The server may start delivering before the receipt arrives.
        loop {
            let frame = self.next_frame(ws, self.config.timeout()).await?;
            match frame.command.as_str() {
                command::RECEIPT if frame.get("receipt-id") == Some(receipt.as_str()) => {
                    tracing::info!("subscription acknowledged");
                    return Ok(());
                }
                command::MESSAGE => self.forward_body(frame.body).await?,
                command::ERROR => {
                    return Err(GatewayError::protocol(format!(
                        "server rejected SUBSCRIBE: {}",
                        error_detail(&frame)
                    )))
                }
                other => tracing::trace!(command = other, "ignoring frame during subscribe"),
            }
        }
    }

    /// The streaming loop: pump MESSAGE bodies, exchange heart-beats, watch
    /// for server silence.
    async fn stream_messages(&self, mut ws: WsStream, heart_beat: HeartBeat) -> Result<()> {
        let mut send_tick = if heart_beat.send_interval.is_zero() {
            None
        } else {
            let mut tick = tokio::time::interval(heart_beat.send_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            Some(tick)
        };
        let mut last_activity = Instant::now();

        loop {
            let watchdog = async {
                if heart_beat.recv_timeout.is_zero() {
                    std::future::pending::<()>().await
                } else {
                    tokio::time::sleep_until(last_activity + heart_beat.recv_timeout).await
                }
            };
            let heart_beat_due = async {
                match send_tick.as_mut() {
                    Some(tick) => {
                        tick.tick().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("session cancelled, closing websocket");
                    let _ = ws.close(None).await;
                    return Ok(());
                }
                _ = watchdog => {
                    return Err(GatewayError::transport(format!(
                        "no server activity within {} ms",
                        heart_beat.recv_timeout.as_millis()
                    )));
                }
                _ = heart_beat_due => {
                    ws.send(Message::Text("\n".into()))
                        .await
                        .map_err(|e| GatewayError::transport(format!("send heart-beat: {e}")))?;
                }
                incoming = ws.next() => {
                    match incoming {
                        None => return Err(GatewayError::transport("websocket stream ended")),
                        Some(Err(e)) => {
                            return Err(GatewayError::transport(format!("websocket read: {e}")))
                        }
                        Some(Ok(message)) => {
                            last_activity = Instant::now();
                            if let Some(body) = self.handle_message(message)? {
                                self.forward_body(body).await?;
                            }
                        }
                    }
                }
            }
        }
    }

    /// The ingest adapter: blocking send of a non-empty body onto the raw
    /// channel. A closed channel means the pipeline is shutting down.
    async fn forward_body(&self, body: Vec<u8>) -> Result<()> {
        if body.is_empty() {
            return Ok(());
        }
        if self.raw_tx.send(body).await.is_err() {
            return Err(GatewayError::transport("raw channel closed"));
        }
        Ok(())
    }

    fn handle_message(&self, message: Message) -> Result<Option<Vec<u8>>> {
        match message {
            Message::Text(text) => self.handle_frame(text.as_bytes()),
            Message::Binary(data) => self.handle_frame(&data),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(None),
            Message::Close(_) => Err(GatewayError::transport("server closed the connection")),
        }
    }

    fn handle_frame(&self, raw: &[u8]) -> Result<Option<Vec<u8>>> {
        match Frame::decode(raw)? {
            None => Ok(None), // server heart-beat
            Some(frame) => match frame.command.as_str() {
                command::MESSAGE => Ok(Some(frame.body)),
                command::ERROR => Err(GatewayError::protocol(format!(
                    "server error frame: {}",
                    error_detail(&frame)
                ))),
                other => {
                    tracing::trace!(command = other, "ignoring frame");
                    Ok(None)
                }
            },
        }
    }

    /// Next non-heart-beat frame within `timeout`.
    async fn next_frame(&self, ws: &mut WsStream, timeout: Duration) -> Result<Frame> {
        let deadline = Instant::now() + timeout;
        loop {
            let incoming = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Err(GatewayError::transport("cancelled during handshake"));
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(GatewayError::protocol("timed out waiting for server frame"));
                }
                incoming = ws.next() => incoming,
            };
            let message = match incoming {
                None => return Err(GatewayError::transport("websocket stream ended")),
                Some(Err(e)) => {
                    return Err(GatewayError::transport(format!("websocket read: {e}")))
                }
                Some(Ok(message)) => message,
            };
            let raw = match message {
                Message::Text(text) => text.as_bytes().to_vec(),
                Message::Binary(data) => data.to_vec(),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
                Message::Close(_) => {
                    return Err(GatewayError::transport("server closed the connection"))
                }
            };
            if let Some(frame) = Frame::decode(&raw)? {
                return Ok(frame);
            }
        }
    }
}

/// Append `token=Bearer%20<token>` to the WebSocket URL query.
fn url_with_token(wss_url: &str, token: &str) -> String {
    let separator = if wss_url.contains('?') { '&' } else { '?' };
    format!("{wss_url}{separator}token=Bearer%20{token}")
}

fn header_value(value: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(value).ok()
}

fn error_detail(frame: &Frame) -> String {
    frame
        .get("message")
        .map(str::to_string)
        .unwrap_or_else(|| String::from_utf8_lossy(&frame.body).into_owned())
}

async fn send_frame(ws: &mut WsStream, frame: &Frame) -> Result<()> {
    let encoded = String::from_utf8(frame.encode())
        .map_err(|_| GatewayError::protocol("frame is not valid utf-8"))?;
    ws.send(Message::Text(encoded.into()))
        .await
        .map_err(|e| GatewayError::transport(format!("send {}: {e}", frame.command)))
}
