use super::protocol::{EnginePacket, OpenHandshake, SocketPacket, connect_error_message};
use super::{ConnectRequest, Connector, Inbound, Outbound, TransportLink};
use crate::infrastructure::HeartbeatMonitor;
use crate::types::{
    AUTH_FAILURE_MARKERS, ConnectFailure, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PATH,
    ENGINE_IO_VERSION, RealtimeError, Result, TRANSPORT_WEBSOCKET, room_events,
};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Settings for the Socket.IO websocket transport
#[derive(Debug, Clone)]
pub struct SocketIoConfig {
    /// Mount path of the Socket.IO server (`/ws` on the conference backend)
    pub path: String,
    /// Upper bound for the websocket upgrade plus namespace handshake
    pub connect_timeout: Duration,
    pub join_event: String,
    pub leave_event: String,
}

impl Default for SocketIoConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT),
            join_event: room_events::JOIN.to_string(),
            leave_event: room_events::LEAVE.to_string(),
        }
    }
}

/// Connects to a Socket.IO v4 server over a single websocket
#[derive(Debug, Clone)]
pub struct SocketIoConnector {
    url: Url,
    config: SocketIoConfig,
}

impl SocketIoConnector {
    /// `endpoint` is the backend origin, e.g. `http://localhost:4000`
    pub fn new(endpoint: &str, config: SocketIoConfig) -> Result<Self> {
        let url = build_socket_url(endpoint, &config.path)?;
        Ok(Self { url, config })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn handshake(&self, token: &str) -> std::result::Result<(WsStream, OpenHandshake), ConnectFailure> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(classify_ws_error)?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ConnectFailure::Auth(format!("access token is not a valid header: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        tracing::info!("Connecting to {}", self.url);
        let (mut ws, _response) = connect_async(request).await.map_err(classify_ws_error)?;

        let open = loop {
            match next_engine_packet(&mut ws).await? {
                EnginePacket::Open(open) => break open,
                other => tracing::debug!("Ignoring {:?} before open", other),
            }
        };
        tracing::debug!("Engine.IO session {} opened", open.sid);

        let auth = serde_json::json!({ "token": token });
        send_packet(&mut ws, &SocketPacket::connect(Some(auth)))
            .await
            .map_err(|e| ConnectFailure::Network(e.to_string()))?;

        loop {
            match next_engine_packet(&mut ws).await? {
                EnginePacket::Ping(data) => {
                    send_engine(&mut ws, &EnginePacket::Pong(data))
                        .await
                        .map_err(|e| ConnectFailure::Network(e.to_string()))?;
                }
                EnginePacket::Message(body) => {
                    match SocketPacket::decode(&body)
                        .map_err(|e| ConnectFailure::Network(e.to_string()))?
                    {
                        SocketPacket::Connect { .. } => break,
                        SocketPacket::ConnectError { data, .. } => {
                            let _ = ws.close(None).await;
                            return Err(classify_connect_error(&connect_error_message(&data)));
                        }
                        other => tracing::debug!("Ignoring {:?} before namespace connect", other),
                    }
                }
                EnginePacket::Close => {
                    return Err(ConnectFailure::Network(
                        "server closed the session during handshake".to_string(),
                    ));
                }
                _ => {}
            }
        }

        Ok((ws, open))
    }
}

#[async_trait]
impl Connector for SocketIoConnector {
    async fn connect(&self, request: ConnectRequest) -> std::result::Result<TransportLink, ConnectFailure> {
        let (ws, open) = tokio::time::timeout(
            self.config.connect_timeout,
            self.handshake(&request.access_token),
        )
        .await
        .map_err(|_| ConnectFailure::Network("connect handshake timed out".to_string()))??;

        let (link, outbound_rx, inbound_tx) = TransportLink::pair();
        let monitor = HeartbeatMonitor::from_millis(open.ping_interval, open.ping_timeout);
        let config = self.config.clone();
        tokio::spawn(run_session(ws, outbound_rx, inbound_tx, monitor, config));

        tracing::info!("Connected to WebSocket server");
        Ok(link)
    }
}

/// Owns the socket for the lifetime of one link
async fn run_session(
    mut ws: WsStream,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    inbound: mpsc::UnboundedSender<Inbound>,
    mut monitor: HeartbeatMonitor,
    config: SocketIoConfig,
) {
    tracing::info!("Starting read task");
    let reason = loop {
        tokio::select! {
            frame = ws.next() => {
                let Some(frame) = frame else {
                    break "websocket stream ended".to_string();
                };
                monitor.touch();
                match frame {
                    Ok(Message::Text(text)) => {
                        tracing::debug!("Received text message: {}", text);
                        match handle_text(&mut ws, &text, &inbound).await {
                            Ok(None) => {}
                            Ok(Some(reason)) => break reason,
                            Err(e) => tracing::error!("Failed to handle frame: {} - Raw: {}", e, text),
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        if let Some(close_frame) = frame {
                            tracing::warn!(
                                "Server closed connection: code={:?}, reason='{}'",
                                close_frame.code,
                                close_frame.reason
                            );
                        } else {
                            tracing::warn!("Server closed connection without close frame");
                        }
                        break "server closed the websocket".to_string();
                    }
                    Ok(Message::Binary(data)) => {
                        tracing::warn!("Received unexpected binary message ({} bytes)", data.len());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!("WebSocket read error: {}", e);
                        break format!("websocket read error: {}", e);
                    }
                }
            }
            command = outbound.recv() => {
                let packet = match command {
                    Some(Outbound::Join(topic)) => {
                        SocketPacket::event(config.join_event.clone(), topic.into())
                    }
                    Some(Outbound::Leave(topic)) => {
                        SocketPacket::event(config.leave_event.clone(), topic.into())
                    }
                    Some(Outbound::Emit { event, data }) => SocketPacket::event(event, data),
                    Some(Outbound::Close) | None => {
                        let _ = send_packet(&mut ws, &SocketPacket::disconnect()).await;
                        let _ = ws.close(None).await;
                        tracing::info!("Read task finished");
                        return;
                    }
                };
                if let Err(e) = send_packet(&mut ws, &packet).await {
                    tracing::error!("Failed to send frame: {}", e);
                    break format!("websocket write error: {}", e);
                }
            }
            _ = tokio::time::sleep_until(monitor.deadline()) => {
                tracing::warn!("No ping from server within the liveness window");
                break "ping timeout".to_string();
            }
        }
    };

    let _ = ws.close(None).await;
    let _ = inbound.send(Inbound::Closed { reason });
    tracing::info!("Read task finished");
}

/// Returns `Some(reason)` when the frame ends the session
async fn handle_text(
    ws: &mut WsStream,
    text: &str,
    inbound: &mpsc::UnboundedSender<Inbound>,
) -> Result<Option<String>> {
    match EnginePacket::decode(text)? {
        EnginePacket::Ping(data) => {
            send_engine(ws, &EnginePacket::Pong(data)).await?;
        }
        EnginePacket::Close => return Ok(Some("server closed the session".to_string())),
        EnginePacket::Message(body) => match SocketPacket::decode(&body)? {
            SocketPacket::Event { name, mut args, .. } => {
                let payload = match args.len() {
                    0 => serde_json::Value::Null,
                    1 => args.remove(0),
                    _ => serde_json::Value::Array(args),
                };
                let _ = inbound.send(Inbound::Event { name, payload });
            }
            SocketPacket::Disconnect { .. } => {
                return Ok(Some("server disconnected the namespace".to_string()));
            }
            other => tracing::debug!("Ignoring {:?}", other),
        },
        _ => {}
    }
    Ok(None)
}

async fn next_engine_packet(ws: &mut WsStream) -> std::result::Result<EnginePacket, ConnectFailure> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return EnginePacket::decode(&text)
                    .map_err(|e| ConnectFailure::Network(e.to_string()));
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(ConnectFailure::Network(
                    "connection closed during handshake".to_string(),
                ));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(classify_ws_error(e)),
        }
    }
}

async fn send_engine(ws: &mut WsStream, packet: &EnginePacket) -> Result<()> {
    ws.send(Message::Text(packet.encode()?.into())).await?;
    Ok(())
}

async fn send_packet(ws: &mut WsStream, packet: &SocketPacket) -> Result<()> {
    ws.send(Message::Text(packet.to_frame()?.into())).await?;
    Ok(())
}

/// `ws(s)://host{path}/?EIO=4&transport=websocket` out of an http(s) or ws(s) origin
fn build_socket_url(endpoint: &str, path: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(RealtimeError::InvalidConfig(format!(
                "unsupported endpoint scheme '{}'",
                other
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| RealtimeError::InvalidConfig("cannot rewrite endpoint scheme".to_string()))?;

    let path = format!("/{}/", path.trim_matches('/'));
    url.set_path(if path == "//" { "/" } else { &path });
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair("EIO", ENGINE_IO_VERSION)
        .append_pair("transport", TRANSPORT_WEBSOCKET);
    Ok(url)
}

fn classify_ws_error(err: WsError) -> ConnectFailure {
    match err {
        WsError::Http(response)
            if response.status() == StatusCode::UNAUTHORIZED
                || response.status() == StatusCode::FORBIDDEN =>
        {
            ConnectFailure::Auth(format!("upgrade rejected with {}", response.status()))
        }
        other => ConnectFailure::Network(other.to_string()),
    }
}

fn classify_connect_error(message: &str) -> ConnectFailure {
    let lowered = message.to_lowercase();
    if AUTH_FAILURE_MARKERS.iter().any(|m| lowered.contains(m)) {
        ConnectFailure::Auth(message.to_string())
    } else {
        ConnectFailure::Network(message.to_string())
    }
}
