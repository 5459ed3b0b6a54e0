// Transport module - The wire beneath the connection state machine
pub mod protocol;
mod websocket;

pub use websocket::{SocketIoConfig, SocketIoConnector};

use crate::types::ConnectFailure;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// Parameters for a single connect handshake
#[derive(Clone)]
pub struct ConnectRequest {
    /// Access token presented at connect time; never renegotiated mid-connection
    pub access_token: String,
}

impl std::fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("access_token", &format_args!("<{} bytes>", self.access_token.len()))
            .finish()
    }
}

/// Client -> server frames
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Ask the backend to route a topic's events to this client
    Join(String),
    /// Stop routing a topic
    Leave(String),
    /// Application event
    Emit { event: String, data: Value },
    /// Close the link gracefully
    Close,
}

/// Server -> client frames
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Named application event, delivered in wire order
    Event { name: String, payload: Value },
    /// The link is gone; nothing follows
    Closed { reason: String },
}

/// A live connection, exposed as a pair of channels.
///
/// The transport owns the socket in its own task; dropping `outbound`
/// or sending [`Outbound::Close`] tears it down.
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<Outbound>,
    pub inbound: mpsc::UnboundedReceiver<Inbound>,
}

impl TransportLink {
    /// Create a link plus the transport-side ends of its channels
    pub fn pair() -> (
        Self,
        mpsc::UnboundedReceiver<Outbound>,
        mpsc::UnboundedSender<Inbound>,
    ) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        (
            Self {
                outbound: outbound_tx,
                inbound: inbound_rx,
            },
            outbound_rx,
            inbound_tx,
        )
    }
}

/// Opens authenticated links to the backend event channel.
///
/// Implementations classify failures: a rejected token must come back as
/// [`ConnectFailure::Auth`] so the client can refresh it once.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, request: ConnectRequest) -> Result<TransportLink, ConnectFailure>;
}
