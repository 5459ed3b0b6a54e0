use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that can occur when using the realtime client.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// WebSocket protocol error (connection failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Malformed Engine.IO / Socket.IO packet
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error (malformed endpoint URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Rejected client options
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Attempted operation while not connected to the server
    #[error("Not connected")]
    NotConnected,

    /// The background driver task has stopped
    #[error("Client has been shut down")]
    ClientClosed,
}

/// Convenience type alias for `Result<T, RealtimeError>`.
pub type Result<T> = std::result::Result<T, RealtimeError>;

/// Why a connect handshake did not produce a live link.
///
/// The state machine only cares about the distinction between the two: an
/// authentication rejection earns one token refresh per reconnect cycle, every
/// other failure goes straight to backoff.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectFailure {
    /// The backend refused the access token
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Network, timeout or protocol failure
    #[error("network failure: {0}")]
    Network(String),
}

impl ConnectFailure {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Auth(m) | Self::Network(m) => m,
        }
    }
}

/// Errors from exchanging a refresh token for a new credential.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// No refresh token is available locally
    #[error("no refresh token available")]
    MissingRefreshToken,

    /// The backend rejected the refresh token; the session is over
    #[error("refresh token rejected: {0}")]
    Rejected(String),

    /// Transport or server failure while refreshing
    #[error("token refresh failed: {0}")]
    Failed(String),
}

impl From<reqwest::Error> for RefreshError {
    fn from(err: reqwest::Error) -> Self {
        Self::Failed(err.to_string())
    }
}
