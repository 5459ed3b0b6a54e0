use super::RealtimeClient;
use super::driver::Driver;
use super::state::ConnectionStatus;
use crate::auth::CredentialStore;
use crate::infrastructure::ReconnectPolicy;
use crate::messaging::ListenerRegistry;
use crate::transport::{Connector, SocketIoConfig, SocketIoConnector};
use crate::types::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PATH, RealtimeError, Result, room_events};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone)]
pub struct RealtimeClientOptions {
    /// Socket.IO mount path on the backend
    pub path: String,
    /// Handshake timeout in milliseconds
    pub connect_timeout: Option<u64>,
    pub reconnect: ReconnectPolicy,
    /// Event used to join a topic room
    pub join_event: String,
    /// Event used to leave a topic room
    pub leave_event: String,
    /// Subscribe to `user:<id>` from the access token claims on connect
    pub join_user_room: bool,
}

impl Default for RealtimeClientOptions {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            connect_timeout: None,
            reconnect: ReconnectPolicy::default(),
            join_event: room_events::JOIN.to_string(),
            leave_event: room_events::LEAVE.to_string(),
            join_user_room: false,
        }
    }
}

impl RealtimeClientOptions {
    fn socket_config(&self) -> SocketIoConfig {
        SocketIoConfig {
            path: self.path.clone(),
            connect_timeout: Duration::from_millis(
                self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            ),
            join_event: self.join_event.clone(),
            leave_event: self.leave_event.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        self.reconnect.validate()?;
        if self.connect_timeout == Some(0) {
            return Err(RealtimeError::InvalidConfig(
                "connect timeout must be > 0".to_string(),
            ));
        }
        if self.join_event.is_empty() || self.leave_event.is_empty() {
            return Err(RealtimeError::InvalidConfig(
                "room join/leave event names must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for RealtimeClient that handles initialization
pub struct RealtimeClientBuilder {
    options: RealtimeClientOptions,
    credentials: Arc<dyn CredentialStore>,
    connector: Arc<dyn Connector>,
}

impl RealtimeClientBuilder {
    /// Create a new builder.
    ///
    /// `endpoint` is the backend origin (`http://localhost:4000`); the
    /// websocket URL is derived from it and `options.path`.
    pub fn new(
        endpoint: impl Into<String>,
        options: RealtimeClientOptions,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        options.validate()?;
        let connector = SocketIoConnector::new(&endpoint, options.socket_config())?;

        Ok(Self {
            options,
            credentials,
            connector: Arc::new(connector),
        })
    }

    /// Replace the websocket transport, e.g. with an in-memory one in tests
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Build the client and spawn its driver task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> RealtimeClient {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let listeners = Arc::new(ListenerRegistry::new());

        let driver = Driver::new(
            &self.options,
            self.connector,
            self.credentials,
            Arc::clone(&listeners),
            status_tx,
            command_rx,
            command_tx.downgrade(),
        );
        tokio::spawn(driver.run());

        RealtimeClient {
            commands: command_tx,
            status: status_rx,
            listeners,
        }
    }
}
