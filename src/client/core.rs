use super::driver::Command;
use super::machine::Input;
use super::state::ConnectionStatus;
use super::{RealtimeClientBuilder, RealtimeClientOptions};
use crate::auth::CredentialStore;
use crate::messaging::{EventKind, ListenerId, ListenerRegistry, RealtimeEvent};
use crate::types::{RealtimeError, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// The single realtime connection of the app.
///
/// `RealtimeClient` is a cheap, cloneable handle. All clones drive the same
/// connection: one background task owns the socket, the reconnect policy,
/// the token refresh and the subscribed topics, and applies requests from
/// every handle in the order they arrive.
///
/// # Example
///
/// ```no_run
/// use conference_realtime::{
///     Credential, EventKind, InMemoryCredentials, RealtimeClient, RealtimeClientOptions,
/// };
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let credentials = InMemoryCredentials::fixed(Credential::new("access", "refresh"));
/// let client = RealtimeClient::new(
///     "http://localhost:4000",
///     RealtimeClientOptions::default(),
///     Arc::new(credentials),
/// )?;
///
/// client.on(EventKind::Notification, |event| println!("{:?}", event));
/// client.subscribe("conference:7").await?;
///
/// let status = client.connect().await?;
/// println!("realtime is {}", status.state);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    pub(crate) commands: mpsc::UnboundedSender<Command>,
    pub(crate) status: watch::Receiver<ConnectionStatus>,
    pub(crate) listeners: Arc<ListenerRegistry>,
}

impl RealtimeClient {
    /// Creates a client with the default websocket transport.
    ///
    /// No connection is made until [`connect()`](Self::connect).
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidConfig`] or
    /// [`RealtimeError::UrlParse`] if the endpoint or options are unusable.
    pub fn new(
        endpoint: impl Into<String>,
        options: RealtimeClientOptions,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        Ok(RealtimeClientBuilder::new(endpoint, options, credentials)?.build())
    }

    /// Starts connecting and waits for the outcome.
    ///
    /// Resolves once the connection is established, or once the retry budget
    /// is spent and the client has paused itself. Calling it while a connect
    /// is already in progress joins that attempt instead of opening another.
    ///
    /// The returned status says which it was; a paused result is not an error.
    pub async fn connect(&self) -> Result<ConnectionStatus> {
        self.lifecycle(Input::Connect).await?;
        self.settled().await
    }

    /// Starts connecting without waiting for the outcome
    pub fn request_connect(&self) -> Result<()> {
        let (ack, _) = oneshot::channel();
        self.commands
            .send(Command::Lifecycle {
                input: Input::Connect,
                ack,
            })
            .map_err(|_| RealtimeError::ClientClosed)
    }

    /// Closes the connection and cancels pending retries and refreshes.
    ///
    /// Subscriptions and listeners are kept for the next `connect()`.
    pub async fn disconnect(&self) -> Result<()> {
        self.lifecycle(Input::Disconnect).await
    }

    /// Stops all connection activity until [`reset()`](Self::reset) or
    /// [`connect()`](Self::connect)
    pub async fn pause(&self) -> Result<()> {
        self.lifecycle(Input::Pause).await
    }

    /// Clears the failure count; a paused or reconnecting client starts a
    /// fresh attempt immediately.
    pub async fn reset(&self) -> Result<()> {
        self.lifecycle(Input::Reset).await
    }

    /// Drops the current link and connects again with a fresh retry budget.
    ///
    /// Used after a role change, so the next handshake carries the new token.
    pub async fn force_reconnect(&self) -> Result<ConnectionStatus> {
        self.lifecycle(Input::ForceReconnect).await?;
        self.settled().await
    }

    /// Disconnects and stops the background task. Every clone becomes unusable.
    pub async fn shutdown(&self) -> Result<()> {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Shutdown { ack })?;
        rx.await.map_err(|_| RealtimeError::ClientClosed)
    }

    /// Adds a topic; joined now if connected and after every reconnect
    pub async fn subscribe(&self, topic: impl Into<String>) -> Result<()> {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Subscribe {
            topic: topic.into(),
            ack,
        })?;
        rx.await.map_err(|_| RealtimeError::ClientClosed)
    }

    pub async fn unsubscribe(&self, topic: impl Into<String>) -> Result<()> {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Unsubscribe {
            topic: topic.into(),
            ack,
        })?;
        rx.await.map_err(|_| RealtimeError::ClientClosed)
    }

    /// Forgets every topic (e.g. on logout)
    pub async fn clear_subscriptions(&self) -> Result<()> {
        let (ack, rx) = oneshot::channel();
        self.send(Command::ClearSubscriptions { ack })?;
        rx.await.map_err(|_| RealtimeError::ClientClosed)
    }

    /// Currently subscribed topics in subscription order
    pub async fn subscriptions(&self) -> Result<Vec<String>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ListSubscriptions { reply })?;
        rx.await.map_err(|_| RealtimeError::ClientClosed)
    }

    /// Registers a listener for one kind of event.
    ///
    /// Listeners run on the client's task in registration order; a listener
    /// that panics is logged and skipped.
    pub fn on<F>(&self, kind: impl Into<EventKind>, handler: F) -> ListenerId
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        self.listeners.on(kind.into(), handler)
    }

    /// Removes exactly the listener `id` was issued for
    pub fn off(&self, id: ListenerId) -> bool {
        self.listeners.off(id)
    }

    /// Last published status
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Receiver that wakes on every status change
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_connected()
    }

    /// Sends an application event on the live link.
    ///
    /// # Errors
    ///
    /// [`RealtimeError::NotConnected`] unless the client is connected.
    pub async fn emit(&self, event: &str, data: Value) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Emit {
            event: event.to_string(),
            data,
            reply,
        })?;
        rx.await.map_err(|_| RealtimeError::ClientClosed)?
    }

    async fn lifecycle(&self, input: Input) -> Result<()> {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Lifecycle { input, ack })?;
        rx.await.map_err(|_| RealtimeError::ClientClosed)
    }

    async fn settled(&self) -> Result<ConnectionStatus> {
        let mut status = self.status.clone();
        let settled = status
            .wait_for(|s| s.state.is_settled())
            .await
            .map_err(|_| RealtimeError::ClientClosed)?;
        Ok(settled.clone())
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| RealtimeError::ClientClosed)
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("status", &*self.status.borrow())
            .finish()
    }
}
