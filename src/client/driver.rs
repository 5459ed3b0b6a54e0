use super::RealtimeClientOptions;
use super::machine::{ConnectionMachine, Effect, Input};
use super::state::{ConnectionState, ConnectionStatus};
use super::subscriptions::SubscriptionSet;
use crate::auth::{Claims, CredentialStore};
use crate::infrastructure::TaskManager;
use crate::messaging::{ListenerRegistry, MessageRouter, RealtimeEvent};
use crate::transport::{ConnectRequest, Connector, Inbound, Outbound, TransportLink};
use crate::types::{
    ConnectFailure, RealtimeError, RefreshError, Result, TOKEN_REFRESH_WINDOW, USER_ROOM_PREFIX,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Messages processed by the driver task, one at a time.
///
/// The first group comes from [`RealtimeClient`](super::RealtimeClient)
/// handles; the rest is feedback from tasks the driver spawned itself.
pub(crate) enum Command {
    Lifecycle {
        input: Input,
        ack: oneshot::Sender<()>,
    },
    Subscribe {
        topic: String,
        ack: oneshot::Sender<()>,
    },
    Unsubscribe {
        topic: String,
        ack: oneshot::Sender<()>,
    },
    ClearSubscriptions {
        ack: oneshot::Sender<()>,
    },
    ListSubscriptions {
        reply: oneshot::Sender<Vec<String>>,
    },
    Emit {
        event: String,
        data: Value,
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        ack: oneshot::Sender<()>,
    },
    Handshake {
        generation: u64,
        result: std::result::Result<TransportLink, ConnectFailure>,
    },
    Refreshed {
        generation: u64,
        result: std::result::Result<(), RefreshError>,
    },
    RetryElapsed {
        generation: u64,
    },
    Inbound {
        generation: u64,
        frame: Inbound,
    },
}

struct ActiveLink {
    generation: u64,
    outbound: mpsc::UnboundedSender<Outbound>,
    reader: JoinHandle<()>,
}

/// Owns the connection machine and executes its effects.
///
/// Every state change happens on this task, so callers never observe a
/// half-applied transition and no two connect attempts can overlap.
pub(crate) struct Driver {
    machine: ConnectionMachine,
    subscriptions: SubscriptionSet,
    join_user_room: bool,
    // Room added from the token claims, if any
    user_room: Option<String>,

    link: Option<ActiveLink>,
    // Handshake result awaiting the machine's verdict
    pending_link: Option<TransportLink>,
    tasks: TaskManager,
    // Client events that must follow the status update of the same step
    deferred: Vec<RealtimeEvent>,

    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialStore>,
    router: MessageRouter,
    status_tx: watch::Sender<ConnectionStatus>,

    commands: mpsc::UnboundedReceiver<Command>,
    feedback: mpsc::WeakUnboundedSender<Command>,
}

impl Driver {
    pub(crate) fn new(
        options: &RealtimeClientOptions,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialStore>,
        listeners: Arc<ListenerRegistry>,
        status_tx: watch::Sender<ConnectionStatus>,
        commands: mpsc::UnboundedReceiver<Command>,
        feedback: mpsc::WeakUnboundedSender<Command>,
    ) -> Self {
        Self {
            machine: ConnectionMachine::new(options.reconnect),
            subscriptions: SubscriptionSet::new(),
            join_user_room: options.join_user_room,
            user_room: None,
            link: None,
            pending_link: None,
            tasks: TaskManager::new(),
            deferred: Vec::new(),
            connector,
            credentials,
            router: MessageRouter::new(listeners),
            status_tx,
            commands,
            feedback,
        }
    }

    /// Runs until shutdown or until every client handle is dropped
    pub(crate) async fn run(mut self) {
        tracing::debug!("Realtime driver started");
        while let Some(command) = self.commands.recv().await {
            if !self.handle_command(command) {
                break;
            }
        }
        self.tasks.abort_all();
        self.close_link();
        tracing::debug!("Realtime driver finished");
    }

    /// Returns `false` once the driver should stop
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Lifecycle { input, ack } => {
                self.apply(input);
                let _ = ack.send(());
            }
            Command::Subscribe { topic, ack } => {
                self.subscribe(topic);
                let _ = ack.send(());
            }
            Command::Unsubscribe { topic, ack } => {
                self.unsubscribe(&topic);
                let _ = ack.send(());
            }
            Command::ClearSubscriptions { ack } => {
                let topics = self.subscriptions.to_vec();
                self.subscriptions.clear();
                if self.machine.state() == ConnectionState::Connected {
                    for topic in topics {
                        self.send(Outbound::Leave(topic));
                    }
                }
                let _ = ack.send(());
            }
            Command::ListSubscriptions { reply } => {
                let _ = reply.send(self.subscriptions.to_vec());
            }
            Command::Emit { event, data, reply } => {
                let _ = reply.send(self.emit(event, data));
            }
            Command::Shutdown { ack } => {
                tracing::info!("Shutting down realtime client");
                self.apply(Input::Disconnect);
                let _ = ack.send(());
                return false;
            }
            Command::Handshake { generation, result } => self.on_handshake(generation, result),
            Command::Refreshed { generation, result } => match result {
                Ok(()) => {
                    tracing::info!("Access token refreshed, retrying connect");
                    self.apply(Input::RefreshSucceeded { generation });
                }
                Err(e) => {
                    tracing::warn!("Token refresh failed: {}", e);
                    if let RefreshError::Rejected(reason) = &e {
                        self.deferred.push(RealtimeEvent::SessionExpired {
                            reason: reason.clone(),
                        });
                    }
                    self.apply(Input::RefreshFailed {
                        generation,
                        reason: e.to_string(),
                    });
                }
            },
            Command::RetryElapsed { generation } => self.apply(Input::RetryElapsed { generation }),
            Command::Inbound { generation, frame } => self.on_inbound(generation, frame),
        }
        true
    }

    /// Feed one input to the machine, run its effects, then publish the status.
    ///
    /// The watch channel is updated before the caller is acked, so a
    /// `connect()` that waits on it sees the outcome of its own request.
    fn apply(&mut self, input: Input) {
        let before = self.machine.status();
        let effects = self.machine.handle(input);
        for effect in effects {
            self.execute(effect);
        }

        let after = self.machine.status();
        if after != before {
            if after.state != before.state {
                tracing::info!(
                    "Connection state: {} -> {} (attempt {})",
                    before.state,
                    after.state,
                    after.attempt
                );
            }
            self.status_tx.send_replace(after.clone());
            self.router.publish(RealtimeEvent::StatusChanged(after));
        }
        for event in std::mem::take(&mut self.deferred) {
            self.router.publish(event);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::OpenTransport { generation } => self.open_transport(generation),
            Effect::ActivateTransport => self.activate_transport(),
            Effect::CloseTransport => self.close_link(),
            Effect::CancelPending => self.tasks.abort_all(),
            Effect::ScheduleRetry { generation, delay } => {
                tracing::info!(
                    "Reconnecting in {}ms (attempt {})",
                    delay.as_millis(),
                    self.machine.attempt()
                );
                let feedback = self.feedback.clone();
                self.tasks.spawn(async move {
                    tokio::time::sleep(delay).await;
                    notify(&feedback, Command::RetryElapsed { generation });
                });
            }
            Effect::RefreshCredentials { generation } => {
                tracing::info!("Access token rejected, refreshing credentials");
                let credentials = Arc::clone(&self.credentials);
                let feedback = self.feedback.clone();
                self.tasks.spawn(async move {
                    let result = credentials.refresh().await.map(|_| ());
                    notify(&feedback, Command::Refreshed { generation, result });
                });
            }
            Effect::ReplaySubscriptions => {
                let topics = self.subscriptions.to_vec();
                if !topics.is_empty() {
                    tracing::info!("Re-joining {} topic(s)", topics.len());
                }
                for topic in topics {
                    self.send(Outbound::Join(topic));
                }
            }
            Effect::Exhausted {
                attempts,
                last_error,
            } => {
                tracing::error!(
                    "Giving up after {} failed attempts; connection paused until reset",
                    attempts
                );
                self.deferred.push(RealtimeEvent::RetriesExhausted {
                    attempts,
                    last_error,
                });
            }
        }
    }

    fn open_transport(&mut self, generation: u64) {
        let Some(credential) = self.credentials.get() else {
            tracing::warn!("No access token available, cannot connect");
            self.fail_locally(generation, "no access token available");
            return;
        };

        let claims = credential.claims();
        if let Some(claims) = &claims {
            if claims.is_expired() {
                tracing::debug!("Access token expired locally, skipping handshake");
                self.fail_locally(generation, "access token expired");
                return;
            }
            // Past the cycle's refresh, a token that is still valid is dialed as is
            if !self.machine.has_refreshed()
                && claims.expires_within(Duration::from_secs(TOKEN_REFRESH_WINDOW))
            {
                tracing::debug!("Access token expires soon, refreshing before handshake");
                self.fail_locally(generation, "access token about to expire");
                return;
            }
        }

        if self.join_user_room
            && let Some(user_id) = claims.as_ref().and_then(Claims::user_id)
        {
            self.track_user_room(format!("{USER_ROOM_PREFIX}{user_id}"));
        }

        tracing::info!("Opening realtime connection");
        let connector = Arc::clone(&self.connector);
        let feedback = self.feedback.clone();
        let request = ConnectRequest {
            access_token: credential.access_token,
        };
        self.tasks.spawn(async move {
            let result = connector.connect(request).await;
            notify(&feedback, Command::Handshake { generation, result });
        });
    }

    /// Adds the room of the token's user once, replacing the room of a previous user
    fn track_user_room(&mut self, topic: String) {
        if self.user_room.as_deref() == Some(topic.as_str()) {
            return;
        }
        if let Some(previous) = self.user_room.take()
            && self.subscriptions.remove(&previous)
        {
            tracing::debug!("Dropped user room {}", previous);
        }
        if self.subscriptions.insert(topic.clone()) {
            tracing::debug!("Added user room {}", topic);
        }
        self.user_room = Some(topic);
    }

    /// Report an auth failure without touching the network
    fn fail_locally(&self, generation: u64, reason: &str) {
        notify(
            &self.feedback,
            Command::Handshake {
                generation,
                result: Err(ConnectFailure::Auth(reason.to_string())),
            },
        );
    }

    fn on_handshake(
        &mut self,
        generation: u64,
        result: std::result::Result<TransportLink, ConnectFailure>,
    ) {
        match result {
            Ok(link) => {
                self.pending_link = Some(link);
                self.apply(Input::HandshakeSucceeded { generation });
                // Not adopted: the attempt was superseded
                if let Some(stale) = self.pending_link.take() {
                    tracing::debug!("Closing link of superseded attempt {}", generation);
                    let _ = stale.outbound.send(Outbound::Close);
                }
            }
            Err(failure) => {
                tracing::warn!("Connect attempt failed: {}", failure);
                self.apply(Input::HandshakeFailed {
                    generation,
                    failure,
                });
            }
        }
    }

    fn activate_transport(&mut self) {
        let Some(link) = self.pending_link.take() else {
            tracing::error!("No pending link to activate");
            return;
        };
        self.close_link();

        let generation = self.machine.generation();
        let TransportLink {
            outbound,
            mut inbound,
        } = link;
        let feedback = self.feedback.clone();

        let reader = tokio::spawn(async move {
            while let Some(frame) = inbound.recv().await {
                let closed = matches!(frame, Inbound::Closed { .. });
                if !notify(&feedback, Command::Inbound { generation, frame }) || closed {
                    return;
                }
            }
            notify(
                &feedback,
                Command::Inbound {
                    generation,
                    frame: Inbound::Closed {
                        reason: "transport dropped".to_string(),
                    },
                },
            );
        });

        tracing::info!("Connected to realtime server");
        self.link = Some(ActiveLink {
            generation,
            outbound,
            reader,
        });
    }

    fn close_link(&mut self) {
        if let Some(link) = self.link.take() {
            tracing::debug!("Closing realtime link {}", link.generation);
            let _ = link.outbound.send(Outbound::Close);
            link.reader.abort();
        }
    }

    fn on_inbound(&mut self, generation: u64, frame: Inbound) {
        if self.link.as_ref().map(|l| l.generation) != Some(generation) {
            tracing::debug!("Dropping frame from stale link {}", generation);
            return;
        }
        match frame {
            Inbound::Event { name, payload } => self.router.route(&name, payload),
            Inbound::Closed { reason } => {
                tracing::warn!("Realtime connection lost: {}", reason);
                self.apply(Input::TransportClosed { generation, reason });
            }
        }
    }

    fn subscribe(&mut self, topic: String) {
        if !self.subscriptions.insert(topic.clone()) {
            return;
        }
        tracing::debug!("Subscribed to {}", topic);
        if self.machine.state() == ConnectionState::Connected {
            self.send(Outbound::Join(topic));
        }
    }

    fn unsubscribe(&mut self, topic: &str) {
        if !self.subscriptions.remove(topic) {
            return;
        }
        tracing::debug!("Unsubscribed from {}", topic);
        if self.machine.state() == ConnectionState::Connected {
            self.send(Outbound::Leave(topic.to_string()));
        }
    }

    fn emit(&mut self, event: String, data: Value) -> Result<()> {
        if self.machine.state() != ConnectionState::Connected || self.link.is_none() {
            return Err(RealtimeError::NotConnected);
        }
        tracing::debug!("Emitting {}", event);
        self.send(Outbound::Emit { event, data });
        Ok(())
    }

    fn send(&self, frame: Outbound) {
        if let Some(link) = &self.link
            && link.outbound.send(frame).is_err()
        {
            tracing::warn!("Transport is gone, dropping outbound frame");
        }
    }
}

/// Post a command back to the driver; `false` if it has stopped
fn notify(feedback: &mpsc::WeakUnboundedSender<Command>, command: Command) -> bool {
    match feedback.upgrade() {
        Some(tx) => tx.send(command).is_ok(),
        None => false,
    }
}
