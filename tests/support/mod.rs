#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use conference_realtime::transport::{ConnectRequest, Inbound, Outbound, TransportLink};
use conference_realtime::{
    ConnectFailure, Connector, Credential, CredentialStore, RealtimeClient, RealtimeClientBuilder,
    RealtimeClientOptions, RealtimeEvent, RefreshError,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// What the fake backend does with one connect attempt
#[derive(Debug, Clone)]
pub enum Step {
    Accept,
    AcceptAfter(Duration),
    Fail(ConnectFailure),
    /// Never completes
    Hang,
}

pub fn auth_rejected() -> Step {
    Step::Fail(ConnectFailure::Auth("jwt expired".to_string()))
}

pub fn refused() -> Step {
    Step::Fail(ConnectFailure::Network("connection refused".to_string()))
}

/// Server side of an accepted link
pub struct ServerLink {
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
    pub inbound: mpsc::UnboundedSender<Inbound>,
}

impl ServerLink {
    /// Frames the client has sent so far
    pub fn drain(&mut self) -> Vec<Outbound> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }

    pub fn push_event(&self, name: &str, payload: Value) {
        let _ = self.inbound.send(Inbound::Event {
            name: name.to_string(),
            payload,
        });
    }

    pub fn drop_connection(&self, reason: &str) {
        let _ = self.inbound.send(Inbound::Closed {
            reason: reason.to_string(),
        });
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub at: Instant,
    pub access_token: String,
}

/// In-memory backend driven by a script of steps.
///
/// Attempts past the end of the script are refused.
pub struct FakeConnector {
    script: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<Call>>,
    links_tx: mpsc::UnboundedSender<ServerLink>,
    links_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ServerLink>>,
}

impl FakeConnector {
    pub fn new(script: impl IntoIterator<Item = Step>) -> Arc<Self> {
        let (links_tx, links_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            links_tx,
            links_rx: tokio::sync::Mutex::new(links_rx),
        })
    }

    pub fn push(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Waits for the next accepted link
    pub async fn next_link(&self) -> ServerLink {
        self.links_rx
            .lock()
            .await
            .recv()
            .await
            .expect("connector dropped")
    }

    pub async fn try_next_link(&self) -> Option<ServerLink> {
        self.links_rx.lock().await.try_recv().ok()
    }

    fn accept(&self) -> TransportLink {
        let (link, outbound, inbound) = TransportLink::pair();
        let _ = self.links_tx.send(ServerLink { outbound, inbound });
        link
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, request: ConnectRequest) -> Result<TransportLink, ConnectFailure> {
        self.calls.lock().unwrap().push(Call {
            at: Instant::now(),
            access_token: request.access_token,
        });
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Accept) => Ok(self.accept()),
            Some(Step::AcceptAfter(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(self.accept())
            }
            Some(Step::Fail(failure)) => Err(failure),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(ConnectFailure::Network("connection refused".to_string())),
        }
    }
}

/// Credential store whose refreshes either rotate the access token or are rejected
pub struct CountingCredentials {
    current: Mutex<Option<Credential>>,
    refreshes: AtomicUsize,
    reject: bool,
    // Access tokens handed out by the next refreshes, before falling back to `access-{n}`
    queued: Mutex<VecDeque<String>>,
}

impl CountingCredentials {
    pub fn new(access_token: &str) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(Some(Credential::new(access_token, "refresh-0"))),
            refreshes: AtomicUsize::new(0),
            reject: false,
            queued: Mutex::new(VecDeque::new()),
        })
    }

    pub fn rejecting(access_token: &str) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(Some(Credential::new(access_token, "refresh-0"))),
            refreshes: AtomicUsize::new(0),
            reject: true,
            queued: Mutex::new(VecDeque::new()),
        })
    }

    pub fn signed_out() -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(None),
            refreshes: AtomicUsize::new(0),
            reject: false,
            queued: Mutex::new(VecDeque::new()),
        })
    }

    /// Refreshes hand out `refreshed` in order
    pub fn rotating(access_token: &str, refreshed: impl IntoIterator<Item = String>) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(Some(Credential::new(access_token, "refresh-0"))),
            refreshes: AtomicUsize::new(0),
            reject: false,
            queued: Mutex::new(refreshed.into_iter().collect()),
        })
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for CountingCredentials {
    fn get(&self) -> Option<Credential> {
        self.current.lock().unwrap().clone()
    }

    async fn refresh(&self) -> Result<Credential, RefreshError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject {
            *self.current.lock().unwrap() = None;
            return Err(RefreshError::Rejected("refresh token revoked".to_string()));
        }
        let access = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("access-{n}"));
        let credential = Credential::new(access, format!("refresh-{n}"));
        *self.current.lock().unwrap() = Some(credential.clone());
        Ok(credential)
    }
}

/// Options with a 500ms base delay so backoff steps are easy to read
pub fn fast_options() -> RealtimeClientOptions {
    RealtimeClientOptions {
        reconnect: conference_realtime::ReconnectPolicy::new(
            5,
            Duration::from_millis(500),
            Duration::from_millis(5000),
        ),
        ..Default::default()
    }
}

pub fn client_with(
    connector: Arc<FakeConnector>,
    credentials: Arc<dyn CredentialStore>,
    options: RealtimeClientOptions,
) -> RealtimeClient {
    RealtimeClientBuilder::new("http://localhost:4000", options, credentials)
        .expect("valid options")
        .connector(connector)
        .build()
}

/// Collects every event of the given kind
pub fn record(
    client: &RealtimeClient,
    kind: impl Into<conference_realtime::EventKind>,
) -> Arc<Mutex<Vec<RealtimeEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.on(kind, move |event| sink.lock().unwrap().push(event.clone()));
    seen
}

/// Lets the driver work through everything already queued
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Seconds since the Unix epoch
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// Unsigned JWT carrying `claims`
pub fn jwt(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{body}.signature")
}
