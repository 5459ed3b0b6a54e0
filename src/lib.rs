//! # Conference Realtime
//!
//! Realtime event channel for the conference app: one authenticated
//! Socket.IO connection per process, with bounded exponential reconnect,
//! a single token refresh per reconnect cycle, topic rooms that survive
//! reconnects, and typed listeners for server events.
//!
//! ## Example
//!
//! ```no_run
//! use conference_realtime::{
//!     Credential, EventKind, InMemoryCredentials, RealtimeClient, RealtimeClientOptions,
//!     RealtimeEvent,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = InMemoryCredentials::fixed(Credential::new("access", "refresh"));
//!     let client = RealtimeClient::new(
//!         "http://localhost:4000",
//!         RealtimeClientOptions {
//!             join_user_room: true,
//!             ..Default::default()
//!         },
//!         Arc::new(credentials),
//!     )?;
//!
//!     client.on(EventKind::RoleChanged, |event| {
//!         if let RealtimeEvent::RoleChanged(change) = event {
//!             println!("new role: {:?}", change.new_role);
//!         }
//!     });
//!
//!     client.connect().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod infrastructure;
pub mod messaging;
pub mod transport;
pub mod types;

pub use auth::{Claims, Credential, CredentialStore, InMemoryCredentials};
pub use client::{
    ConnectionState, ConnectionStatus, RealtimeClient, RealtimeClientBuilder,
    RealtimeClientOptions, global, global_or_init, install_global, teardown_global,
};
pub use infrastructure::{HttpTokenRefresher, ReconnectPolicy};
pub use messaging::{EventKind, ListenerId, MessageKind, OutgoingMessage, RealtimeEvent};
pub use transport::{Connector, SocketIoConnector};
pub use types::{ConnectFailure, RealtimeError, RefreshError, Result};
