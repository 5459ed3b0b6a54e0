// Module declarations
mod builder;
mod core;
mod driver;
mod global;
pub mod machine;
mod state;
mod subscriptions;

// Public API exports
pub use builder::{RealtimeClientBuilder, RealtimeClientOptions};
pub use self::core::RealtimeClient;
pub use global::{global, global_or_init, install_global, teardown_global};
pub use machine::{ConnectionMachine, Effect, Input};
pub use state::{ConnectionState, ConnectionStatus};
pub use subscriptions::SubscriptionSet;
