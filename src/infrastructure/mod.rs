// Infrastructure module - Core background services and utilities
pub mod heartbeat;
pub mod http;
pub mod task_manager;
pub mod timer;

pub use heartbeat::HeartbeatMonitor;
pub use http::{HttpTokenRefresher, http_base};
pub use task_manager::TaskManager;
pub use timer::ReconnectPolicy;
