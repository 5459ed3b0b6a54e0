/// Engine.IO protocol revision spoken by the websocket transport
pub const ENGINE_IO_VERSION: &str = "4";

/// WebSocket transport name in the Engine.IO query string
pub const TRANSPORT_WEBSOCKET: &str = "websocket";

/// Default Socket.IO mount path on the backend
pub const DEFAULT_PATH: &str = "/ws";

/// Root Socket.IO namespace
pub const DEFAULT_NAMESPACE: &str = "/";

/// Default handshake timeout (milliseconds)
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10000;

/// Default reconnect policy
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY: u64 = 1000;
pub const DEFAULT_MAX_DELAY: u64 = 5000;

/// Default Engine.IO liveness window when the server omits it (milliseconds)
pub const DEFAULT_PING_INTERVAL: u64 = 25000;
pub const DEFAULT_PING_TIMEOUT: u64 = 20000;

/// Refresh the access token before dialing when it expires sooner than this (seconds)
pub const TOKEN_REFRESH_WINDOW: u64 = 300;

/// Prefix of the per-user room derived from the access token
pub const USER_ROOM_PREFIX: &str = "user:";

/// Backend REST path for exchanging a refresh token
pub const REFRESH_PATH: &str = "/api/v1/auth/refresh";

/// Substrings of a CONNECT_ERROR message that mark an authentication rejection
pub const AUTH_FAILURE_MARKERS: [&str; 6] = [
    "token",
    "auth",
    "unauthorized",
    "forbidden",
    "jwt",
    "expired",
];

/// Room membership events (client -> server)
pub mod room_events {
    pub const JOIN: &str = "join-room";
    pub const LEAVE: &str = "leave-room";
}

/// Named events pushed by the backend
pub mod server_events {
    pub const ROLE_CHANGED: &str = "role-changed";
    pub const PERMISSIONS_UPDATED: &str = "permissions-updated";
    pub const NOTIFICATION: &str = "notification";
    pub const NEW_MESSAGE: &str = "new-message";
    pub const USER_TYPING: &str = "user-typing";
    pub const USER_STOPPED_TYPING: &str = "user-stopped-typing";
    pub const MESSAGE_READ: &str = "message-read";
}

/// Messaging events (client -> server)
pub mod client_events {
    pub const JOIN_CONVERSATION: &str = "join-conversation";
    pub const LEAVE_CONVERSATION: &str = "leave-conversation";
    pub const SEND_MESSAGE: &str = "send-message";
    pub const TYPING: &str = "typing";
    pub const STOP_TYPING: &str = "stop-typing";
    pub const MARK_MESSAGE_READ: &str = "mark-message-read";
    pub const GET_CONVERSATION_HISTORY: &str = "get-conversation-history";
}
