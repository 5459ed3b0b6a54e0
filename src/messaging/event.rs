use crate::client::ConnectionStatus;
use crate::types::constants::server_events;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Everything the client delivers to listeners
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// The connection state, attempt counter or last error changed
    StatusChanged(ConnectionStatus),
    /// Automatic retries stopped; only `reset`/`connect`/`force_reconnect` resume
    RetriesExhausted {
        attempts: u32,
        last_error: Option<String>,
    },
    /// The backend rejected the refresh token; the user has to sign in again
    SessionExpired { reason: String },
    RoleChanged(RoleChange),
    PermissionsUpdated(PermissionsUpdate),
    Notification(Value),
    NewMessage(ChatMessage),
    UserTyping(TypingNotice),
    UserStoppedTyping(TypingNotice),
    MessageRead(ReadReceipt),
    /// Any other named server event
    Custom { name: String, payload: Value },
}

impl RealtimeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StatusChanged(_) => EventKind::StatusChanged,
            Self::RetriesExhausted { .. } => EventKind::RetriesExhausted,
            Self::SessionExpired { .. } => EventKind::SessionExpired,
            Self::RoleChanged(_) => EventKind::RoleChanged,
            Self::PermissionsUpdated(_) => EventKind::PermissionsUpdated,
            Self::Notification(_) => EventKind::Notification,
            Self::NewMessage(_) => EventKind::NewMessage,
            Self::UserTyping(_) => EventKind::UserTyping,
            Self::UserStoppedTyping(_) => EventKind::UserStoppedTyping,
            Self::MessageRead(_) => EventKind::MessageRead,
            Self::Custom { name, .. } => EventKind::Custom(name.clone()),
        }
    }
}

/// Listener registry key; one per [`RealtimeEvent`] variant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    StatusChanged,
    RetriesExhausted,
    SessionExpired,
    RoleChanged,
    PermissionsUpdated,
    Notification,
    NewMessage,
    UserTyping,
    UserStoppedTyping,
    MessageRead,
    Custom(String),
}

impl EventKind {
    /// Map a wire event name to its kind
    pub fn from_wire(name: &str) -> Self {
        match name {
            server_events::ROLE_CHANGED => Self::RoleChanged,
            server_events::PERMISSIONS_UPDATED => Self::PermissionsUpdated,
            server_events::NOTIFICATION => Self::Notification,
            server_events::NEW_MESSAGE => Self::NewMessage,
            server_events::USER_TYPING => Self::UserTyping,
            server_events::USER_STOPPED_TYPING => Self::UserStoppedTyping,
            server_events::MESSAGE_READ => Self::MessageRead,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::StatusChanged => "status-changed",
            Self::RetriesExhausted => "retries-exhausted",
            Self::SessionExpired => "session-expired",
            Self::RoleChanged => server_events::ROLE_CHANGED,
            Self::PermissionsUpdated => server_events::PERMISSIONS_UPDATED,
            Self::Notification => server_events::NOTIFICATION,
            Self::NewMessage => server_events::NEW_MESSAGE,
            Self::UserTyping => server_events::USER_TYPING,
            Self::UserStoppedTyping => server_events::USER_STOPPED_TYPING,
            Self::MessageRead => server_events::MESSAGE_READ,
            Self::Custom(name) => name,
        }
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        Self::from_wire(s)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `role-changed` payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChange {
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub old_role: Option<String>,
    #[serde(default)]
    pub new_role: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `permissions-updated` payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsUpdate {
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `new-message` payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub session_id: Option<u64>,
    #[serde(default)]
    pub sender_id: Option<u64>,
    #[serde(default)]
    pub content: String,
    #[serde(default, rename = "type")]
    pub message_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `user-typing` / `user-stopped-typing` payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    #[serde(default)]
    pub session_id: Option<u64>,
    #[serde(default)]
    pub user_id: Option<u64>,
}

/// `message-read` payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    #[serde(default)]
    pub message_id: Option<u64>,
    #[serde(default)]
    pub user_id: Option<u64>,
}
