// Messaging module - Event handling and message routing
pub mod event;
pub mod listeners;
pub mod outgoing;
pub mod router;

pub use event::{
    ChatMessage, EventKind, PermissionsUpdate, ReadReceipt, RealtimeEvent, RoleChange,
    TypingNotice,
};
pub use listeners::{Handler, ListenerId, ListenerRegistry};
pub use outgoing::{MessageKind, OutgoingMessage};
pub use router::MessageRouter;
