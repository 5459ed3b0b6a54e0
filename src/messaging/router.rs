use super::{EventKind, ListenerRegistry, RealtimeEvent};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Turns named wire events into typed [`RealtimeEvent`]s and hands them to listeners
pub struct MessageRouter {
    listeners: Arc<ListenerRegistry>,
}

impl MessageRouter {
    pub fn new(listeners: Arc<ListenerRegistry>) -> Self {
        Self { listeners }
    }

    /// Routes a server event to the registered listeners
    pub fn route(&self, name: &str, payload: Value) {
        tracing::debug!(
            "Routing event: name={}, payload={}",
            name,
            serde_json::to_string(&payload).unwrap_or_default()
        );
        let event = decode_event(name, payload);
        let delivered = self.listeners.dispatch(&event);
        tracing::debug!("Event {} delivered to {} listener(s)", name, delivered);
    }

    /// Delivers a client-originated event (status, exhaustion, session expiry)
    pub fn publish(&self, event: RealtimeEvent) {
        self.listeners.dispatch(&event);
    }
}

/// Typed decode; payloads that do not fit their schema are delivered as `Custom`
pub fn decode_event(name: &str, payload: Value) -> RealtimeEvent {
    match EventKind::from_wire(name) {
        EventKind::RoleChanged => typed(name, payload, RealtimeEvent::RoleChanged),
        EventKind::PermissionsUpdated => typed(name, payload, RealtimeEvent::PermissionsUpdated),
        EventKind::Notification => RealtimeEvent::Notification(payload),
        EventKind::NewMessage => typed(name, payload, RealtimeEvent::NewMessage),
        EventKind::UserTyping => typed(name, payload, RealtimeEvent::UserTyping),
        EventKind::UserStoppedTyping => typed(name, payload, RealtimeEvent::UserStoppedTyping),
        EventKind::MessageRead => typed(name, payload, RealtimeEvent::MessageRead),
        _ => RealtimeEvent::Custom {
            name: name.to_string(),
            payload,
        },
    }
}

fn typed<T, F>(name: &str, payload: Value, wrap: F) -> RealtimeEvent
where
    T: DeserializeOwned,
    F: FnOnce(T) -> RealtimeEvent,
{
    match serde_json::from_value::<T>(payload.clone()) {
        Ok(value) => wrap(value),
        Err(e) => {
            tracing::warn!("Payload of '{}' did not match its schema: {}", name, e);
            RealtimeEvent::Custom {
                name: name.to_string(),
                payload,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{RoleChange, TypingNotice};
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_decode_role_change() {
        let event = decode_event(
            "role-changed",
            json!({"userId": 42, "oldRole": "attendee", "newRole": "staff"}),
        );
        let RealtimeEvent::RoleChanged(RoleChange {
            user_id, new_role, ..
        }) = event
        else {
            panic!("expected role change");
        };
        assert_eq!(user_id, Some(42));
        assert_eq!(new_role.as_deref(), Some("staff"));
    }

    #[test]
    fn test_schema_mismatch_falls_back_to_custom() {
        let event = decode_event("user-typing", json!({"sessionId": "not-a-number"}));
        assert_eq!(
            event,
            RealtimeEvent::Custom {
                name: "user-typing".to_string(),
                payload: json!({"sessionId": "not-a-number"}),
            }
        );
    }

    #[test]
    fn test_unknown_event_is_custom() {
        let event = decode_event("checkin-scanned", json!({"badge": "A-12"}));
        assert_eq!(event.kind(), EventKind::Custom("checkin-scanned".to_string()));
    }

    #[test]
    fn test_route_reaches_typed_listener() {
        let listeners = Arc::new(ListenerRegistry::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        listeners.on(EventKind::UserStoppedTyping, move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        let router = MessageRouter::new(Arc::clone(&listeners));
        router.route("user-stopped-typing", json!({"sessionId": 5, "userId": 8}));
        router.route("user-typing", json!({"sessionId": 5, "userId": 8}));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![RealtimeEvent::UserStoppedTyping(TypingNotice {
                session_id: Some(5),
                user_id: Some(8),
            })]
        );
    }
}
