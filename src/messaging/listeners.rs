use super::{EventKind, RealtimeEvent};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Callback invoked with each matching event
pub type Handler = Arc<dyn Fn(&RealtimeEvent) + Send + Sync + 'static>;

/// Handle returned by [`ListenerRegistry::on`]; pass it to `off` to remove
/// exactly that listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Event-kind keyed listeners, dispatched in registration order
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<EventKind, Vec<(ListenerId, Handler)>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Returns whether a listener was removed
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = false;
        listeners.retain(|_, handlers| {
            let before = handlers.len();
            handlers.retain(|(existing, _)| *existing != id);
            removed |= handlers.len() != before;
            !handlers.is_empty()
        });
        removed
    }

    pub fn listener_count(&self, kind: &EventKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .map_or(0, Vec::len)
    }

    /// Invoke every listener registered for the event's kind.
    ///
    /// Handlers run on a snapshot, so they may call `on`/`off` themselves. A
    /// panicking handler is logged and skipped; later handlers still run.
    pub fn dispatch(&self, event: &RealtimeEvent) -> usize {
        let kind = event.kind();
        let snapshot: Vec<(ListenerId, Handler)> = {
            let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
            match listeners.get(&kind) {
                Some(handlers) => handlers.clone(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for (id, handler) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(
                        "Listener {:?} for '{}' panicked: {}",
                        id,
                        kind,
                        reason
                    );
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn notification(n: i64) -> RealtimeEvent {
        RealtimeEvent::Notification(json!({ "n": n }))
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let registry = ListenerRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            registry.on(EventKind::Notification, move |_| {
                seen.lock().unwrap().push(tag);
            });
        }

        assert_eq!(registry.dispatch(&notification(1)), 3);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_panicking_listener_does_not_block_the_next() {
        let registry = ListenerRegistry::new();
        let received = Arc::new(Mutex::new(None));

        registry.on(EventKind::Notification, |_| panic!("listener blew up"));
        let sink = Arc::clone(&received);
        registry.on(EventKind::Notification, move |event| {
            *sink.lock().unwrap() = Some(event.clone());
        });

        let event = notification(7);
        assert_eq!(registry.dispatch(&event), 1);
        assert_eq!(*received.lock().unwrap(), Some(event));
    }

    #[test]
    fn test_off_removes_only_that_listener() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(Mutex::new(Vec::new()));

        let a_hits = Arc::clone(&hits);
        let a = registry.on(EventKind::Notification, move |_| a_hits.lock().unwrap().push("a"));
        let b_hits = Arc::clone(&hits);
        registry.on(EventKind::Notification, move |_| b_hits.lock().unwrap().push("b"));

        assert!(registry.off(a));
        assert!(!registry.off(a));
        registry.dispatch(&notification(1));
        assert_eq!(*hits.lock().unwrap(), vec!["b"]);
        assert_eq!(registry.listener_count(&EventKind::Notification), 1);
    }

    #[test]
    fn test_listener_can_unregister_itself_during_dispatch() {
        let registry = Arc::new(ListenerRegistry::new());
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let reg = Arc::clone(&registry);
        let own = Arc::clone(&slot);
        let id = registry.on(EventKind::Notification, move |_| {
            if let Some(id) = *own.lock().unwrap() {
                reg.off(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        assert_eq!(registry.dispatch(&notification(1)), 1);
        assert_eq!(registry.dispatch(&notification(2)), 0);
    }

    #[test]
    fn test_kinds_are_isolated() {
        let registry = ListenerRegistry::new();
        registry.on(EventKind::RoleChanged, |_| {});
        assert_eq!(registry.dispatch(&notification(1)), 0);
        assert_eq!(
            registry.dispatch(&RealtimeEvent::Custom {
                name: "role-changed".to_string(),
                payload: json!(null),
            }),
            0
        );
    }
}
