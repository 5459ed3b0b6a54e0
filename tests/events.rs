mod support;

use conference_realtime::transport::Outbound;
use conference_realtime::{
    ConnectionState, EventKind, OutgoingMessage, RealtimeError, RealtimeEvent,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use support::{
    CountingCredentials, FakeConnector, Step, auth_rejected, client_with, fast_options, jwt, record,
    settle, unix_now,
};

#[tokio::test(start_paused = true)]
async fn test_server_events_reach_listeners_in_order() {
    let connector = FakeConnector::new([Step::Accept]);
    let client = client_with(
        connector.clone(),
        CountingCredentials::new("access-0"),
        fast_options(),
    );
    let notifications = record(&client, EventKind::Notification);
    let custom = record(&client, "conference-updated");
    client.connect().await.unwrap();
    let link = connector.next_link().await;

    link.push_event("notification", json!({"id": 1}));
    link.push_event("conference-updated", json!({"id": 7}));
    link.push_event("notification", json!({"id": 2}));
    settle().await;

    assert_eq!(
        *notifications.lock().unwrap(),
        vec![
            RealtimeEvent::Notification(json!({"id": 1})),
            RealtimeEvent::Notification(json!({"id": 2})),
        ]
    );
    assert_eq!(
        *custom.lock().unwrap(),
        vec![RealtimeEvent::Custom {
            name: "conference-updated".to_string(),
            payload: json!({"id": 7}),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_role_change_is_typed() {
    let connector = FakeConnector::new([Step::Accept]);
    let client = client_with(
        connector.clone(),
        CountingCredentials::new("access-0"),
        fast_options(),
    );
    let roles = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&roles);
    client.on(EventKind::RoleChanged, move |event| {
        if let RealtimeEvent::RoleChanged(change) = event {
            sink.lock().unwrap().push(change.new_role.clone());
        }
    });
    client.connect().await.unwrap();
    let link = connector.next_link().await;

    link.push_event(
        "role-changed",
        json!({"userId": 42, "newRole": "SPEAKER", "message": "promoted"}),
    );
    settle().await;

    assert_eq!(*roles.lock().unwrap(), vec![Some("SPEAKER".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_listener_does_not_block_others() {
    let connector = FakeConnector::new([Step::Accept]);
    let client = client_with(
        connector.clone(),
        CountingCredentials::new("access-0"),
        fast_options(),
    );
    client.on(EventKind::Notification, |_| panic!("listener bug"));
    let seen = record(&client, EventKind::Notification);
    client.connect().await.unwrap();
    let link = connector.next_link().await;

    link.push_event("notification", json!("hello"));
    link.push_event("notification", json!("again"));
    settle().await;

    assert_eq!(seen.lock().unwrap().len(), 2);
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_off_removes_only_that_listener() {
    let connector = FakeConnector::new([Step::Accept]);
    let client = client_with(
        connector.clone(),
        CountingCredentials::new("access-0"),
        fast_options(),
    );
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&first);
    let id = client.on(EventKind::Notification, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = Arc::clone(&second);
    client.on(EventKind::Notification, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    client.connect().await.unwrap();
    let link = connector.next_link().await;

    link.push_event("notification", json!(1));
    settle().await;
    assert!(client.off(id));
    assert!(!client.off(id));
    link.push_event("notification", json!(2));
    settle().await;

    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_subscriptions_follow_connection() {
    let connector = FakeConnector::new([Step::Accept]);
    let client = client_with(
        connector.clone(),
        CountingCredentials::new("access-0"),
        fast_options(),
    );
    client.subscribe("conference:7").await.unwrap();
    client.subscribe("conference:7").await.unwrap();
    client.connect().await.unwrap();
    let mut link = connector.next_link().await;
    assert_eq!(link.drain(), vec![Outbound::Join("conference:7".to_string())]);

    client.subscribe("session:3").await.unwrap();
    client.unsubscribe("conference:7").await.unwrap();
    client.unsubscribe("never-joined").await.unwrap();
    assert_eq!(
        link.drain(),
        vec![
            Outbound::Join("session:3".to_string()),
            Outbound::Leave("conference:7".to_string()),
        ]
    );
    assert_eq!(client.subscriptions().await.unwrap(), vec!["session:3"]);

    client.clear_subscriptions().await.unwrap();
    assert_eq!(link.drain(), vec![Outbound::Leave("session:3".to_string())]);
    assert!(client.subscriptions().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_user_room_joined_from_token_claims() {
    let connector = FakeConnector::new([Step::Accept]);
    let token = jwt(json!({"userId": 42, "role": "ATTENDEE"}));
    let options = conference_realtime::RealtimeClientOptions {
        join_user_room: true,
        ..fast_options()
    };
    let client = client_with(connector.clone(), CountingCredentials::new(&token), options);

    client.connect().await.unwrap();

    let mut link = connector.next_link().await;
    assert_eq!(link.drain(), vec![Outbound::Join("user:42".to_string())]);
    assert_eq!(client.subscriptions().await.unwrap(), vec!["user:42"]);
}

#[tokio::test(start_paused = true)]
async fn test_expired_token_is_refreshed_before_dialing() {
    let connector = FakeConnector::new([Step::Accept]);
    let token = jwt(json!({"userId": 42, "exp": 1}));
    let credentials = CountingCredentials::new(&token);
    let client = client_with(connector.clone(), credentials.clone(), fast_options());

    let status = client.connect().await.unwrap();

    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(credentials.refreshes(), 1);
    let calls = connector.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].access_token, "access-1");
}

#[tokio::test(start_paused = true)]
async fn test_token_near_expiry_is_refreshed_before_dialing() {
    let connector = FakeConnector::new([Step::Accept]);
    let token = jwt(json!({"userId": 42, "exp": unix_now() + 60}));
    let credentials = CountingCredentials::new(&token);
    let client = client_with(connector.clone(), credentials.clone(), fast_options());

    let status = client.connect().await.unwrap();

    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(credentials.refreshes(), 1);
    let calls = connector.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].access_token, "access-1");
}

#[tokio::test(start_paused = true)]
async fn test_short_lived_refreshed_token_is_still_dialed() {
    let connector = FakeConnector::new([Step::Accept]);
    let soon = jwt(json!({"userId": 42, "exp": unix_now() + 60}));
    let still_soon = jwt(json!({"userId": 42, "exp": unix_now() + 120}));
    let credentials = CountingCredentials::rotating(&soon, [still_soon.clone()]);
    let client = client_with(connector.clone(), credentials.clone(), fast_options());

    let status = client.connect().await.unwrap();

    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(credentials.refreshes(), 1);
    let calls = connector.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].access_token, still_soon);
}

#[tokio::test(start_paused = true)]
async fn test_left_user_room_is_not_rejoined() {
    let connector = FakeConnector::new([Step::Accept, Step::Accept]);
    let token = jwt(json!({"userId": 42}));
    let options = conference_realtime::RealtimeClientOptions {
        join_user_room: true,
        ..fast_options()
    };
    let client = client_with(connector.clone(), CountingCredentials::new(&token), options);
    client.connect().await.unwrap();
    let mut first = connector.next_link().await;
    assert_eq!(first.drain(), vec![Outbound::Join("user:42".to_string())]);

    client.unsubscribe("user:42").await.unwrap();
    assert_eq!(first.drain(), vec![Outbound::Leave("user:42".to_string())]);

    first.drop_connection("transport close");
    settle().await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(client.status().state, ConnectionState::Connected);

    let mut second = connector.next_link().await;
    assert!(second.drain().is_empty());
    assert!(client.subscriptions().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_user_room_follows_refreshed_identity() {
    let connector = FakeConnector::new([Step::Accept, auth_rejected(), Step::Accept]);
    let credentials = CountingCredentials::rotating(
        &jwt(json!({"userId": 42})),
        [jwt(json!({"userId": 43}))],
    );
    let options = conference_realtime::RealtimeClientOptions {
        join_user_room: true,
        ..fast_options()
    };
    let client = client_with(connector.clone(), credentials.clone(), options);
    client.subscribe("conference:7").await.unwrap();
    client.connect().await.unwrap();
    let mut first = connector.next_link().await;
    assert_eq!(
        first.drain(),
        vec![
            Outbound::Join("conference:7".to_string()),
            Outbound::Join("user:42".to_string()),
        ]
    );

    first.drop_connection("transport close");
    settle().await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(client.status().state, ConnectionState::Connected);
    assert_eq!(credentials.refreshes(), 1);

    let mut second = connector.next_link().await;
    assert_eq!(
        second.drain(),
        vec![
            Outbound::Join("conference:7".to_string()),
            Outbound::Join("user:43".to_string()),
        ]
    );
    assert_eq!(
        client.subscriptions().await.unwrap(),
        vec!["conference:7", "user:43"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_emit_requires_connection() {
    let connector = FakeConnector::new([Step::Accept]);
    let client = client_with(
        connector.clone(),
        CountingCredentials::new("access-0"),
        fast_options(),
    );

    let result = client.emit("typing", json!({})).await;
    assert!(matches!(result, Err(RealtimeError::NotConnected)));

    client.connect().await.unwrap();
    let mut link = connector.next_link().await;
    client
        .send_message(&OutgoingMessage::text(3, 42, "hello").to_attendee(7))
        .await
        .unwrap();
    client.set_typing(3, 42, true).await.unwrap();

    assert_eq!(
        link.drain(),
        vec![
            Outbound::Emit {
                event: "send-message".to_string(),
                data: json!({
                    "sessionId": 3,
                    "content": "hello",
                    "type": "text",
                    "attendeeId": 7,
                    "senderId": 42,
                }),
            },
            Outbound::Emit {
                event: "typing".to_string(),
                data: json!({"sessionId": 3, "userId": 42, "isTyping": true}),
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_status_watch_and_shutdown() {
    let connector = FakeConnector::new([Step::Accept]);
    let client = client_with(
        connector.clone(),
        CountingCredentials::new("access-0"),
        fast_options(),
    );
    let mut watch = client.watch_status();
    assert_eq!(watch.borrow().state, ConnectionState::Disconnected);

    client.request_connect().unwrap();
    let status = watch
        .wait_for(|s| s.is_connected())
        .await
        .unwrap()
        .clone();
    assert_eq!(status.attempt, 0);

    let other = client.clone();
    client.shutdown().await.unwrap();
    let mut link = connector.next_link().await;
    assert_eq!(link.drain(), vec![Outbound::Close]);

    settle().await;
    assert!(matches!(
        other.connect().await,
        Err(RealtimeError::ClientClosed)
    ));
}
