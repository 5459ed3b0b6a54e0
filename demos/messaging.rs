use conference_realtime::{
    Credential, EventKind, InMemoryCredentials, OutgoingMessage, RealtimeClientOptions,
    RealtimeEvent, global_or_init, teardown_global,
};
use std::sync::Arc;
use std::time::Duration;

/// Join a session conversation through the shared client and send a message
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let api_url = std::env::var("CONFERENCE_API_URL").expect("CONFERENCE_API_URL must be set in .env");
    let access_token =
        std::env::var("CONFERENCE_ACCESS_TOKEN").expect("CONFERENCE_ACCESS_TOKEN must be set in .env");
    let session_id: u64 = std::env::var("SESSION_ID")
        .expect("SESSION_ID must be set in .env")
        .parse()?;
    let user_id: u64 = std::env::var("USER_ID")
        .expect("USER_ID must be set in .env")
        .parse()?;

    let client = global_or_init(|| {
        conference_realtime::RealtimeClient::new(
            &api_url,
            RealtimeClientOptions::default(),
            Arc::new(InMemoryCredentials::fixed(Credential::new(access_token, ""))),
        )
    })?;

    client.on(EventKind::NewMessage, |event| {
        if let RealtimeEvent::NewMessage(message) = event {
            println!("💬 {:?}", message);
        }
    });
    client.on(EventKind::UserTyping, |event| {
        if let RealtimeEvent::UserTyping(notice) = event {
            println!("✍️  {:?} is typing", notice.user_id);
        }
    });

    let status = client.connect().await?;
    println!("🔌 {}", status.state);

    client.join_conversation(session_id, user_id).await?;
    client.request_conversation_history(session_id, user_id, Some(20), None).await?;

    client.set_typing(session_id, user_id, true).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    client
        .send_message(&OutgoingMessage::text(session_id, user_id, "Hello from Rust 🦀"))
        .await?;
    client.stop_typing(session_id, user_id).await?;

    tokio::time::sleep(Duration::from_secs(10)).await;

    client.leave_conversation(session_id, user_id).await?;
    teardown_global().await?;
    Ok(())
}
