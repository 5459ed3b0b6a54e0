use conference_realtime::{
    Credential, EventKind, HttpTokenRefresher, InMemoryCredentials, RealtimeClient,
    RealtimeClientOptions, RealtimeEvent,
};
use std::sync::Arc;
use std::time::Duration;

/// Connect to a running conference backend and print what arrives
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing to see logs
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let api_url = std::env::var("CONFERENCE_API_URL").expect("CONFERENCE_API_URL must be set in .env");
    let access_token =
        std::env::var("CONFERENCE_ACCESS_TOKEN").expect("CONFERENCE_ACCESS_TOKEN must be set in .env");
    let refresh_token = std::env::var("CONFERENCE_REFRESH_TOKEN").unwrap_or_default();

    println!("📡 Connecting to: {}\n", api_url);

    let credentials = InMemoryCredentials::new(HttpTokenRefresher::for_api_base(&api_url)?)
        .with_credential(Credential::new(access_token, refresh_token));

    let client = RealtimeClient::new(
        &api_url,
        RealtimeClientOptions {
            join_user_room: true,
            ..Default::default()
        },
        Arc::new(credentials),
    )?;

    client.on(EventKind::StatusChanged, |event| {
        if let RealtimeEvent::StatusChanged(status) = event {
            println!("🔌 {} (attempt {})", status.state, status.attempt);
        }
    });
    client.on(EventKind::RetriesExhausted, |_| {
        println!("⏸️  Gave up reconnecting; call reset() to try again");
    });
    client.on(EventKind::SessionExpired, |_| {
        println!("🔒 Session expired, sign in again");
    });
    client.on(EventKind::RoleChanged, |event| {
        if let RealtimeEvent::RoleChanged(change) = event {
            println!("🎭 Role changed to {:?}", change.new_role);
        }
    });
    client.on(EventKind::Notification, |event| {
        println!("🔔 {:?}", event);
    });

    let status = client.connect().await?;
    if !status.is_connected() {
        println!("❌ Could not connect: {:?}", status.last_error);
        return Ok(());
    }
    println!("✅ Connected, topics: {:?}\n", client.subscriptions().await?);

    if let Ok(conference) = std::env::var("CONFERENCE_ID") {
        client.subscribe(format!("conference:{}", conference)).await?;
    }

    println!("⏳ Listening for 60 seconds...");
    tokio::time::sleep(Duration::from_secs(60)).await;

    client.shutdown().await?;
    println!("👋 Done");
    Ok(())
}
