//! Process-wide client slot.
//!
//! The app keeps exactly one realtime connection; screens and services reach
//! it through these functions instead of threading a handle around.

use super::RealtimeClient;
use crate::types::Result;
use std::sync::{Mutex, PoisonError};

static GLOBAL: Mutex<Option<RealtimeClient>> = Mutex::new(None);

/// Installs `client` as the shared instance, returning the one it replaced
pub fn install_global(client: RealtimeClient) -> Option<RealtimeClient> {
    GLOBAL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(client)
}

/// The shared instance, if one is installed
pub fn global() -> Option<RealtimeClient> {
    GLOBAL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// The shared instance, created by `init` on first use.
///
/// `init` runs under the slot lock, so concurrent callers never build two clients.
pub fn global_or_init<F>(init: F) -> Result<RealtimeClient>
where
    F: FnOnce() -> Result<RealtimeClient>,
{
    let mut slot = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(client) = slot.as_ref() {
        return Ok(client.clone());
    }
    let client = init()?;
    *slot = Some(client.clone());
    Ok(client)
}

/// Removes the shared instance and shuts it down (logout, tests)
pub async fn teardown_global() -> Result<()> {
    let client = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner).take();
    match client {
        Some(client) => {
            tracing::info!("Tearing down global realtime client");
            client.shutdown().await
        }
        None => Ok(()),
    }
}
