use std::sync::Arc;
use std::time::Duration;

use crate::ws::hub::JobHub;

/// Spawn a background task that sends a Ping frame to every subscriber
/// each `interval`.
///
/// The task runs until aborted through the returned handle.
pub fn start_heartbeat(hub: Arc<JobHub>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            let count = hub.connection_count().await;
            tracing::debug!(count, "WebSocket heartbeat ping");
            hub.ping_all().await;
        }
    })
}
