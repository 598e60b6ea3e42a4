use std::sync::Arc;

use crate::ws::JobHub;

/// Shared application state available to all handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Per-job subscriber registry and last-state store.
    pub hub: Arc<JobHub>,
}
