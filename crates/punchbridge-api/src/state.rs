use std::sync::Arc;

use punchbridge_ingest::{ConnectionState, StatusTracker};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub status: StatusTracker,
    pub mqtt: ConnectionState,
    /// Broker URL with credentials stripped.
    pub mqtt_url: String,
    pub mqtt_topic: String,
    pub admin_token: String,
}
